//! Control messages (draft-ietf-moq-transport-01) and the per-object stream header.
//!
//! Control messages are unframed on the wire: a varint type tag followed by the payload.

mod announce;
mod object;
mod parameters;
mod setup;
mod subscribe;

pub use announce::*;
pub use object::*;
pub use parameters::*;
pub use setup::*;
pub use subscribe::*;

use crate::coding::{Decode, DecodeError, Encode};

/// A control message with a fixed type tag.
pub trait Message: Sized {
	const ID: u64;

	/// Encode the payload, without the type tag.
	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W);

	/// Decode the payload, after the type tag has been consumed.
	fn decode_msg<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError>;

	/// Encode the type tag followed by the payload.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		Self::ID.encode(w);
		self.encode_msg(w);
	}

	/// Decode the type tag, failing if it doesn't match, followed by the payload.
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let received = u64::decode(r)?;
		if received != Self::ID {
			return Err(DecodeError::UnexpectedMessageType {
				expected: Self::ID,
				received,
			});
		}

		Self::decode_msg(r)
	}
}
