use std::string::FromUtf8Error;
use thiserror::Error;

/// Read the value from the buffer.
///
/// If [DecodeError::Short] is returned, the caller should try again with more data.
pub trait Decode: Sized {
	/// Decode the value from the given buffer.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	#[error("short buffer")]
	Short,

	/// The stream ended in the middle of a value.
	#[error("truncated value")]
	Truncated,

	#[error("invalid string")]
	InvalidString(#[from] FromUtf8Error),

	#[error("unexpected message type: expected={expected:#x} received={received:#x}")]
	UnexpectedMessageType { expected: u64, received: u64 },

	#[error("invalid location mode: {0}")]
	InvalidLocation(u64),

	#[error("invalid value")]
	InvalidValue,

	#[error("too many parameters: {0}")]
	TooManyParameters(u64),

	#[error("bounds exceeded")]
	BoundsExceeded,


	#[error("invalid metadata: {0}")]
	InvalidMetadata(String),
}

impl Decode for u8 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.has_remaining() {
			true => Ok(r.get_u8()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for String {
	/// Decode a string with a varint length prefix.
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let v = Vec::<u8>::decode(r)?;
		let str = String::from_utf8(v)?;

		Ok(str)
	}
}

impl Decode for Vec<u8> {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let size = usize::decode(buf)?;

		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		let bytes = buf.copy_to_bytes(size);
		Ok(bytes.to_vec())
	}
}

impl Decode for bytes::Bytes {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let len = usize::decode(r)?;
		if r.remaining() < len {
			return Err(DecodeError::Short);
		}
		let bytes = r.copy_to_bytes(len);
		Ok(bytes)
	}
}

