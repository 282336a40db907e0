use crate::{
	coding::*,
	message::{Message, Parameters},
};

/// Sent by the publisher to advertise a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announce {
	pub namespace: String,
	pub params: Parameters,
}

impl Message for Announce {
	const ID: u64 = 0x06;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W) {
		self.namespace.encode(w);
		self.params.encode(w);
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let namespace = String::decode(r)?;
		let params = Parameters::decode(r)?;

		Ok(Self { namespace, params })
	}
}

/// Sent by the server to accept an [Announce].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceOk {
	pub namespace: String,
}

impl Message for AnnounceOk {
	const ID: u64 = 0x07;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W) {
		self.namespace.encode(w);
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let namespace = String::decode(r)?;
		Ok(Self { namespace })
	}
}
