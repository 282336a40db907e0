use crate::{
	coding::*,
	message::{Message, Parameters, Role},
};

/// Sent by the client to begin the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSetup {
	/// The versions we support, in preferred order.
	pub versions: Versions,
	pub params: Parameters,
}

impl ClientSetup {
	pub fn new(versions: impl Into<Versions>, role: Role) -> Self {
		Self {
			versions: versions.into(),
			params: Parameters::role(role),
		}
	}
}

impl Message for ClientSetup {
	const ID: u64 = 0x40;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W) {
		self.versions.encode(w);
		self.params.encode(w);
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let versions = Versions::decode(r)?;
		let params = Parameters::decode(r)?;

		Ok(Self { versions, params })
	}
}

/// Sent by the server in response to [ClientSetup].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSetup {
	/// The version selected by the server.
	pub version: Version,
	pub params: Parameters,
}

impl Message for ServerSetup {
	const ID: u64 = 0x41;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W) {
		self.version.encode(w);
		self.params.encode(w);
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let version = Version::decode(r)?;
		let params = Parameters::decode(r)?;

		Ok(Self { version, params })
	}
}
