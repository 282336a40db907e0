use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::*;

/// The most parameters we'll accept in a single message.
pub const MAX_PARAMS: u64 = 256;

const ROLE: u64 = 0x0;
const AUTH_INFO: u64 = 0x2;

/// Which side is expected to send objects on the connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum Role {
	/// Only the client sends objects (ingest).
	Publisher = 0x1,
	/// Only the server sends objects (delivery).
	Subscriber = 0x2,
	Both = 0x3,
}

impl Encode for Role {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		u64::from(*self).encode(w);
	}
}

impl Decode for Role {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::try_from(u64::decode(r)?).map_err(|_| DecodeError::InvalidValue)
	}
}

/// The parameter block shared by the setup, announce and subscribe messages.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
	pub role: Option<Role>,
	pub auth: Option<String>,

	/// Parameters we don't understand, kept only for logging.
	pub unknown: Vec<(u64, Bytes)>,
}

impl Parameters {
	pub fn role(role: Role) -> Self {
		Self {
			role: Some(role),
			..Default::default()
		}
	}

	pub fn auth(auth: impl Into<String>) -> Self {
		Self {
			auth: Some(auth.into()),
			..Default::default()
		}
	}

	fn len(&self) -> usize {
		self.role.is_some() as usize + self.auth.is_some() as usize + self.unknown.len()
	}
}

impl Decode for Parameters {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let count = u64::decode(r)?;
		if count > MAX_PARAMS {
			return Err(DecodeError::TooManyParameters(count));
		}

		let mut params = Parameters::default();

		for _ in 0..count {
			let id = u64::decode(r)?;
			match id {
				ROLE => {
					// The role is wrapped in a redundant length.
					let _size = usize::decode(r)?;
					params.role = Some(Role::decode(r)?);
				}
				AUTH_INFO => params.auth = Some(String::decode(r)?),
				_ => {
					let value = Bytes::decode(r)?;
					tracing::debug!(id, size = value.len(), "ignoring unknown parameter");
					params.unknown.push((id, value));
				}
			}
		}

		Ok(params)
	}
}

impl Encode for Parameters {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.len().encode(w);

		if let Some(role) = self.role {
			ROLE.encode(w);
			let value = VarInt::from_u32(u64::from(role) as u32);
			value.size().encode(w);
			value.encode(w);
		}

		if let Some(auth) = &self.auth {
			AUTH_INFO.encode(w);
			auth.encode(w);
		}

		for (id, value) in &self.unknown {
			id.encode(w);
			value.encode(w);
		}
	}
}
