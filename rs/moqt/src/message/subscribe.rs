use crate::{
	coding::*,
	message::{Message, Parameters},
};

/// A position in a track, relative to the live edge or absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
	None,
	Absolute(u64),
	RelativePrevious(u64),
	RelativeNext(u64),
}

impl Decode for Location {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let mode = u64::decode(r)?;
		Ok(match mode {
			0x0 => Self::None,
			0x1 => Self::Absolute(u64::decode(r)?),
			0x2 => Self::RelativePrevious(u64::decode(r)?),
			0x3 => Self::RelativeNext(u64::decode(r)?),
			_ => return Err(DecodeError::InvalidLocation(mode)),
		})
	}
}

impl Encode for Location {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		match self {
			Self::None => 0x0u64.encode(w),
			Self::Absolute(v) => {
				0x1u64.encode(w);
				v.encode(w);
			}
			Self::RelativePrevious(v) => {
				0x2u64.encode(w);
				v.encode(w);
			}
			Self::RelativeNext(v) => {
				0x3u64.encode(w);
				v.encode(w);
			}
		}
	}
}

/// Sent by the subscriber to request all future objects for the given track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
	pub namespace: String,
	pub name: String,
	pub start_group: Location,
	pub start_object: Location,
	pub end_group: Location,
	pub end_object: Location,
	pub params: Parameters,
}

impl Subscribe {
	/// Subscribe from the start of the next group, with no end.
	pub fn live(namespace: impl Into<String>, name: impl Into<String>, auth: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
			start_group: Location::RelativeNext(0),
			start_object: Location::Absolute(0),
			end_group: Location::None,
			end_object: Location::None,
			params: Parameters::auth(auth),
		}
	}
}

impl Message for Subscribe {
	const ID: u64 = 0x03;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W) {
		self.namespace.encode(w);
		self.name.encode(w);
		self.start_group.encode(w);
		self.start_object.encode(w);
		self.end_group.encode(w);
		self.end_object.encode(w);
		self.params.encode(w);
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let namespace = String::decode(r)?;
		let name = String::decode(r)?;
		let start_group = Location::decode(r)?;
		let start_object = Location::decode(r)?;
		let end_group = Location::decode(r)?;
		let end_object = Location::decode(r)?;
		let params = Parameters::decode(r)?;

		Ok(Self {
			namespace,
			name,
			start_group,
			start_object,
			end_group,
			end_object,
			params,
		})
	}
}

/// Sent by the publisher to accept a [Subscribe].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOk {
	pub namespace: String,
	pub name: String,
	pub track_id: u64,

	/// Milliseconds until the subscription expires, or 0 for never.
	pub expires: u64,
}

impl Message for SubscribeOk {
	const ID: u64 = 0x04;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W) {
		self.namespace.encode(w);
		self.name.encode(w);
		self.track_id.encode(w);
		self.expires.encode(w);
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let namespace = String::decode(r)?;
		let name = String::decode(r)?;
		let track_id = u64::decode(r)?;
		let expires = u64::decode(r)?;

		Ok(Self {
			namespace,
			name,
			track_id,
			expires,
		})
	}
}
