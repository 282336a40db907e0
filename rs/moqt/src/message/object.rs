use crate::coding::*;

const OBJECT_WITH_LENGTH: u64 = 0x0;
const OBJECT_WITHOUT_LENGTH: u64 = 0x2;

/// The header at the start of every object stream, followed by the packaged payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
	pub track_id: u64,
	pub group: u64,
	pub object: u64,
	pub send_order: u64,

	/// The payload size, or None if the payload runs until the end of the stream.
	pub length: Option<u64>,
}

impl Encode for ObjectHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		match self.length {
			Some(_) => OBJECT_WITH_LENGTH.encode(w),
			None => OBJECT_WITHOUT_LENGTH.encode(w),
		}

		self.track_id.encode(w);
		self.group.encode(w);
		self.object.encode(w);
		self.send_order.encode(w);

		if let Some(length) = self.length {
			length.encode(w);
		}
	}
}

impl Decode for ObjectHeader {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let kind = u64::decode(r)?;
		if kind != OBJECT_WITH_LENGTH && kind != OBJECT_WITHOUT_LENGTH {
			return Err(DecodeError::UnexpectedMessageType {
				expected: OBJECT_WITHOUT_LENGTH,
				received: kind,
			});
		}

		let track_id = u64::decode(r)?;
		let group = u64::decode(r)?;
		let object = u64::decode(r)?;
		let send_order = u64::decode(r)?;

		let length = match kind {
			OBJECT_WITH_LENGTH => Some(u64::decode(r)?),
			_ => None,
		};

		Ok(Self {
			track_id,
			group,
			object,
			send_order,
			length,
		})
	}
}
