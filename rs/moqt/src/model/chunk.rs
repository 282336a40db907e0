use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
	coding::{Decode, DecodeError, Encode},
	packager::DecoderConfig,
};

/// The kind of content carried by a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u64)]
pub enum MediaType {
	Data = 0,
	Audio = 1,
	Video = 2,
}

/// Whether a chunk can be decoded on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u64)]
pub enum ChunkKind {
	/// Starts a new group.
	Key = 0,
	/// Depends on the previous chunks in the group.
	Delta = 1,
}

impl Decode for MediaType {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::try_from(u64::decode(r)?).map_err(|_| DecodeError::InvalidValue)
	}
}

impl Encode for MediaType {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		u64::from(*self).encode(w);
	}
}

impl Decode for ChunkKind {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::try_from(u64::decode(r)?).map_err(|_| DecodeError::InvalidValue)
	}
}

impl Encode for ChunkKind {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		u64::from(*self).encode(w);
	}
}

/// One application-level unit of data, sent as a single object.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
	pub media_type: MediaType,
	pub kind: ChunkKind,

	/// The producer's sequence number; negative means "send immediately".
	pub seq_id: i64,

	/// The compensated presentation timestamp in microseconds.
	pub timestamp: u64,

	/// The estimated duration in microseconds, if known.
	pub duration: Option<u64>,

	/// Wall clock at capture time, in milliseconds since the epoch.
	pub capture_clock: u64,

	/// The decoder configuration, usually attached to key chunks only.
	pub metadata: Option<DecoderConfig>,

	pub payload: Bytes,
}

impl Chunk {
	/// An opaque payload, as sent on raw tracks.
	pub fn data(seq_id: i64, payload: impl Into<Bytes>) -> Self {
		Self {
			media_type: MediaType::Data,
			kind: ChunkKind::Key,
			seq_id,
			timestamp: 0,
			duration: None,
			capture_clock: 0,
			metadata: None,
			payload: payload.into(),
		}
	}

	/// An encoded media chunk, as sent on loc tracks.
	pub fn media(media_type: MediaType, kind: ChunkKind, seq_id: i64, payload: impl Into<Bytes>) -> Self {
		Self {
			media_type,
			kind,
			seq_id,
			timestamp: 0,
			duration: None,
			capture_clock: 0,
			metadata: None,
			payload: payload.into(),
		}
	}

	pub fn with_timing(mut self, timestamp: u64, duration: Option<u64>, capture_clock: u64) -> Self {
		self.timestamp = timestamp;
		self.duration = duration;
		self.capture_clock = capture_clock;
		self
	}

	pub fn with_metadata(mut self, metadata: DecoderConfig) -> Self {
		self.metadata = Some(metadata);
		self
	}

	/// The sequence id, with every negative value folded into -1.
	pub fn normalized_seq(&self) -> i64 {
		self.seq_id.max(-1)
	}
}
