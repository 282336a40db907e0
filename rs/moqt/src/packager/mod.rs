//! Serialization of a single chunk into an object payload.
//!
//! Each track picks one format: [PackagerKind::Raw] for opaque data, or
//! [PackagerKind::Loc] for media chunks with timing and decoder metadata.

mod config;
mod loc;
mod raw;

pub use config::*;

use bytes::Bytes;

use crate::{
	Error,
	coding::*,
	model::{Chunk, PackagerKind},
	transport::RecvStream,
};

/// A chunk validated and ready to be written to an object stream, or one just read from it.
#[derive(Debug, Clone)]
pub struct Packet {
	kind: PackagerKind,
	chunk: Chunk,

	// The serialized decoder config, empty if none.
	metadata: Bytes,

	id: String,
}

impl Packet {
	/// Package a chunk in the given format.
	///
	/// Negative sequence ids are folded into -1. Fails if a field can't be represented on the wire.
	pub fn new(kind: PackagerKind, mut chunk: Chunk) -> Result<Self, Error> {
		chunk.seq_id = chunk.normalized_seq();

		VarInt::try_from(chunk.seq_id.saturating_add(1) as u64)?;
		if kind == PackagerKind::Loc {
			VarInt::try_from(chunk.timestamp)?;
			VarInt::try_from(chunk.capture_clock)?;
			if let Some(duration) = chunk.duration {
				VarInt::try_from(duration.saturating_add(1))?;
			}
		}

		let metadata = match (kind, &chunk.metadata) {
			(PackagerKind::Loc, Some(config)) => config.to_json()?,
			_ => Bytes::new(),
		};

		let id = format!(
			"{:?}-{:?}-{}-{:08x}",
			chunk.media_type,
			chunk.kind,
			chunk.seq_id,
			rand::random::<u32>()
		);

		Ok(Self {
			kind,
			chunk,
			metadata,
			id,
		})
	}

	/// Unpackage a complete object payload.
	pub fn decode(kind: PackagerKind, buf: Bytes) -> Result<Self, DecodeError> {
		let res = match kind {
			PackagerKind::Raw => raw::decode(buf),
			PackagerKind::Loc => loc::decode(buf),
		};

		// We have the whole payload, so running short means the stream was cut off.
		let chunk = res.map_err(|err| match err {
			DecodeError::Short => DecodeError::Truncated,
			err => err,
		})?;

		Ok(Self {
			kind,
			chunk,
			metadata: Bytes::new(),
			id: String::new(),
		})
	}

	/// Read the payload from the stream until it is finished, `block` bytes at a time.
	///
	/// Errors rather than buffer more than `limit` bytes.
	pub async fn read<S: RecvStream>(
		kind: PackagerKind,
		reader: &mut Reader<S>,
		block: usize,
		limit: usize,
	) -> Result<Self, Error> {
		let buf = reader.read_to_end(block, limit).await?;
		Ok(Self::decode(kind, buf)?)
	}

	/// An identifier used only for in-flight bookkeeping; it never hits the wire.
	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn kind(&self) -> PackagerKind {
		self.kind
	}

	pub fn chunk(&self) -> &Chunk {
		&self.chunk
	}

	pub fn into_chunk(self) -> Chunk {
		self.chunk
	}
}

impl Encode for Packet {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		match self.kind {
			PackagerKind::Raw => raw::encode(&self.chunk, w),
			PackagerKind::Loc => loc::encode(&self.chunk, &self.metadata, w),
		}
	}
}

// Sequence ids are shifted by one so the "immediate" id (-1) fits in a varint.
fn encode_seq<W: bytes::BufMut>(seq_id: i64, w: &mut W) {
	((seq_id.max(-1) + 1) as u64).encode(w);
}

fn decode_seq<R: bytes::Buf>(r: &mut R) -> Result<i64, DecodeError> {
	let v = u64::decode(r)?;
	Ok(v as i64 - 1)
}
