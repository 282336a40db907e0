//! The low overhead chunk format, carrying media timing alongside the encoded chunk.
//!
//! ```text
//! varint(media type) varint(timestamp us) varint(duration us + 1, 0 = unknown)
//! varint(chunk type) varint(seq id + 1) varint(capture clock ms)
//! bytes(metadata JSON, empty = none) payload..
//! ```

use bytes::{Buf, Bytes};

use crate::{
	coding::*,
	model::{Chunk, ChunkKind, MediaType},
};

use super::{DecoderConfig, decode_seq, encode_seq};

/// `metadata` is the already serialized decoder config, or empty.
pub(super) fn encode<W: bytes::BufMut>(chunk: &Chunk, metadata: &Bytes, w: &mut W) {
	chunk.media_type.encode(w);
	chunk.timestamp.encode(w);
	chunk.duration.map(|d| d + 1).unwrap_or(0).encode(w);
	chunk.kind.encode(w);
	encode_seq(chunk.seq_id, w);
	chunk.capture_clock.encode(w);
	metadata.encode(w);
	w.put_slice(&chunk.payload);
}

pub(super) fn decode(mut buf: Bytes) -> Result<Chunk, DecodeError> {
	let media_type = MediaType::decode(&mut buf)?;
	let timestamp = u64::decode(&mut buf)?;
	let duration = u64::decode(&mut buf)?.checked_sub(1);
	let kind = ChunkKind::decode(&mut buf)?;
	let seq_id = decode_seq(&mut buf)?;
	let capture_clock = u64::decode(&mut buf)?;

	let metadata = Bytes::decode(&mut buf)?;
	let metadata = match metadata.is_empty() {
		true => None,
		false => Some(DecoderConfig::from_json(&metadata).map_err(|e| DecodeError::InvalidMetadata(e.to_string()))?),
	};

	let payload = buf.copy_to_bytes(buf.remaining());

	Ok(Chunk {
		media_type,
		kind,
		seq_id,
		timestamp,
		duration,
		capture_clock,
		metadata,
		payload,
	})
}
