//! The raw format: a small header followed by opaque bytes until the end of the stream.
//!
//! `varint(media type) varint(chunk type) varint(seq id + 1) payload..`

use bytes::Buf;

use crate::{
	coding::*,
	model::{Chunk, ChunkKind, MediaType},
};

use super::{decode_seq, encode_seq};

pub(super) fn encode<W: bytes::BufMut>(chunk: &Chunk, w: &mut W) {
	chunk.media_type.encode(w);
	chunk.kind.encode(w);
	encode_seq(chunk.seq_id, w);
	w.put_slice(&chunk.payload);
}

pub(super) fn decode(mut buf: bytes::Bytes) -> Result<Chunk, DecodeError> {
	let media_type = MediaType::decode(&mut buf)?;
	let kind = ChunkKind::decode(&mut buf)?;
	let seq_id = decode_seq(&mut buf)?;
	let payload = buf.copy_to_bytes(buf.remaining());

	let mut chunk = Chunk::data(seq_id, payload);
	chunk.media_type = media_type;
	chunk.kind = kind;

	Ok(chunk)
}
