use bytes::Bytes;

use crate::{
	Error, ErrorKind,
	model::{Chunk, MediaType},
};

/// Something that happened in the session, delivered to the host.
#[derive(Debug, Clone)]
pub enum Event {
	/// Text received on a raw track.
	Data { track: String, seq_id: i64, text: String },

	/// A media chunk received on a loc track, ready for the decoder.
	MediaChunk { track: String, header: ObjectInfo, chunk: Chunk },

	/// The delay between capture and arrival of a media chunk.
	Latency { track: String, media: MediaType, ms: i64 },

	/// A failure that didn't stop the session, or a failed background loop.
	Error { kind: ErrorKind, error: Error },

	/// The session was closed; always the last event.
	Closed,
}

impl Event {
	pub fn error(error: Error) -> Self {
		Self::Error {
			kind: error.kind(),
			error,
		}
	}
}

/// Where an object sat in its track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
	pub track_id: u64,
	pub group: u64,
	pub object: u64,
	pub send_order: u64,
}

// Raw track payloads are UTF-8 text.
pub(crate) fn to_text(payload: Bytes) -> Result<String, Error> {
	String::from_utf8(payload.to_vec()).map_err(|e| crate::coding::DecodeError::InvalidString(e).into())
}

/// Consumes events emitted by the session.
///
/// May be cloned; each event is delivered to exactly one of the clones.
#[derive(Clone)]
pub struct Events {
	rx: async_channel::Receiver<Event>,
}

impl Events {
	pub(crate) fn new(rx: async_channel::Receiver<Event>) -> Self {
		Self { rx }
	}

	/// Returns the next event, or None once the session is gone and all events were consumed.
	pub async fn next(&mut self) -> Option<Event> {
		self.rx.recv().await.ok()
	}

	/// Returns an event if one is immediately available.
	pub fn try_next(&mut self) -> Option<Event> {
		self.rx.try_recv().ok()
	}
}
