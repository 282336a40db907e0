use std::fmt::Debug;

use bytes::Buf;

use crate::{Error, coding::*, message::Message, transport::SendStream};

/// A wrapper around a [SendStream] that will reset on Drop unless finished.
pub struct Writer<S: SendStream> {
	stream: S,
	buffer: bytes::BytesMut,
	finished: bool,
}

impl<S: SendStream> Writer<S> {
	/// Create a new writer for the given stream.
	pub fn new(stream: S) -> Self {
		Self {
			stream,
			buffer: Default::default(),
			finished: false,
		}
	}

	/// Encode the given value to the stream.
	pub async fn encode<T: Encode + Debug>(&mut self, msg: &T) -> Result<(), Error> {
		self.buffer.clear();
		msg.encode(&mut self.buffer);
		self.flush().await
	}

	/// Encode a control message, prefixed with its type.
	pub async fn encode_message<M: Message + Debug>(&mut self, msg: &M) -> Result<(), Error> {
		tracing::debug!(message = ?msg, "sending control message");

		self.buffer.clear();
		msg.encode(&mut self.buffer);
		tracing::trace!(id = M::ID, size = self.buffer.len(), hex = %hex::encode(&self.buffer), "encoded control message");

		self.flush().await
	}

	async fn flush(&mut self) -> Result<(), Error> {
		while !self.buffer.is_empty() {
			self.stream
				.write_buf(&mut self.buffer)
				.await
				.map_err(Error::transport)?;
		}

		Ok(())
	}

	/// Write part of the buffer, returning how much was written.
	///
	/// Cancel safe: nothing is consumed from `buf` unless the write completes.
	pub async fn write<B: Buf + Send>(&mut self, buf: &mut B) -> Result<usize, Error> {
		self.stream.write_buf(buf).await.map_err(Error::transport)
	}

	/// Write the entire buffer to the stream.
	pub async fn write_all<B: Buf + Send>(&mut self, buf: &mut B) -> Result<(), Error> {
		while buf.has_remaining() {
			self.write(buf).await?;
		}
		Ok(())
	}

	/// Mark the stream as finished.
	pub fn finish(&mut self) -> Result<(), Error> {
		self.finished = true;
		self.stream.finish().map_err(Error::transport)
	}

	/// Wait for the stream to be closed, or the [Self::finish] to be acknowledged by the peer.
	pub async fn closed(&mut self) -> Result<(), Error> {
		self.stream.closed().await.map_err(Error::transport)
	}

	/// Set the priority of the stream; a higher value is sent first.
	pub fn set_priority(&mut self, priority: u8) {
		self.stream.set_priority(priority);
	}
}

impl<S: SendStream> Drop for Writer<S> {
	fn drop(&mut self) {
		if !self.finished {
			self.stream.reset(Error::Closed.to_code());
		}
	}
}
