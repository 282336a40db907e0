use std::{cmp, fmt::Debug, io};

use bytes::{Buf, Bytes, BytesMut};

use crate::{Error, coding::*, message::Message, transport::RecvStream};

/// The most we'll ask the transport for in a single read.
const READ_SIZE: usize = 64 * 1024;

/// A reader for decoding messages from a stream.
pub struct Reader<S: RecvStream> {
	stream: S,
	buffer: BytesMut,

	// The largest partially decoded value we'll buffer.
	limit: usize,
}

impl<S: RecvStream> Reader<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream,
			buffer: Default::default(),
			limit: usize::MAX,
		}
	}

	/// Fail with [DecodeError::BoundsExceeded] instead of buffering a value past `limit` bytes.
	pub fn with_limit(mut self, limit: usize) -> Self {
		self.limit = limit;
		self
	}

	/// Decode the next value from the stream.
	pub async fn decode<T: Decode + Debug>(&mut self) -> Result<T, Error> {
		self.decode_with(|c| T::decode(c)).await
	}

	/// Decode the next control message, failing if it carries a different type.
	pub async fn decode_message<M: Message + Debug>(&mut self) -> Result<M, Error> {
		let msg: M = self.decode_with(|c| M::decode(c)).await?;
		tracing::debug!(message = ?msg, "received control message");
		Ok(msg)
	}

	async fn decode_with<T, F>(&mut self, f: F) -> Result<T, Error>
	where
		F: Fn(&mut io::Cursor<&BytesMut>) -> Result<T, DecodeError>,
	{
		loop {
			let mut cursor = io::Cursor::new(&self.buffer);
			match f(&mut cursor) {
				Ok(msg) => {
					self.buffer.advance(cursor.position() as usize);
					return Ok(msg);
				}
				Err(DecodeError::Short) => {
					if self.buffer.len() >= self.limit {
						return Err(DecodeError::BoundsExceeded.into());
					}

					// The stream ended mid-value.
					if !self.fill().await? {
						return Err(DecodeError::Truncated.into());
					}
				}
				Err(e) => return Err(e.into()),
			}
		}
	}

	// Returns false if the stream is finished.
	async fn fill(&mut self) -> Result<bool, Error> {
		match self.stream.read_chunk(READ_SIZE).await.map_err(Error::transport)? {
			Some(chunk) => {
				self.buffer.extend_from_slice(&chunk);
				Ok(true)
			}
			None => Ok(false),
		}
	}

	/// Return buffered data first, then up to `max` bytes from the stream; None once finished.
	pub async fn read(&mut self, max: usize) -> Result<Option<Bytes>, Error> {
		if !self.buffer.is_empty() {
			let size = cmp::min(max, self.buffer.len());
			let data = self.buffer.split_to(size).freeze();
			return Ok(Some(data));
		}

		self.stream.read_chunk(max).await.map_err(Error::transport)
	}

	/// Read exactly the given number of bytes from the stream.
	pub async fn read_exact(&mut self, size: usize) -> Result<Bytes, Error> {
		while self.buffer.len() < size {
			if !self.fill().await? {
				return Err(DecodeError::Truncated.into());
			}
		}

		Ok(self.buffer.split_to(size).freeze())
	}

	/// Read until the stream is finished, `block` bytes at a time.
	///
	/// Errors with [DecodeError::BoundsExceeded] rather than buffering more than `limit` bytes.
	pub async fn read_to_end(&mut self, block: usize, limit: usize) -> Result<Bytes, Error> {
		let mut data = BytesMut::new();

		while let Some(chunk) = self.read(block).await? {
			if data.len() + chunk.len() > limit {
				return Err(DecodeError::BoundsExceeded.into());
			}
			data.extend_from_slice(&chunk);
		}

		Ok(data.freeze())
	}

	/// Abort the stream with the given error.
	pub fn abort(&mut self, err: &Error) {
		self.stream.stop(err.to_code());
	}
}
