//! The WebTransport session this crate runs on top of.
//!
//! The engine never touches sockets; it opens and accepts streams on any
//! [web_transport_trait::Session]. Congestion control, retransmission and encryption are all
//! delegated to the implementation (see `moqt-native` for WebTransport over quinn).

use std::{future::Future, sync::Arc};

use url::Url;

#[cfg(test)]
pub(crate) mod mock;

pub use web_transport_trait::{RecvStream, SendStream, Session};

/// An error reported by the underlying transport.
#[derive(thiserror::Error, Debug, Clone)]
pub enum TransportError {
	#[error("session closed: code={code} reason={reason}")]
	Closed { code: u32, reason: String },

	#[error("stream error: code={0}")]
	Stream(u32),

	#[error("transport error: {0}")]
	Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
	/// Classify an error returned by a session or one of its streams.
	pub fn new<E: web_transport_trait::Error>(err: E) -> Self {
		if let Some((code, reason)) = err.session_error() {
			return Self::Closed { code, reason };
		}

		if let Some(code) = err.stream_error() {
			return Self::Stream(code);
		}

		Self::Other(Arc::new(err))
	}

	pub fn other<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
		Self::Other(Arc::new(err))
	}
}

/// Establishes a [Session] to an endpoint.
///
/// The returned future resolving is the transport's "ready" signal.
pub trait Connector: Send + Sync + 'static {
	type Session: Session;

	fn connect(&self, url: &Url) -> impl Future<Output = Result<Self::Session, TransportError>> + Send;
}
