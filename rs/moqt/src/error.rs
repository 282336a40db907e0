use std::{fmt, sync::Arc};

use crate::{
	coding::{BoundsExceeded, DecodeError, Version},
	transport::TransportError,
};

/// The control-plane request a timeout refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
	Setup,
	Announce,
	Subscribe,
	Disconnect,
}

impl fmt::Display for Request {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Setup => f.write_str("setup"),
			Self::Announce => f.write_str("announce"),
			Self::Subscribe => f.write_str("subscribe"),
			Self::Disconnect => f.write_str("disconnect"),
		}
	}
}

/// A list of possible errors that can occur during the session.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	#[error("transport error: {0}")]
	Transport(#[from] TransportError),

	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	#[error("connect timeout")]
	ConnectTimeout,

	#[error("connect failed: {0}")]
	ConnectFailed(TransportError),

	#[error("{0} timed out")]
	Timeout(Request),

	#[error("unsupported version: {0:?}")]
	UnsupportedVersion(Version),

	#[error("namespace mismatch: expected={expected} received={received}")]
	NamespaceMismatch { expected: String, received: String },

	#[error("subscribe mismatch: expected={expected} received={received}")]
	SubscribeMismatch { expected: String, received: String },

	#[error("unknown track id: {0}")]
	UnknownTrackId(u64),

	#[error("unknown track: {0}")]
	UnknownTrack(String),

	#[error("duplicate track: {0}")]
	DuplicateTrack(String),

	#[error("track id already assigned: {0}")]
	TrackIdAssigned(String),

	#[error("publisher track has no in-flight limit: {0}")]
	MissingLimit(String),

	#[error("invalid metadata: {0}")]
	Metadata(Arc<serde_json::Error>),

	#[error("value too large to encode")]
	BoundsExceeded(#[from] BoundsExceeded),

	#[error("not connected")]
	NotConnected,

	#[error("already connected")]
	AlreadyConnected,

	#[error("control stream is owned by the subscription loop")]
	ControlUnavailable,

	#[error("session is not running")]
	NotRunning,

	#[error("session stopped")]
	Stopped,

	#[error("closed")]
	Closed,
}

/// The broad category of an [Error], used when reporting it to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Connect/disconnect failures and transport closure.
	Transport,
	/// Malformed or unexpected control messages.
	Protocol,
	/// Invalid host-supplied track configuration.
	Config,
	/// A single object stream failed to decode.
	Object,
	/// The session can no longer accept commands.
	Unrecoverable,
}

impl Error {
	/// Wrap an error returned by the session or one of its streams.
	pub fn transport<E: web_transport_trait::Error>(err: E) -> Self {
		Self::Transport(TransportError::new(err))
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Transport(_) | Self::ConnectTimeout | Self::ConnectFailed(_) => ErrorKind::Transport,
			Self::Decode(_)
			| Self::Timeout(_)
			| Self::UnsupportedVersion(_)
			| Self::NamespaceMismatch { .. }
			| Self::SubscribeMismatch { .. } => ErrorKind::Protocol,
			Self::UnknownTrack(_)
			| Self::DuplicateTrack(_)
			| Self::TrackIdAssigned(_)
			| Self::MissingLimit(_)
			| Self::Metadata(_)
			| Self::BoundsExceeded(_) => ErrorKind::Config,
			Self::UnknownTrackId(_) => ErrorKind::Object,
			Self::NotConnected
			| Self::AlreadyConnected
			| Self::ControlUnavailable
			| Self::NotRunning
			| Self::Stopped
			| Self::Closed => ErrorKind::Unrecoverable,
		}
	}

	/// An integer code used when resetting streams or closing the session.
	pub fn to_code(&self) -> u32 {
		match self {
			Self::Closed | Self::Stopped => 0,
			Self::Transport(_) | Self::ConnectTimeout | Self::ConnectFailed(_) => 1,
			Self::Decode(_) => 2,
			Self::UnsupportedVersion(_) => 3,
			Self::Timeout(_) => 4,
			Self::NamespaceMismatch { .. } | Self::SubscribeMismatch { .. } => 5,
			Self::UnknownTrackId(_) | Self::UnknownTrack(_) => 6,
			Self::DuplicateTrack(_)
			| Self::TrackIdAssigned(_)
			| Self::MissingLimit(_)
			| Self::Metadata(_)
			| Self::BoundsExceeded(_) => 7,
			Self::NotConnected | Self::AlreadyConnected | Self::ControlUnavailable | Self::NotRunning => 8,
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Metadata(Arc::new(err))
	}
}
