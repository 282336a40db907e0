use std::time::Duration;

use crate::coding::{Version, Versions};

/// Session limits and timeouts.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct SessionConfig {
	/// How long to wait for the transport to become ready.
	#[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
	pub connect_timeout: Duration,

	/// How long to wait for each control message response.
	#[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
	pub request_timeout: Duration,

	/// The versions offered in the client setup, in preferred order.
	#[cfg_attr(feature = "serde", serde(skip))]
	pub versions: Versions,

	/// The block size used when reading object payloads.
	pub read_block: usize,

	/// The largest object payload we'll buffer before giving up on the stream.
	pub max_payload: usize,

	/// The largest control message or object header we'll buffer before giving up on the stream.
	pub max_message: usize,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			connect_timeout: Duration::from_secs(5),
			request_timeout: Duration::from_secs(5),
			versions: [Version::DRAFT_01].into(),
			read_block: 1024,
			max_payload: 16 * 1024 * 1024,
			max_message: 64 * 1024,
		}
	}
}

/// Jitter buffer sizing and playout pacing.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct JitterConfig {
	/// The most items held before the oldest is evicted.
	pub capacity: usize,

	/// How long an item must wait before it can be played out.
	#[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
	pub min_delay: Duration,

	/// How often the playout loop checks for ready items.
	#[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
	pub playout_interval: Duration,
}

impl JitterConfig {
	/// The largest accepted minimum delay.
	pub const MAX_DELAY: Duration = Duration::from_millis(750);
}

impl Default for JitterConfig {
	fn default() -> Self {
		Self {
			capacity: 30,
			min_delay: Duration::from_millis(100),
			playout_interval: Duration::from_millis(10),
		}
	}
}
