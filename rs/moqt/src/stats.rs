//! Lightweight application-level statistics hooks.
//!
//! Counts object payload bytes in each direction, plus the objects shed by admission
//! control. This intentionally ignores transport-level effects such as retransmissions.

use std::sync::atomic::{AtomicU64, Ordering};

/// A sink for application-level accounting.
///
/// Implementations should be fast and non-blocking (e.g., atomics).
pub trait Stats: Send + Sync + 'static {
	/// Record object bytes received by the session (from the network).
	fn add_rx_bytes(&self, bytes: u64);

	/// Record object bytes sent by the session (to the network).
	fn add_tx_bytes(&self, bytes: u64);

	/// Record an object dropped because its track had too many objects in flight.
	fn add_dropped(&self, track: &str);
}

/// Default stats sink that does nothing.
#[derive(Default)]
pub struct NoopStats;

impl Stats for NoopStats {
	fn add_rx_bytes(&self, _bytes: u64) {}
	fn add_tx_bytes(&self, _bytes: u64) {}
	fn add_dropped(&self, _track: &str) {}
}

/// A stats sink backed by atomic counters.
#[derive(Default, Debug)]
pub struct Counters {
	pub rx_bytes: AtomicU64,
	pub tx_bytes: AtomicU64,
	pub dropped: AtomicU64,
}

impl Stats for Counters {
	fn add_rx_bytes(&self, bytes: u64) {
		self.rx_bytes.fetch_add(bytes, Ordering::Relaxed);
	}

	fn add_tx_bytes(&self, bytes: u64) {
		self.tx_bytes.fetch_add(bytes, Ordering::Relaxed);
	}

	fn add_dropped(&self, track: &str) {
		tracing::debug!(track, "dropped object");
		self.dropped.fetch_add(1, Ordering::Relaxed);
	}
}

impl Counters {
	pub fn rx_bytes(&self) -> u64 {
		self.rx_bytes.load(Ordering::Relaxed)
	}

	pub fn tx_bytes(&self) -> u64 {
		self.tx_bytes.load(Ordering::Relaxed)
	}

	pub fn dropped(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}
}
