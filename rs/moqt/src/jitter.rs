//! A small reorder/delay buffer between the network and the decoder.
//!
//! Items arrive possibly out of order and in bursts; they're kept sorted by sequence id and
//! released only once they've waited at least the minimum delay, which turns network jitter
//! into a steady, slightly delayed playout cadence.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use web_async::Lock;

use crate::{JitterConfig, model::Chunk};

/// An item waiting in the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct JitterItem<T = Chunk> {
	pub seq_id: i64,

	/// When the item arrived, in milliseconds.
	pub clock: u64,

	pub value: T,
}

/// A bounded buffer kept sorted by sequence id, evicting the oldest item when full.
#[derive(Debug)]
pub struct JitterBuffer<T = Chunk> {
	items: Vec<JitterItem<T>>,
	capacity: usize,
	min_delay: Duration,
	last_seq_id: Option<i64>,
	evicted: u64,
}

impl<T> JitterBuffer<T> {
	pub fn new(config: JitterConfig) -> Self {
		let mut this = Self {
			items: Vec::with_capacity(config.capacity + 1),
			capacity: config.capacity.max(1),
			min_delay: Duration::ZERO,
			last_seq_id: None,
			evicted: 0,
		};
		this.set_min_delay(config.min_delay);
		this
	}

	/// Insert an item, returning the item evicted to make room for it, if any.
	pub fn insert(&mut self, item: JitterItem<T>) -> Option<JitterItem<T>> {
		self.items.push(item);

		let evicted = match self.items.len() > self.capacity {
			true => {
				self.evicted += 1;
				Some(self.items.remove(0))
			}
			false => None,
		};

		// Stable, so equal sequence ids keep their arrival order.
		self.items.sort_by_key(|item| item.seq_id);

		if let Some(evicted) = &evicted {
			tracing::debug!(seq_id = evicted.seq_id, "jitter buffer full, evicted oldest");
		}

		evicted
	}

	/// Remove the first item if it arrived more than the minimum delay before `now` (in ms).
	///
	/// Never waits; returns None if the head isn't ready yet.
	pub fn pop_ready(&mut self, now: u64) -> Option<JitterItem<T>> {
		let head = self.items.first()?;

		let min_delay = self.min_delay.as_millis() as u64;
		if head.clock.saturating_add(min_delay) >= now {
			return None;
		}

		let item = self.items.remove(0);
		self.last_seq_id = Some(item.seq_id);
		Some(item)
	}

	/// Change the minimum delay, clamped to [0, 750ms].
	pub fn set_min_delay(&mut self, delay: Duration) {
		self.min_delay = delay.min(JitterConfig::MAX_DELAY);
	}

	pub fn min_delay(&self) -> Duration {
		self.min_delay
	}

	/// The sequence id of the last item played out, used to detect gaps.
	pub fn last_seq_id(&self) -> Option<i64> {
		self.last_seq_id
	}

	/// The number of items evicted because the buffer was full.
	pub fn evicted(&self) -> u64 {
		self.evicted
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}

/// A [JitterBuffer] shared between the receive side and the playout side.
pub struct SharedJitterBuffer<T = Chunk> {
	inner: Lock<JitterBuffer<T>>,
}

impl<T> Clone for SharedJitterBuffer<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> SharedJitterBuffer<T> {
	pub fn new(config: JitterConfig) -> Self {
		Self {
			inner: Lock::new(JitterBuffer::new(config)),
		}
	}

	/// Insert an item that arrived just now.
	pub fn push(&self, seq_id: i64, value: T) -> Option<JitterItem<T>> {
		let item = JitterItem {
			seq_id,
			clock: now_ms(),
			value,
		};
		self.inner.lock().insert(item)
	}

	pub fn insert(&self, item: JitterItem<T>) -> Option<JitterItem<T>> {
		self.inner.lock().insert(item)
	}

	pub fn pop_ready(&self, now: u64) -> Option<JitterItem<T>> {
		self.inner.lock().pop_ready(now)
	}

	pub fn set_min_delay(&self, delay: Duration) {
		self.inner.lock().set_min_delay(delay);
	}

	pub fn last_seq_id(&self) -> Option<i64> {
		self.inner.lock().last_seq_id()
	}

	pub fn len(&self) -> usize {
		self.inner.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.lock().is_empty()
	}
}

/// Drains a [SharedJitterBuffer] on a fixed cadence, forwarding ready items in order.
pub struct Playout<T = Chunk> {
	buffer: SharedJitterBuffer<T>,
	interval: Duration,
	clock: fn() -> u64,
}

impl<T: Send + 'static> Playout<T> {
	pub fn new(buffer: SharedJitterBuffer<T>, config: JitterConfig) -> Self {
		Self {
			buffer,
			interval: config.playout_interval.max(Duration::from_millis(1)),
			clock: now_ms,
		}
	}

	/// Use a different clock, returning milliseconds.
	pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
		self.clock = clock;
		self
	}

	/// Run until the receiver is dropped.
	///
	/// Every tick, all ready items are sent in sequence order. A jump in sequence ids is logged.
	pub async fn run(self, output: tokio::sync::mpsc::Sender<JitterItem<T>>) {
		let mut interval = tokio::time::interval(self.interval);
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = interval.tick() => {},
				_ = output.closed() => return,
			}

			let now = (self.clock)();
			loop {
				let previous = self.buffer.last_seq_id();
				let Some(item) = self.buffer.pop_ready(now) else {
					break;
				};

				if let Some(previous) = previous
					&& item.seq_id > previous + 1
				{
					tracing::debug!(previous, next = item.seq_id, "playout gap");
				}

				if output.send(item).await.is_err() {
					return;
				}
			}
		}
	}
}

/// Milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default()
}
