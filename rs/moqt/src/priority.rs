//! The send order handed to the transport's stream scheduler; a higher value goes first.
//!
//! The varint range is split in half: normal tracks use the lower half and high priority
//! tracks the upper half, so within a class newer objects outrank older ones while any high
//! priority object outranks every normal one. Negative sequence ids ("send immediately")
//! get the maximum value.
//!
//! WebTransport streams only take a `u8` priority, so a [PriorityQueue] ranks the streams in
//! flight by send order and hands each one its place in that ranking.

use std::collections::BTreeMap;

use tokio::sync::watch;
use web_async::Lock;

use crate::coding::VarInt;

/// The send order of an object that must go out before everything else.
pub const IMMEDIATE: u64 = VarInt::MAX.into_inner();

/// The first send order of the high priority class.
pub const HIGH: u64 = IMMEDIATE / 2;

/// Compute the send order for an object with the given sequence id.
///
/// Sequence ids past the end of a class saturate rather than spill into the next one.
pub fn send_order(seq_id: i64, high_priority: bool) -> u64 {
	if seq_id < 0 {
		return IMMEDIATE;
	}

	let seq = (seq_id as u64).min(HIGH - 1);
	match high_priority {
		true => HIGH + seq,
		false => seq,
	}
}

/// Ranks the object streams in flight by send order.
///
/// The stream with the highest send order gets priority `u8::MAX`, the next one `u8::MAX - 1`
/// and so on; everything ranked past the range shares priority 0. Equal send orders favor the
/// stream inserted last. A stream learns about rank changes through its [PriorityHandle].
#[derive(Clone, Default)]
pub struct PriorityQueue {
	state: Lock<PriorityState>,
}

impl PriorityQueue {
	/// Rank a new stream, which keeps its place until the handle is dropped.
	pub fn insert(&self, order: u64) -> PriorityHandle {
		let mut state = self.state.lock();

		let key = (order, state.next_id);
		state.next_id += 1;

		let (tx, rx) = watch::channel(0);
		state.ranked.insert(key, tx);
		state.update();

		PriorityHandle {
			key,
			rx,
			queue: self.clone(),
		}
	}

	/// The number of streams currently ranked.
	pub fn len(&self) -> usize {
		self.state.lock().ranked.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[derive(Default)]
struct PriorityState {
	// Ordered by (send order, insertion id), so the last entry goes first.
	ranked: BTreeMap<(u64, u64), watch::Sender<u8>>,
	next_id: u64,
}

impl PriorityState {
	fn update(&mut self) {
		for (rank, tx) in self.ranked.values().rev().enumerate() {
			let priority = u8::MAX - u8::try_from(rank).unwrap_or(u8::MAX);
			tx.send_if_modified(|current| {
				if *current == priority {
					return false;
				}
				*current = priority;
				true
			});
		}
	}
}

/// A stream's place in a [PriorityQueue].
pub struct PriorityHandle {
	key: (u64, u64),
	rx: watch::Receiver<u8>,
	queue: PriorityQueue,
}

impl PriorityHandle {
	/// The current stream priority.
	pub fn current(&mut self) -> u8 {
		*self.rx.borrow_and_update()
	}

	/// Wait until the stream priority changes.
	pub async fn next(&mut self) -> u8 {
		// The sender lives until this handle is dropped.
		if self.rx.changed().await.is_err() {
			std::future::pending::<()>().await;
		}
		*self.rx.borrow_and_update()
	}
}

impl Drop for PriorityHandle {
	fn drop(&mut self) {
		let mut state = self.queue.state.lock();
		state.ranked.remove(&self.key);
		state.update();
	}
}
