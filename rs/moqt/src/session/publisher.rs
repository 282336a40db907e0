use std::{collections::HashSet, fmt, sync::Arc};

use bytes::Buf;
use web_async::Lock;

use crate::{
	Error, Event, Stats,
	coding::{Encode, Reader, Writer, concat},
	message::{ObjectHeader, Subscribe, SubscribeOk},
	model::{ChunkKind, TrackRegistry},
	packager::Packet,
	priority::PriorityHandle,
	transport::{RecvStream, Session},
};

use super::{Control, Lifecycle};

/// Why a send was not attempted.
#[derive(Debug, Clone)]
pub enum Reject {
	/// The session isn't running.
	NotRunning,
	UnknownTrack,
	/// Nobody subscribed to the track yet.
	NoSubscribers,
	/// The first object on a track must be a key chunk.
	DeltaBeforeKey,
	/// The chunk couldn't be packaged.
	Invalid(Error),
}

impl fmt::Display for Reject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NotRunning => f.write_str("session not running"),
			Self::UnknownTrack => f.write_str("unknown track"),
			Self::NoSubscribers => f.write_str("no subscribers"),
			Self::DeltaBeforeKey => f.write_str("delta chunk before the first key chunk"),
			Self::Invalid(err) => write!(f, "invalid chunk: {err}"),
		}
	}
}

/// The result of [super::Engine::send]. Never an error: dropping is normal for real-time media.
#[derive(Debug, Clone)]
pub enum SendOutcome {
	/// An object stream is being written.
	Sent,
	/// The track already had its maximum number of objects in flight.
	Dropped,
	Rejected(Reject),
}

impl SendOutcome {
	pub fn is_sent(&self) -> bool {
		matches!(self, Self::Sent)
	}
}

/// The group/object counters of a published track.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequence {
	group: u64,
	object: u64,
	opened: bool,
}

impl Sequence {
	/// Assign the (group, object) position of the next object.
	///
	/// A key chunk starts a new group. Returns None for a delta chunk before any group was opened,
	/// leaving the counters untouched.
	pub fn next(&mut self, kind: ChunkKind) -> Option<(u64, u64)> {
		match kind {
			ChunkKind::Key => {
				match self.opened {
					true => self.group += 1,
					false => self.opened = true,
				}
				self.object = 0;
			}
			ChunkKind::Delta if !self.opened => return None,
			ChunkKind::Delta => {}
		}

		let position = (self.group, self.object);
		self.object += 1;
		Some(position)
	}

	pub fn group(&self) -> u64 {
		self.group
	}

	pub fn object(&self) -> u64 {
		self.object
	}
}

/// Per track publishing state, locked independently of every other track.
#[derive(Debug)]
pub(crate) struct Publication {
	pub sequence: Sequence,
	pub in_flight: HashSet<String>,
	pub max_in_flight: usize,
}

impl Publication {
	pub fn new(max_in_flight: usize) -> Self {
		Self {
			sequence: Sequence::default(),
			in_flight: HashSet::new(),
			max_in_flight,
		}
	}
}

/// Write a single object on its own stream, waiting until the peer acknowledged it.
///
/// The stream priority follows the object's rank among everything in flight.
pub(crate) async fn write_object<S: Session>(
	session: S,
	header: ObjectHeader,
	packet: Packet,
	mut priority: PriorityHandle,
) -> Result<(), Error> {
	let stream = session.open_uni().await.map_err(Error::transport)?;

	let mut writer = Writer::new(stream);
	writer.set_priority(priority.current());

	let mut buf = concat([header.encode_bytes(), packet.encode_bytes()]);

	while buf.has_remaining() {
		tokio::select! {
			res = writer.write(&mut buf) => { res?; }
			update = priority.next() => writer.set_priority(update),
		}
	}

	writer.finish()?;

	loop {
		tokio::select! {
			res = writer.closed() => return res,
			update = priority.next() => writer.set_priority(update),
		}
	}
}

/// Spawn the task that sends an admitted object and clears its in-flight entry afterwards.
pub(crate) fn spawn_object<S: Session>(
	session: S,
	header: ObjectHeader,
	packet: Packet,
	priority: PriorityHandle,
	publication: Lock<Publication>,
	lifecycle: Lifecycle,
	stats: Arc<dyn Stats>,
) {
	web_async::spawn(async move {
		let id = packet.id().to_string();
		let size = packet.chunk().payload.len() as u64;

		let res = write_object(session, header, packet, priority).await;
		publication.lock().in_flight.remove(&id);

		match res {
			Ok(()) => {
				tracing::trace!(%id, group = header.group, object = header.object, "sent object");
				stats.add_tx_bytes(size);
			}
			Err(err) => {
				tracing::debug!(%id, %err, "failed to send object");
				lifecycle.emit(Event::error(err));
			}
		}
	});
}

/// Answer peer subscribes on the control stream until the session stops.
///
/// Subscribes for unknown tracks or with the wrong auth are logged and left unanswered.
pub(crate) async fn run_accept<R: RecvStream>(
	mut reader: Reader<R>,
	control: Control,
	registry: Lock<TrackRegistry>,
	lifecycle: Lifecycle,
) {
	while lifecycle.is_running() {
		let msg: Subscribe = match reader.decode_message().await {
			Ok(msg) => msg,
			Err(err) => {
				lifecycle.fail(err);
				break;
			}
		};

		if let Err(err) = recv_subscribe(msg, &control, &registry) {
			lifecycle.fail(err);
			break;
		}
	}

	tracing::debug!("subscribe loop done");
}

fn recv_subscribe(msg: Subscribe, control: &Control, registry: &Lock<TrackRegistry>) -> Result<(), Error> {
	let mut registry = registry.lock();

	let Some((label, track)) = registry.find_by_name(&msg.namespace, &msg.name) else {
		tracing::warn!(namespace = %msg.namespace, name = %msg.name, "subscribe for unknown track");
		return Ok(());
	};

	if msg.params.auth.as_deref().unwrap_or_default() != track.auth {
		tracing::warn!(namespace = %msg.namespace, name = %msg.name, "subscribe with invalid auth");
		return Ok(());
	}

	let Some(track_id) = track.id else {
		tracing::warn!(%label, "subscribe for track without an id");
		return Ok(());
	};

	let label = label.to_string();
	let subscribers = registry.add_subscriber(&label)?;
	tracing::info!(%label, subscribers, "accepted subscribe");

	control.send(SubscribeOk {
		namespace: msg.namespace,
		name: msg.name,
		track_id,
		expires: 0,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_delta_first_rejected() {
		let mut seq = Sequence::default();
		assert_eq!(seq.next(ChunkKind::Delta), None);
		assert_eq!((seq.group(), seq.object()), (0, 0));
	}

	#[test]
	fn test_key_then_delta() {
		let mut seq = Sequence::default();
		assert_eq!(seq.next(ChunkKind::Key), Some((0, 0)));
		assert_eq!(seq.next(ChunkKind::Delta), Some((0, 1)));
		assert_eq!(seq.group(), 0);
		assert_eq!(seq.object(), 2);
	}

	#[test]
	fn test_groups() {
		let mut seq = Sequence::default();
		let kinds = [
			ChunkKind::Key,
			ChunkKind::Delta,
			ChunkKind::Delta,
			ChunkKind::Key,
			ChunkKind::Delta,
			ChunkKind::Key,
		];

		let positions: Vec<_> = kinds.into_iter().filter_map(|kind| seq.next(kind)).collect();
		assert_eq!(positions, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (2, 0)]);
	}
}
