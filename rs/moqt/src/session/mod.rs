//! The session engine: setup, announce/subscribe and the object exchange that follows.

mod control;
mod lifecycle;
mod publisher;
mod subscriber;

pub use lifecycle::SessionState;
pub use publisher::{Reject, SendOutcome, Sequence};

pub(crate) use control::*;
pub(crate) use lifecycle::*;
use publisher::*;
use subscriber::*;

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use url::Url;
use web_async::Lock;

use crate::{
	Error, Events, NoopStats, Request, SessionConfig, Stats,
	coding::{Reader, Stream},
	message::{Announce, AnnounceOk, ClientSetup, Message, ObjectHeader, Parameters, Role, ServerSetup, Subscribe, SubscribeOk},
	model::{Chunk, Track, TrackRegistry},
	packager::Packet,
	priority::{self, PriorityQueue},
	transport::{Connector, Session},
};

type RecvStreamOf<C> = <<C as Connector>::Session as Session>::RecvStream;

/// A single MoQ session, driven by one owner.
///
/// Created via [Engine::new], then [Engine::connect] followed by either [Engine::publish] or
/// [Engine::subscribe]. Everything that happens in the background is reported through [Events].
pub struct Engine<C: Connector> {
	connector: C,
	config: SessionConfig,
	lifecycle: Lifecycle,
	events: Events,

	session: Option<C::Session>,
	control: Option<Control>,

	// Moved into the subscribe loop once publishing.
	reader: Option<Reader<RecvStreamOf<C>>>,

	registry: Lock<TrackRegistry>,
	publications: HashMap<String, Lock<Publication>>,

	// Every object stream in flight, across all tracks.
	priority: PriorityQueue,

	stats: Arc<dyn Stats>,
}

impl<C: Connector> Engine<C> {
	pub fn new(connector: C, config: SessionConfig) -> Self {
		let (tx, rx) = async_channel::unbounded();

		Self {
			connector,
			config,
			lifecycle: Lifecycle::new(tx),
			events: Events::new(rx),
			session: None,
			control: None,
			reader: None,
			registry: Default::default(),
			publications: HashMap::new(),
			priority: PriorityQueue::default(),
			stats: Arc::new(NoopStats),
		}
	}

	/// Report byte counts and drops to the given sink.
	pub fn with_stats(mut self, stats: Arc<dyn Stats>) -> Self {
		self.stats = stats;
		self
	}

	/// The receiving end of the session's events.
	pub fn events(&self) -> Events {
		self.events.clone()
	}

	pub fn state(&self) -> SessionState {
		self.lifecycle.get()
	}

	/// A snapshot of the configured tracks.
	pub fn tracks(&self) -> TrackRegistry {
		self.registry.lock().clone()
	}

	/// Connect to the endpoint and open the control stream.
	///
	/// Fails with [Error::ConnectTimeout] if the transport isn't ready in time, or
	/// [Error::ConnectFailed] if it reports an error first.
	pub async fn connect(&mut self, url: &Url) -> Result<(), Error> {
		self.lifecycle.begin()?;

		if self.session.is_some() {
			return Err(Error::AlreadyConnected);
		}

		tracing::debug!(%url, "connecting");

		let session = match tokio::time::timeout(self.config.connect_timeout, self.connector.connect(url)).await {
			Ok(Ok(session)) => session,
			Ok(Err(err)) => return Err(Error::ConnectFailed(err)),
			Err(_) => return Err(Error::ConnectTimeout),
		};

		let stream = match tokio::time::timeout(self.config.connect_timeout, Stream::open(&session)).await {
			Ok(res) => res?,
			Err(_) => return Err(Error::ConnectTimeout),
		};

		self.control = Some(Control::new(stream.writer));
		self.reader = Some(stream.reader.with_limit(self.config.max_message));

		// A transport close always stops the session.
		let closed = session.clone();
		let lifecycle = self.lifecycle.clone();
		web_async::spawn(async move {
			let err = closed.closed().await;
			lifecycle.fail(Error::transport(err));
		});

		self.session = Some(session);

		tracing::info!(%url, "connected");
		Ok(())
	}

	/// Start publishing the given tracks, keyed by label.
	///
	/// Runs the setup handshake, announces every namespace in first-seen order, then answers
	/// peer subscribes in the background.
	pub async fn publish<I, L>(&mut self, tracks: I) -> Result<(), Error>
	where
		I: IntoIterator<Item = (L, Track)>,
		L: Into<String>,
	{
		self.lifecycle.begin()?;
		self.registry.lock().merge_publisher(tracks)?;

		self.setup(Role::Publisher).await?;

		let namespaces: Vec<(String, String)> = {
			let registry = self.registry.lock();
			registry
				.namespaces()
				.into_iter()
				.map(|namespace| {
					let auth = registry
						.iter()
						.find(|(_, track)| track.namespace == namespace)
						.map(|(_, track)| track.auth.clone())
						.unwrap_or_default();
					(namespace, auth)
				})
				.collect()
		};

		for (namespace, auth) in namespaces {
			self.control()?.send(Announce {
				namespace: namespace.clone(),
				params: Parameters::auth(auth),
			})?;

			let ok: AnnounceOk = self.recv(Request::Announce).await?;
			if ok.namespace != namespace {
				return Err(Error::NamespaceMismatch {
					expected: namespace,
					received: ok.namespace,
				});
			}

			tracing::info!(%namespace, "announced");
		}

		for (label, track) in self.registry.lock().iter() {
			let max = track.max_in_flight.unwrap_or_default();
			self.publications
				.entry(label.to_string())
				.and_modify(|publication| publication.lock().max_in_flight = max)
				.or_insert_with(|| Lock::new(Publication::new(max)));
		}

		self.lifecycle.run()?;

		let reader = self.reader.take().ok_or(Error::ControlUnavailable)?;
		web_async::spawn(run_accept(
			reader,
			self.control()?.clone(),
			self.registry.clone(),
			self.lifecycle.clone(),
		));

		Ok(())
	}

	/// Subscribe to the given tracks, keyed by label.
	///
	/// Runs the setup handshake and one subscribe round trip per track, then delivers objects
	/// as [crate::Event]s in the background.
	pub async fn subscribe<I, L>(&mut self, tracks: I) -> Result<(), Error>
	where
		I: IntoIterator<Item = (L, Track)>,
		L: Into<String>,
	{
		self.lifecycle.begin()?;

		let tracks: Vec<(String, Track)> = tracks.into_iter().map(|(label, track)| (label.into(), track)).collect();
		let labels: Vec<String> = tracks.iter().map(|(label, _)| label.clone()).collect();
		self.registry.lock().merge(tracks)?;

		self.setup(Role::Subscriber).await?;

		for label in labels {
			let track = self
				.registry
				.lock()
				.get(&label)
				.cloned()
				.ok_or_else(|| Error::UnknownTrack(label.clone()))?;

			self.control()?
				.send(Subscribe::live(&track.namespace, &track.name, &track.auth))?;

			let ok: SubscribeOk = self.recv(Request::Subscribe).await?;
			if ok.namespace != track.namespace || ok.name != track.name {
				return Err(Error::SubscribeMismatch {
					expected: track.full_name(),
					received: format!("{}/{}", ok.namespace, ok.name),
				});
			}

			self.registry.lock().set_id(&label, ok.track_id)?;
			tracing::info!(%label, track = %track.full_name(), id = ok.track_id, "subscribed");
		}

		let start = !self.lifecycle.is_running();
		self.lifecycle.run()?;

		if start {
			web_async::spawn(run_recv(
				self.session()?.clone(),
				self.registry.clone(),
				self.lifecycle.clone(),
				self.config.clone(),
				self.stats.clone(),
			));
		}

		Ok(())
	}

	/// Send a chunk on the labelled track, as a single object on a new stream.
	///
	/// Returns immediately; a failure while writing the stream is reported as an event.
	pub fn send(&self, label: &str, chunk: Chunk) -> SendOutcome {
		if let Err(err) = self.lifecycle.begin() {
			tracing::debug!(%err, track = label, "send after stop");
			return SendOutcome::Rejected(Reject::NotRunning);
		}

		if !self.lifecycle.is_running() {
			return SendOutcome::Rejected(Reject::NotRunning);
		}

		let (Some(session), Some(publication)) = (self.session.clone(), self.publications.get(label)) else {
			return SendOutcome::Rejected(Reject::UnknownTrack);
		};

		let Some(track) = self.registry.lock().get(label).cloned() else {
			return SendOutcome::Rejected(Reject::UnknownTrack);
		};

		if track.subscribers == 0 {
			return SendOutcome::Rejected(Reject::NoSubscribers);
		}

		let Some(track_id) = track.id else {
			return SendOutcome::Rejected(Reject::UnknownTrack);
		};

		let mut state = publication.lock();

		if state.in_flight.len() >= state.max_in_flight {
			tracing::debug!(track = label, in_flight = state.in_flight.len(), "too many objects in flight");
			self.stats.add_dropped(label);
			return SendOutcome::Dropped;
		}

		let packet = match Packet::new(track.packager, chunk) {
			Ok(packet) => packet,
			Err(err) => return SendOutcome::Rejected(Reject::Invalid(err)),
		};

		let Some((group, object)) = state.sequence.next(packet.chunk().kind) else {
			return SendOutcome::Rejected(Reject::DeltaBeforeKey);
		};

		let header = ObjectHeader {
			track_id,
			group,
			object,
			send_order: priority::send_order(packet.chunk().seq_id, track.high_priority),
			length: None,
		};

		state.in_flight.insert(packet.id().to_string());
		drop(state);

		spawn_object(
			session,
			header,
			packet,
			self.priority.insert(header.send_order),
			publication.clone(),
			self.lifecycle.clone(),
			self.stats.clone(),
		);

		SendOutcome::Sent
	}

	/// The number of objects still being written on the labelled track.
	pub fn in_flight(&self, label: &str) -> usize {
		self.publications
			.get(label)
			.map(|publication| publication.lock().in_flight.len())
			.unwrap_or_default()
	}

	/// The group/object counters of the labelled track.
	pub fn sequence(&self, label: &str) -> Option<Sequence> {
		self.publications.get(label).map(|publication| publication.lock().sequence)
	}

	/// Stop the session: finish the control stream, then close the transport.
	///
	/// Both steps are best effort; their failures are reported as events. Finishing the control
	/// stream gives up after the request timeout.
	pub async fn disconnect(&mut self) {
		if !self.lifecycle.stop() {
			return;
		}

		if let Some(control) = self.control.take() {
			let res = match tokio::time::timeout(self.config.request_timeout, control.finish()).await {
				Ok(res) => res,
				Err(_) => Err(Error::Timeout(Request::Disconnect)),
			};

			if let Err(err) = res {
				tracing::debug!(%err, "failed to finish control stream");
				self.lifecycle.emit(crate::Event::error(err));
			}
		}

		if let Some(session) = self.session.take() {
			session.close(0, "disconnect");
		}

		self.reader = None;

		tracing::info!("disconnected");
		self.lifecycle.emit(crate::Event::Closed);
	}

	async fn setup(&mut self, role: Role) -> Result<ServerSetup, Error> {
		self.control()?.send(ClientSetup::new(self.config.versions.clone(), role))?;

		let server: ServerSetup = self.recv(Request::Setup).await?;
		if !self.config.versions.contains(&server.version) {
			return Err(Error::UnsupportedVersion(server.version));
		}

		tracing::debug!(version = ?server.version, ?role, "setup complete");
		Ok(server)
	}

	// Wait for the next control message, bounded by the request timeout.
	async fn recv<M: Message + Debug>(&mut self, request: Request) -> Result<M, Error> {
		if self.lifecycle.get() == SessionState::Stopped {
			return Err(Error::Stopped);
		}

		let timeout = self.config.request_timeout;
		let reader = match (&self.session, self.reader.as_mut()) {
			(_, Some(reader)) => reader,
			(None, None) => return Err(Error::NotConnected),
			(Some(_), None) => return Err(Error::ControlUnavailable),
		};

		match tokio::time::timeout(timeout, reader.decode_message::<M>()).await {
			Ok(res) => res,
			Err(_) => Err(Error::Timeout(request)),
		}
	}

	fn control(&self) -> Result<&Control, Error> {
		self.control.as_ref().ok_or(Error::NotConnected)
	}

	fn session(&self) -> Result<&C::Session, Error> {
		self.session.as_ref().ok_or(Error::NotConnected)
	}
}

impl<C: Connector> Drop for Engine<C> {
	fn drop(&mut self) {
		if self.lifecycle.stop() {
			if let Some(session) = self.session.take() {
				session.close(0, "dropped");
			}
			self.lifecycle.emit(crate::Event::Closed);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use bytes::Bytes;

	use super::*;
	use crate::{
		Counters, ErrorKind, Event,
		coding::{DecodeError, Encode, Version},
		model::{ChunkKind, MediaType, PackagerKind},
		transport::{
			TransportError,
			mock::{self, MockConnector, MockError, MockPeer},
		},
	};

	fn url() -> Url {
		Url::parse("https://localhost:4443/moq").unwrap()
	}

	async fn connect() -> (Engine<MockConnector>, MockPeer) {
		connect_with(SessionConfig::default()).await
	}

	async fn connect_with(config: SessionConfig) -> (Engine<MockConnector>, MockPeer) {
		let (session, peer) = mock::session();
		let mut engine = Engine::new(MockConnector::ready(session), config);
		engine.connect(&url()).await.unwrap();
		(engine, peer)
	}

	async fn accept_setup(peer: &mut MockPeer, role: Role) {
		let setup: ClientSetup = peer.reader.decode_message().await.unwrap();
		assert_eq!(setup.params.role, Some(role));
		assert_eq!(&setup.versions[..], &[Version::DRAFT_01]);

		peer.writer
			.encode_message(&ServerSetup {
				version: Version::DRAFT_01,
				params: Parameters::role(Role::Both),
			})
			.await
			.unwrap();
	}

	async fn accept_announces(peer: &mut MockPeer, expected: &[&str]) {
		for namespace in expected {
			let announce: Announce = peer.reader.decode_message().await.unwrap();
			assert_eq!(announce.namespace, *namespace);

			peer.writer
				.encode_message(&AnnounceOk {
					namespace: announce.namespace,
				})
				.await
				.unwrap();
		}
	}

	async fn publishing(tracks: Vec<(&'static str, Track)>) -> (Engine<MockConnector>, MockPeer) {
		publishing_with(SessionConfig::default(), tracks).await
	}

	async fn publishing_with(
		config: SessionConfig,
		tracks: Vec<(&'static str, Track)>,
	) -> (Engine<MockConnector>, MockPeer) {
		let (mut engine, mut peer) = connect_with(config).await;

		let mut namespaces: Vec<String> = Vec::new();
		for (_, track) in &tracks {
			if !namespaces.contains(&track.namespace) {
				namespaces.push(track.namespace.clone());
			}
		}
		let namespaces: Vec<&str> = namespaces.iter().map(String::as_str).collect();

		let (res, ()) = tokio::join!(engine.publish(tracks), async {
			accept_setup(&mut peer, Role::Publisher).await;
			accept_announces(&mut peer, &namespaces).await;
		});
		res.unwrap();

		assert_eq!(engine.state(), SessionState::Running);
		(engine, peer)
	}

	async fn peer_subscribe(peer: &mut MockPeer, namespace: &str, name: &str, auth: &str) -> SubscribeOk {
		peer.writer
			.encode_message(&Subscribe::live(namespace, name, auth))
			.await
			.unwrap();
		peer.reader.decode_message().await.unwrap()
	}

	async fn subscribing(tracks: Vec<(&'static str, Track, u64)>) -> (Engine<MockConnector>, MockPeer) {
		let (mut engine, mut peer) = connect().await;

		let config: Vec<(&str, Track)> = tracks.iter().map(|(label, track, _)| (*label, track.clone())).collect();
		let (res, ()) = tokio::join!(engine.subscribe(config), async {
			accept_setup(&mut peer, Role::Subscriber).await;

			for (_, track, id) in &tracks {
				let subscribe: Subscribe = peer.reader.decode_message().await.unwrap();
				assert_eq!(subscribe.namespace, track.namespace);
				assert_eq!(subscribe.name, track.name);
				assert_eq!(subscribe.params.auth.as_deref(), Some(track.auth.as_str()));

				peer.writer
					.encode_message(&SubscribeOk {
						namespace: subscribe.namespace,
						name: subscribe.name,
						track_id: *id,
						expires: 0,
					})
					.await
					.unwrap();
			}
		});
		res.unwrap();

		(engine, peer)
	}

	async fn send_object(peer: &MockPeer, header: ObjectHeader, packet: &Packet) {
		let mut writer = peer.open_uni();
		writer.encode(&header).await.unwrap();
		writer.encode(packet).await.unwrap();
		writer.finish().unwrap();
	}

	async fn wait_idle(engine: &Engine<MockConnector>, label: &str) {
		tokio::time::timeout(Duration::from_secs(1), async {
			while engine.in_flight(label) > 0 {
				tokio::task::yield_now().await;
			}
		})
		.await
		.expect("objects still in flight");
	}

	fn chat() -> Track {
		Track::new("chat", "room", PackagerKind::Raw)
			.with_auth("secret")
			.with_max_in_flight(2)
	}

	#[tokio::test(start_paused = true)]
	async fn test_connect_timeout() {
		let mut engine = Engine::new(MockConnector::Pending, SessionConfig::default());
		let err = engine.connect(&url()).await.unwrap_err();
		assert!(matches!(err, Error::ConnectTimeout));
		assert_eq!(err.kind(), ErrorKind::Transport);
	}

	#[tokio::test]
	async fn test_connect_failed() {
		let connector = MockConnector::Fail(TransportError::Closed {
			code: 7,
			reason: "refused".to_string(),
		});
		let mut engine = Engine::new(connector, SessionConfig::default());

		let err = engine.connect(&url()).await.unwrap_err();
		assert!(matches!(err, Error::ConnectFailed(TransportError::Closed { code: 7, .. })));
		assert_eq!(engine.state(), SessionState::Instantiated);
	}

	#[tokio::test]
	async fn test_send_before_running() {
		let (session, mut peer) = mock::session();
		let mut engine = Engine::new(MockConnector::ready(session), SessionConfig::default());

		let outcome = engine.send("data", Chunk::data(0, "hi"));
		assert!(matches!(outcome, SendOutcome::Rejected(Reject::NotRunning)));
		assert_eq!(engine.state(), SessionState::Instantiated);

		engine.connect(&url()).await.unwrap();
		let outcome = engine.send("data", Chunk::data(0, "hi"));
		assert!(matches!(outcome, SendOutcome::Rejected(Reject::NotRunning)));

		engine.disconnect().await;
		let outcome = engine.send("data", Chunk::data(0, "hi"));
		assert!(matches!(outcome, SendOutcome::Rejected(Reject::NotRunning)));

		tokio::task::yield_now().await;
		assert!(peer.opened.try_recv().is_err());
	}

	#[tokio::test]
	async fn test_publish() {
		let (engine, mut peer) = publishing(vec![("data", chat())]).await;

		// Nobody is listening yet.
		let outcome = engine.send("data", Chunk::data(0, "early"));
		assert!(matches!(outcome, SendOutcome::Rejected(Reject::NoSubscribers)));

		let ok = peer_subscribe(&mut peer, "chat", "room", "secret").await;
		assert_eq!(ok.namespace, "chat");
		assert_eq!(ok.name, "room");
		assert_eq!(ok.expires, 0);
		assert_eq!(engine.tracks().get("data").unwrap().subscribers, 1);

		assert!(engine.send("data", Chunk::data(4, "hello")).is_sent());

		let mut uni = peer.accept_uni().await;
		let header: ObjectHeader = uni.reader.decode().await.unwrap();
		assert_eq!(header.track_id, ok.track_id);
		assert_eq!((header.group, header.object), (0, 0));
		assert_eq!(header.send_order, priority::send_order(4, false));
		assert_eq!(header.length, None);

		// The only stream in flight ranks first.
		assert_eq!(uni.priority(), u8::MAX);

		let packet = Packet::read(PackagerKind::Raw, &mut uni.reader, 1024, 1 << 20).await.unwrap();
		assert_eq!(packet.chunk().seq_id, 4);
		assert_eq!(&packet.chunk().payload[..], b"hello");

		drop(uni);
		wait_idle(&engine, "data").await;
	}

	#[tokio::test]
	async fn test_announce_order() {
		let tracks = vec![
			("video", Track::new("b", "video", PackagerKind::Loc).with_max_in_flight(1)),
			("chat", Track::new("a", "chat", PackagerKind::Raw).with_max_in_flight(1)),
			("audio", Track::new("b", "audio", PackagerKind::Loc).with_max_in_flight(1)),
		];

		// Asserts b then a, exactly once each.
		let (engine, _peer) = publishing(tracks).await;
		assert_eq!(engine.tracks().namespaces(), vec!["b".to_string(), "a".to_string()]);
	}

	#[tokio::test]
	async fn test_admission() {
		let counters = Arc::new(Counters::default());
		let (session, mut peer) = mock::session();
		let mut engine =
			Engine::new(MockConnector::ready(session), SessionConfig::default()).with_stats(counters.clone());
		engine.connect(&url()).await.unwrap();

		let (res, ()) = tokio::join!(engine.publish([("data", chat())]), async {
			accept_setup(&mut peer, Role::Publisher).await;
			accept_announces(&mut peer, &["chat"]).await;
		});
		res.unwrap();
		peer_subscribe(&mut peer, "chat", "room", "secret").await;

		// Nothing completes while the peer holds on to the streams.
		assert!(engine.send("data", Chunk::data(0, "a")).is_sent());
		assert!(engine.send("data", Chunk::data(1, "b")).is_sent());
		assert!(matches!(engine.send("data", Chunk::data(2, "c")), SendOutcome::Dropped));
		assert_eq!(engine.in_flight("data"), 2);
		assert_eq!(counters.dropped(), 1);

		let first = peer.accept_uni().await;
		let second = peer.accept_uni().await;
		drop((first, second));
		wait_idle(&engine, "data").await;

		assert!(engine.send("data", Chunk::data(3, "d")).is_sent());
		assert_eq!(counters.dropped(), 1);
	}

	#[tokio::test]
	async fn test_sequence() {
		let video = Track::new("vc", "video", PackagerKind::Loc).with_max_in_flight(8);
		let (engine, mut peer) = publishing(vec![("video", video)]).await;
		peer_subscribe(&mut peer, "vc", "video", "").await;

		let delta = Chunk::media(MediaType::Video, ChunkKind::Delta, 0, Bytes::from_static(&[1]));
		assert!(matches!(
			engine.send("video", delta.clone()),
			SendOutcome::Rejected(Reject::DeltaBeforeKey)
		));
		assert_eq!(engine.in_flight("video"), 0);

		let key = Chunk::media(MediaType::Video, ChunkKind::Key, 1, Bytes::from_static(&[0]));
		assert!(engine.send("video", key).is_sent());
		let sequence = engine.sequence("video").unwrap();
		assert_eq!((sequence.group(), sequence.object()), (0, 1));

		assert!(engine.send("video", delta).is_sent());
		let sequence = engine.sequence("video").unwrap();
		assert_eq!((sequence.group(), sequence.object()), (0, 2));

		let mut positions = Vec::new();
		for _ in 0..2 {
			let mut uni = peer.accept_uni().await;
			let header: ObjectHeader = uni.reader.decode().await.unwrap();
			positions.push((header.group, header.object));
		}
		positions.sort();
		assert_eq!(positions, vec![(0, 0), (0, 1)]);
	}

	#[tokio::test]
	async fn test_high_priority() {
		let tracks = vec![
			("audio", Track::new("vc", "audio", PackagerKind::Loc).with_max_in_flight(4).with_high_priority(true)),
			("video", Track::new("vc", "video", PackagerKind::Loc).with_max_in_flight(4)),
		];
		let (engine, mut peer) = publishing(tracks).await;
		let audio_id = peer_subscribe(&mut peer, "vc", "audio", "").await.track_id;
		peer_subscribe(&mut peer, "vc", "video", "").await;

		let audio = Chunk::media(MediaType::Audio, ChunkKind::Key, 3, Bytes::new());
		let video = Chunk::media(MediaType::Video, ChunkKind::Key, 3, Bytes::new());
		assert!(engine.send("audio", audio).is_sent());
		assert!(engine.send("video", video).is_sent());

		let mut first = peer.accept_uni().await;
		let mut second = peer.accept_uni().await;
		let first_header: ObjectHeader = first.reader.decode().await.unwrap();
		let second_header: ObjectHeader = second.reader.decode().await.unwrap();

		let ((audio, audio_uni), (video, video_uni)) = match first_header.track_id == audio_id {
			true => ((first_header, first), (second_header, second)),
			false => ((second_header, second), (first_header, first)),
		};
		assert_eq!(audio.send_order, priority::HIGH + 3);
		assert_eq!(video.send_order, 3);

		// Both streams are still in flight, so the transport priorities follow the send order.
		assert_eq!(audio_uni.priority(), u8::MAX);
		assert_eq!(video_uni.priority(), u8::MAX - 1);
	}

	#[tokio::test]
	async fn test_stream_priority() {
		let video = Track::new("vc", "video", PackagerKind::Loc).with_max_in_flight(4);
		let (engine, mut peer) = publishing(vec![("video", video)]).await;
		peer_subscribe(&mut peer, "vc", "video", "").await;

		let key = Chunk::media(MediaType::Video, ChunkKind::Key, 1, Bytes::new());
		assert!(engine.send("video", key).is_sent());
		let mut old = peer.accept_uni().await;
		let _: ObjectHeader = old.reader.decode().await.unwrap();
		assert_eq!(old.priority(), u8::MAX);

		// A newer object outranks the older one, which is demoted while it is still in flight.
		let delta = Chunk::media(MediaType::Video, ChunkKind::Delta, 2, Bytes::new());
		assert!(engine.send("video", delta).is_sent());
		let new = peer.accept_uni().await;

		tokio::time::timeout(Duration::from_secs(1), async {
			while old.priority() != u8::MAX - 1 || new.priority() != u8::MAX {
				tokio::task::yield_now().await;
			}
		})
		.await
		.expect("priorities not updated");

		// Once the newer object is acknowledged the older one is first again.
		drop(new);
		tokio::time::timeout(Duration::from_secs(1), async {
			while old.priority() != u8::MAX {
				tokio::task::yield_now().await;
			}
		})
		.await
		.expect("priority not restored");
	}

	#[tokio::test]
	async fn test_ignored_subscribes() {
		let (engine, mut peer) = publishing(vec![("data", chat())]).await;

		// Neither of these get a response.
		peer.writer
			.encode_message(&Subscribe::live("chat", "missing", "secret"))
			.await
			.unwrap();
		peer.writer
			.encode_message(&Subscribe::live("chat", "room", "wrong"))
			.await
			.unwrap();

		let ok = peer_subscribe(&mut peer, "chat", "room", "secret").await;
		assert_eq!(ok.name, "room");
		assert_eq!(engine.tracks().get("data").unwrap().subscribers, 1);
	}

	#[tokio::test]
	async fn test_namespace_mismatch() {
		let (mut engine, mut peer) = connect().await;

		let (res, ()) = tokio::join!(engine.publish([("data", chat())]), async {
			accept_setup(&mut peer, Role::Publisher).await;
			let _: Announce = peer.reader.decode_message().await.unwrap();
			peer.writer
				.encode_message(&AnnounceOk {
					namespace: "other".to_string(),
				})
				.await
				.unwrap();
		});

		match res {
			Err(Error::NamespaceMismatch { expected, received }) => {
				assert_eq!(expected, "chat");
				assert_eq!(received, "other");
			}
			res => panic!("unexpected result: {res:?}"),
		}
		assert_eq!(engine.state(), SessionState::Instantiated);
	}

	#[tokio::test]
	async fn test_unsupported_version() {
		let (mut engine, mut peer) = connect().await;

		let (res, ()) = tokio::join!(engine.subscribe([("data", chat())]), async {
			let _: ClientSetup = peer.reader.decode_message().await.unwrap();
			peer.writer
				.encode_message(&ServerSetup {
					version: Version(0xff000002),
					params: Parameters::default(),
				})
				.await
				.unwrap();
		});

		assert!(matches!(res, Err(Error::UnsupportedVersion(Version(0xff000002)))));
	}

	#[tokio::test]
	async fn test_unexpected_message() {
		let (mut engine, mut peer) = connect().await;

		let (res, ()) = tokio::join!(engine.subscribe([("data", chat())]), async {
			let _: ClientSetup = peer.reader.decode_message().await.unwrap();
			peer.writer
				.encode_message(&AnnounceOk {
					namespace: "chat".to_string(),
				})
				.await
				.unwrap();
		});

		let err = res.unwrap_err();
		assert!(matches!(
			err,
			Error::Decode(DecodeError::UnexpectedMessageType {
				expected: 0x41,
				received: 0x07
			})
		));
		assert_eq!(err.kind(), ErrorKind::Protocol);
	}

	#[tokio::test(start_paused = true)]
	async fn test_setup_timeout() {
		let (mut engine, _peer) = connect().await;
		let res = engine.publish([("data", chat())]).await;
		assert!(matches!(res, Err(Error::Timeout(Request::Setup))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_announce_timeout() {
		let (mut engine, mut peer) = connect().await;

		let (res, ()) = tokio::join!(engine.publish([("data", chat())]), async {
			accept_setup(&mut peer, Role::Publisher).await;
			let _: Announce = peer.reader.decode_message().await.unwrap();
		});

		let err = res.unwrap_err();
		assert!(matches!(err, Error::Timeout(Request::Announce)));
		assert_eq!(err.kind(), ErrorKind::Protocol);
	}

	#[tokio::test(start_paused = true)]
	async fn test_subscribe_timeout() {
		let (mut engine, mut peer) = connect().await;

		let (res, ()) = tokio::join!(engine.subscribe([("data", chat())]), async {
			accept_setup(&mut peer, Role::Subscriber).await;
			let _: Subscribe = peer.reader.decode_message().await.unwrap();
		});

		assert!(matches!(res, Err(Error::Timeout(Request::Subscribe))));
		assert_eq!(engine.tracks().get("data").unwrap().id, None);
	}

	#[tokio::test]
	async fn test_malformed_subscribe() {
		let (engine, mut peer) = publishing(vec![("data", chat())]).await;
		let mut events = engine.events();

		// Only subscribes are expected once publishing.
		peer.writer
			.encode_message(&AnnounceOk {
				namespace: "chat".to_string(),
			})
			.await
			.unwrap();

		match events.next().await.unwrap() {
			Event::Error { kind, error } => {
				assert_eq!(kind, ErrorKind::Protocol);
				assert!(matches!(
					error,
					Error::Decode(DecodeError::UnexpectedMessageType {
						expected: 0x03,
						received: 0x07
					})
				));
			}
			event => panic!("unexpected event: {event:?}"),
		}
		assert!(matches!(events.next().await.unwrap(), Event::Closed));
		assert_eq!(engine.state(), SessionState::Stopped);
	}

	#[tokio::test]
	async fn test_oversized_message() {
		let config = SessionConfig {
			max_message: 1024,
			..Default::default()
		};
		let (engine, mut peer) = publishing_with(config, vec![("data", chat())]).await;
		let mut events = engine.events();

		// A subscribe claiming a namespace far larger than we'd ever buffer.
		let mut prefix = Vec::new();
		Subscribe::ID.encode(&mut prefix);
		(1u64 << 40).encode(&mut prefix);
		peer.writer.write_all(&mut Bytes::from(prefix)).await.unwrap();
		peer.writer.write_all(&mut Bytes::from(vec![b'x'; 4096])).await.unwrap();

		match events.next().await.unwrap() {
			Event::Error { kind, error } => {
				assert_eq!(kind, ErrorKind::Protocol);
				assert!(matches!(error, Error::Decode(DecodeError::BoundsExceeded)));
			}
			event => panic!("unexpected event: {event:?}"),
		}
		assert!(matches!(events.next().await.unwrap(), Event::Closed));
		assert_eq!(engine.state(), SessionState::Stopped);
	}

	#[tokio::test(start_paused = true)]
	async fn test_disconnect_stalled() {
		let (mut engine, mut peer) = publishing(vec![("data", chat())]).await;
		let mut events = engine.events();

		// The subscribe response gets stuck behind the stalled control stream.
		peer.stall_control();
		peer.writer
			.encode_message(&Subscribe::live("chat", "room", "secret"))
			.await
			.unwrap();

		tokio::time::timeout(Duration::from_secs(1), async {
			while engine.tracks().get("data").unwrap().subscribers == 0 {
				tokio::task::yield_now().await;
			}
		})
		.await
		.expect("subscribe not accepted");

		engine.disconnect().await;
		assert_eq!(engine.state(), SessionState::Stopped);

		match events.next().await.unwrap() {
			Event::Error { error, .. } => assert!(matches!(error, Error::Timeout(Request::Disconnect))),
			event => panic!("unexpected event: {event:?}"),
		}
		assert!(matches!(events.next().await.unwrap(), Event::Closed));
		assert!(matches!(peer.session.closed().await, MockError::Closed { code: 0, .. }));
	}

	#[tokio::test]
	async fn test_subscribe() {
		let tracks = vec![
			("chat", Track::new("chat", "room", PackagerKind::Raw).with_auth("secret"), 3),
			("video", Track::new("vc", "video", PackagerKind::Loc), 9),
		];
		let (engine, peer) = subscribing(tracks).await;
		let mut events = engine.events();

		assert_eq!(engine.state(), SessionState::Running);
		assert_eq!(engine.tracks().get("chat").unwrap().id, Some(3));
		assert_eq!(engine.tracks().get("video").unwrap().id, Some(9));

		let text = Packet::new(PackagerKind::Raw, Chunk::data(12, "hello")).unwrap();
		let header = ObjectHeader {
			track_id: 3,
			group: 0,
			object: 0,
			send_order: 12,
			length: None,
		};
		send_object(&peer, header, &text).await;

		match events.next().await.unwrap() {
			Event::Data { track, seq_id, text } => {
				assert_eq!(track, "chat");
				assert_eq!(seq_id, 12);
				assert_eq!(text, "hello");
			}
			event => panic!("unexpected event: {event:?}"),
		}

		let chunk = Chunk::media(MediaType::Video, ChunkKind::Key, 0, Bytes::from_static(&[0, 0, 1]))
			.with_timing(66_000, Some(33_000), crate::jitter::now_ms());
		let media = Packet::new(PackagerKind::Loc, chunk.clone()).unwrap();
		let header = ObjectHeader {
			track_id: 9,
			group: 1,
			object: 0,
			send_order: 0,
			length: Some(media.encode_bytes().len() as u64),
		};
		send_object(&peer, header, &media).await;

		match events.next().await.unwrap() {
			Event::MediaChunk { track, header, chunk: received } => {
				assert_eq!(track, "video");
				assert_eq!(header.group, 1);
				assert_eq!(received, chunk);
			}
			event => panic!("unexpected event: {event:?}"),
		}

		match events.next().await.unwrap() {
			Event::Latency { track, media, ms } => {
				assert_eq!(track, "video");
				assert_eq!(media, MediaType::Video);
				assert!(ms >= 0);
			}
			event => panic!("unexpected event: {event:?}"),
		}
	}

	#[tokio::test]
	async fn test_unknown_track_id() {
		let tracks = vec![("chat", Track::new("chat", "room", PackagerKind::Raw), 1)];
		let (engine, peer) = subscribing(tracks).await;
		let mut events = engine.events();

		let packet = Packet::new(PackagerKind::Raw, Chunk::data(0, "lost")).unwrap();
		let mut header = ObjectHeader {
			track_id: 99,
			group: 0,
			object: 0,
			send_order: 0,
			length: None,
		};
		send_object(&peer, header, &packet).await;

		match events.next().await.unwrap() {
			Event::Error { kind, error } => {
				assert_eq!(kind, ErrorKind::Object);
				assert!(matches!(error, Error::UnknownTrackId(99)));
			}
			event => panic!("unexpected event: {event:?}"),
		}

		// The loop keeps going.
		header.track_id = 1;
		send_object(&peer, header, &packet).await;
		assert!(matches!(events.next().await.unwrap(), Event::Data { .. }));
		assert_eq!(engine.state(), SessionState::Running);
	}

	#[tokio::test]
	async fn test_truncated_object() {
		let tracks = vec![("chat", Track::new("chat", "room", PackagerKind::Raw), 1)];
		let (engine, peer) = subscribing(tracks).await;
		let mut events = engine.events();

		let mut writer = peer.open_uni();
		writer.write_all(&mut Bytes::from_static(&[0x02, 0x01, 0x00])).await.unwrap();
		writer.finish().unwrap();

		match events.next().await.unwrap() {
			Event::Error { kind, error } => {
				assert_eq!(kind, ErrorKind::Object);
				assert!(matches!(error, Error::Decode(DecodeError::Truncated)));
			}
			event => panic!("unexpected event: {event:?}"),
		}
	}

	#[tokio::test]
	async fn test_subscribe_mismatch() {
		let (mut engine, mut peer) = connect().await;

		let (res, ()) = tokio::join!(engine.subscribe([("chat", chat())]), async {
			accept_setup(&mut peer, Role::Subscriber).await;
			let _: Subscribe = peer.reader.decode_message().await.unwrap();
			peer.writer
				.encode_message(&SubscribeOk {
					namespace: "chat".to_string(),
					name: "lobby".to_string(),
					track_id: 0,
					expires: 0,
				})
				.await
				.unwrap();
		});

		assert!(matches!(res, Err(Error::SubscribeMismatch { .. })));
		assert_eq!(engine.tracks().get("chat").unwrap().id, None);
	}

	#[tokio::test]
	async fn test_disconnect() {
		let (mut engine, mut peer) = publishing(vec![("data", chat())]).await;
		let mut events = engine.events();

		engine.disconnect().await;
		engine.disconnect().await;
		assert_eq!(engine.state(), SessionState::Stopped);

		assert!(matches!(events.next().await.unwrap(), Event::Closed));
		assert!(events.try_next().is_none());

		// The control stream was finished before the transport closed.
		let res = peer.reader.decode_message::<Subscribe>().await;
		assert!(matches!(res, Err(Error::Decode(DecodeError::Truncated))));

		let err = peer.session.closed().await;
		assert!(matches!(err, MockError::Closed { code: 0, .. }));

		assert!(matches!(engine.publish([("data", chat())]).await, Err(Error::Stopped)));
	}

	#[tokio::test]
	async fn test_transport_closed() {
		let (engine, peer) = publishing(vec![("data", chat())]).await;
		let mut events = engine.events();

		peer.session.close(3, "going away");

		match events.next().await.unwrap() {
			Event::Error { kind, error } => {
				assert_eq!(kind, ErrorKind::Transport);
				assert!(matches!(error, Error::Transport(TransportError::Closed { code: 3, .. })));
			}
			event => panic!("unexpected event: {event:?}"),
		}
		assert!(matches!(events.next().await.unwrap(), Event::Closed));
		assert_eq!(engine.state(), SessionState::Stopped);
	}
}
