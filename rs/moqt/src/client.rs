use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::{
	Engine, Error, Events, SendOutcome, SessionConfig, Stats,
	model::{Chunk, Track},
	transport::Connector,
};

enum Command {
	Connect(Url, oneshot::Sender<Result<(), Error>>),
	Publish(Vec<(String, Track)>, oneshot::Sender<Result<(), Error>>),
	Subscribe(Vec<(String, Track)>, oneshot::Sender<Result<(), Error>>),
	Send(String, Chunk, Option<oneshot::Sender<SendOutcome>>),
	Disconnect(oneshot::Sender<()>),
}

/// A handle to an [Engine] running on its own task.
///
/// Commands are queued and handled one at a time, so a send issued during the handshake
/// waits for it. Dropping every handle disconnects the session.
#[derive(Clone)]
pub struct Client {
	commands: mpsc::UnboundedSender<Command>,
	events: Events,
}

impl Client {
	pub fn new<C: Connector>(connector: C, config: SessionConfig) -> Self {
		Self::spawn(Engine::new(connector, config))
	}

	pub fn with_stats<C: Connector>(connector: C, config: SessionConfig, stats: Arc<dyn Stats>) -> Self {
		Self::spawn(Engine::new(connector, config).with_stats(stats))
	}

	fn spawn<C: Connector>(engine: Engine<C>) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let events = engine.events();

		web_async::spawn(Self::run(engine, rx));

		Self { commands: tx, events }
	}

	async fn run<C: Connector>(mut engine: Engine<C>, mut commands: mpsc::UnboundedReceiver<Command>) {
		while let Some(command) = commands.recv().await {
			match command {
				Command::Connect(url, reply) => {
					let _ = reply.send(engine.connect(&url).await);
				}
				Command::Publish(tracks, reply) => {
					let _ = reply.send(engine.publish(tracks).await);
				}
				Command::Subscribe(tracks, reply) => {
					let _ = reply.send(engine.subscribe(tracks).await);
				}
				Command::Send(label, chunk, reply) => {
					let outcome = engine.send(&label, chunk);
					if let Some(reply) = reply {
						let _ = reply.send(outcome);
					}
				}
				Command::Disconnect(reply) => {
					engine.disconnect().await;
					let _ = reply.send(());
				}
			}
		}

		engine.disconnect().await;
	}

	async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, Error> {
		let (tx, rx) = oneshot::channel();
		self.commands.send(command(tx)).map_err(|_| Error::Closed)?;
		rx.await.map_err(|_| Error::Closed)
	}

	pub async fn connect(&self, url: Url) -> Result<(), Error> {
		self.request(|reply| Command::Connect(url, reply)).await?
	}

	pub async fn publish<I, L>(&self, tracks: I) -> Result<(), Error>
	where
		I: IntoIterator<Item = (L, Track)>,
		L: Into<String>,
	{
		let tracks = tracks.into_iter().map(|(label, track)| (label.into(), track)).collect();
		self.request(|reply| Command::Publish(tracks, reply)).await?
	}

	pub async fn subscribe<I, L>(&self, tracks: I) -> Result<(), Error>
	where
		I: IntoIterator<Item = (L, Track)>,
		L: Into<String>,
	{
		let tracks = tracks.into_iter().map(|(label, track)| (label.into(), track)).collect();
		self.request(|reply| Command::Subscribe(tracks, reply)).await?
	}

	/// Send a chunk and wait to learn whether it was admitted.
	pub async fn send(&self, label: impl Into<String>, chunk: Chunk) -> Result<SendOutcome, Error> {
		let label = label.into();
		self.request(|reply| Command::Send(label, chunk, Some(reply))).await
	}

	/// Queue a chunk without waiting; drops and rejections are only logged.
	pub fn send_nowait(&self, label: impl Into<String>, chunk: Chunk) -> Result<(), Error> {
		self.commands
			.send(Command::Send(label.into(), chunk, None))
			.map_err(|_| Error::Closed)
	}

	pub async fn disconnect(&self) -> Result<(), Error> {
		self.request(Command::Disconnect).await
	}

	pub fn events(&self) -> Events {
		self.events.clone()
	}
}
