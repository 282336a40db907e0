//! An in-memory WebTransport session where the test plays the remote peer.

use std::sync::{
	Arc, Mutex,
	atomic::{AtomicBool, AtomicU8, Ordering},
};

use bytes::{Buf, Bytes};
use tokio::sync::{mpsc, watch};
use url::Url;

use super::*;
use crate::coding::{Reader, Writer};

#[derive(thiserror::Error, Debug, Clone)]
pub enum MockError {
	#[error("closed: code={code} reason={reason}")]
	Closed { code: u32, reason: String },

	#[error("reset: code={0}")]
	Reset(u32),

	#[error("stopped")]
	Stopped,

	#[error("unsupported")]
	Unsupported,
}

impl web_transport_trait::Error for MockError {
	fn session_error(&self) -> Option<(u32, String)> {
		match self {
			Self::Closed { code, reason } => Some((*code, reason.clone())),
			_ => None,
		}
	}

	fn stream_error(&self) -> Option<u32> {
		match self {
			Self::Reset(code) => Some(*code),
			_ => None,
		}
	}
}

type Chunk = Result<Bytes, MockError>;

/// The sending half of an in-memory stream.
pub struct MockSend {
	tx: Option<mpsc::UnboundedSender<Chunk>>,
	priority: Arc<AtomicU8>,

	// Writes block forever once set, like a stream out of flow control credit.
	stalled: Arc<AtomicBool>,

	// Closed once the receiving half is dropped.
	alive: watch::Sender<()>,
}

/// The receiving half of an in-memory stream.
pub struct MockRecv {
	rx: mpsc::UnboundedReceiver<Chunk>,
	pending: Bytes,
	_alive: watch::Receiver<()>,
}

pub fn pipe() -> (MockSend, MockRecv) {
	let (tx, rx) = mpsc::unbounded_channel();
	let (alive, alive_rx) = watch::channel(());

	let send = MockSend {
		tx: Some(tx),
		priority: Default::default(),
		stalled: Default::default(),
		alive,
	};
	let recv = MockRecv {
		rx,
		pending: Bytes::new(),
		_alive: alive_rx,
	};

	(send, recv)
}

impl SendStream for MockSend {
	type Error = MockError;

	async fn write(&mut self, buf: &[u8]) -> Result<usize, MockError> {
		if self.stalled.load(Ordering::Relaxed) {
			std::future::pending::<()>().await;
		}

		let tx = self.tx.as_ref().ok_or(MockError::Stopped)?;
		tx.send(Ok(Bytes::copy_from_slice(buf))).map_err(|_| MockError::Stopped)?;
		Ok(buf.len())
	}

	fn set_priority(&mut self, priority: u8) {
		self.priority.store(priority, Ordering::Relaxed);
	}

	fn finish(&mut self) -> Result<(), MockError> {
		self.tx.take().ok_or(MockError::Stopped)?;
		Ok(())
	}

	fn reset(&mut self, code: u32) {
		if let Some(tx) = self.tx.take() {
			let _ = tx.send(Err(MockError::Reset(code)));
		}
	}

	async fn closed(&mut self) -> Result<(), MockError> {
		self.alive.closed().await;
		Ok(())
	}
}

impl RecvStream for MockRecv {
	type Error = MockError;

	async fn read(&mut self, dst: &mut [u8]) -> Result<Option<usize>, MockError> {
		Ok(self.read_chunk(dst.len()).await?.map(|chunk| {
			dst[..chunk.len()].copy_from_slice(&chunk);
			chunk.len()
		}))
	}

	async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, MockError> {
		if !self.pending.has_remaining() {
			self.pending = match self.rx.recv().await {
				Some(chunk) => chunk?,
				None => return Ok(None),
			};
		}

		let size = max.min(self.pending.len());
		Ok(Some(self.pending.split_to(size)))
	}

	fn stop(&mut self, _code: u32) {
		self.rx.close();
	}

	async fn closed(&mut self) -> Result<(), MockError> {
		while let Some(chunk) = self.rx.recv().await {
			chunk?;
		}
		Ok(())
	}
}

/// A stream opened by the client, as seen by the peer.
pub struct MockUni {
	pub reader: Reader<MockRecv>,
	priority: Arc<AtomicU8>,
}

impl MockUni {
	/// The priority the client currently assigns to the stream.
	pub fn priority(&self) -> u8 {
		self.priority.load(Ordering::Relaxed)
	}
}

struct Shared {
	bi: Mutex<Option<(MockSend, MockRecv)>>,
	uni_opened: mpsc::UnboundedSender<MockUni>,
	uni_accept: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockRecv>>,
	closed: watch::Sender<Option<MockError>>,
}

#[derive(Clone)]
pub struct MockSession {
	shared: Arc<Shared>,
}

impl MockSession {
	fn check(&self) -> Result<(), MockError> {
		match self.shared.closed.borrow().clone() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}

	async fn wait_closed(&self) -> MockError {
		let mut rx = self.shared.closed.subscribe();
		match rx.wait_for(Option::is_some).await {
			Ok(err) => err.clone().unwrap_or(MockError::Stopped),
			Err(_) => MockError::Stopped,
		}
	}
}

impl Session for MockSession {
	type SendStream = MockSend;
	type RecvStream = MockRecv;
	type Error = MockError;

	async fn accept_uni(&self) -> Result<MockRecv, MockError> {
		let mut accept = self.shared.uni_accept.lock().await;
		tokio::select! {
			res = accept.recv() => res.ok_or(MockError::Stopped),
			err = self.wait_closed() => Err(err),
		}
	}

	async fn accept_bi(&self) -> Result<(MockSend, MockRecv), MockError> {
		Err(self.wait_closed().await)
	}

	async fn open_bi(&self) -> Result<(MockSend, MockRecv), MockError> {
		self.check()?;
		let bi = self.shared.bi.lock().unwrap().take();
		bi.ok_or(MockError::Stopped)
	}

	async fn open_uni(&self) -> Result<MockSend, MockError> {
		self.check()?;

		let (send, recv) = pipe();
		let uni = MockUni {
			reader: Reader::new(recv),
			priority: send.priority.clone(),
		};
		self.shared.uni_opened.send(uni).map_err(|_| MockError::Stopped)?;

		Ok(send)
	}

	fn send_datagram(&self, _payload: Bytes) -> Result<(), MockError> {
		Err(MockError::Unsupported)
	}

	async fn recv_datagram(&self) -> Result<Bytes, MockError> {
		Err(MockError::Unsupported)
	}

	fn max_datagram_size(&self) -> usize {
		0
	}

	fn close(&self, code: u32, reason: &str) {
		self.shared.closed.send_if_modified(|closed| {
			if closed.is_some() {
				return false;
			}
			*closed = Some(MockError::Closed {
				code,
				reason: reason.to_string(),
			});
			true
		});
	}

	async fn closed(&self) -> MockError {
		self.wait_closed().await
	}
}

/// The remote end of a [MockSession].
pub struct MockPeer {
	pub session: MockSession,

	/// The control stream.
	pub writer: Writer<MockSend>,
	pub reader: Reader<MockRecv>,

	/// Streams opened by the client.
	pub opened: mpsc::UnboundedReceiver<MockUni>,

	accept: mpsc::UnboundedSender<MockRecv>,
	control_stalled: Arc<AtomicBool>,
}

impl MockPeer {
	/// Stop accepting data on the control stream.
	pub fn stall_control(&self) {
		self.control_stalled.store(true, Ordering::Relaxed);
	}

	/// Open a stream towards the client.
	pub fn open_uni(&self) -> Writer<MockSend> {
		let (send, recv) = pipe();
		let _ = self.accept.send(recv);
		Writer::new(send)
	}

	/// The next stream opened by the client.
	pub async fn accept_uni(&mut self) -> MockUni {
		self.opened.recv().await.expect("session dropped")
	}
}

pub fn session() -> (MockSession, MockPeer) {
	let (client_send, peer_recv) = pipe();
	let (peer_send, client_recv) = pipe();

	let (uni_opened, opened) = mpsc::unbounded_channel();
	let (accept, uni_accept) = mpsc::unbounded_channel();
	let control_stalled = client_send.stalled.clone();

	let session = MockSession {
		shared: Arc::new(Shared {
			bi: Mutex::new(Some((client_send, client_recv))),
			uni_opened,
			uni_accept: tokio::sync::Mutex::new(uni_accept),
			closed: watch::Sender::new(None),
		}),
	};

	let peer = MockPeer {
		session: session.clone(),
		writer: Writer::new(peer_send),
		reader: Reader::new(peer_recv),
		opened,
		accept,
		control_stalled,
	};

	(session, peer)
}

/// What the connector does when asked to connect.
pub enum MockConnector {
	Ready(Mutex<Option<MockSession>>),
	Fail(TransportError),
	Pending,
}

impl MockConnector {
	pub fn ready(session: MockSession) -> Self {
		Self::Ready(Mutex::new(Some(session)))
	}
}

impl Connector for MockConnector {
	type Session = MockSession;

	async fn connect(&self, _url: &Url) -> Result<MockSession, TransportError> {
		match self {
			Self::Ready(session) => {
				let session = session.lock().unwrap().take();
				session.ok_or(TransportError::Closed {
					code: 0,
					reason: "already connected".to_string(),
				})
			}
			Self::Fail(err) => Err(err.clone()),
			Self::Pending => std::future::pending().await,
		}
	}
}
