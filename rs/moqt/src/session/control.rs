use std::fmt::Debug;

use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, oneshot};

use crate::{
	Error,
	coding::Writer,
	message::Message,
	transport::SendStream,
};

enum Command {
	Write(Bytes),
	Finish(oneshot::Sender<Result<(), Error>>),
}

/// The write half of the control stream, serialized through a single task.
#[derive(Clone)]
pub(crate) struct Control {
	tx: mpsc::UnboundedSender<Command>,
}

impl Control {
	pub fn new<S: SendStream + 'static>(writer: Writer<S>) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		web_async::spawn(Self::run(writer, rx));
		Self { tx }
	}

	pub fn send<M: Message + Debug>(&self, msg: M) -> Result<(), Error> {
		tracing::debug!(message = ?msg, "sending control message");

		let mut buf = BytesMut::new();
		msg.encode(&mut buf);

		tracing::trace!(id = M::ID, size = buf.len(), hex = %hex::encode(&buf), "encoded control message");

		self.tx.send(Command::Write(buf.freeze())).map_err(|_| Error::Closed)?;
		Ok(())
	}

	/// Close the write half once everything queued so far has been written.
	pub async fn finish(&self) -> Result<(), Error> {
		let (tx, rx) = oneshot::channel();
		self.tx.send(Command::Finish(tx)).map_err(|_| Error::Closed)?;
		rx.await.unwrap_or(Err(Error::Closed))
	}

	async fn run<S: SendStream + 'static>(mut writer: Writer<S>, mut rx: mpsc::UnboundedReceiver<Command>) {
		while let Some(command) = rx.recv().await {
			match command {
				Command::Write(mut buf) => {
					if let Err(err) = writer.write_all(&mut buf).await {
						tracing::warn!(%err, "failed to write control message");
						return;
					}
				}
				Command::Finish(reply) => {
					let _ = reply.send(writer.finish());
					return;
				}
			}
		}
	}
}
