use crate::{
	Error,
	coding::{Reader, Writer},
	transport::Session,
};

/// A [Writer] and [Reader] pair for a single stream.
pub struct Stream<S: Session> {
	pub writer: Writer<S::SendStream>,
	pub reader: Reader<S::RecvStream>,
}

impl<S: Session> Stream<S> {
	/// Open a new bidirectional stream.
	pub async fn open(session: &S) -> Result<Self, Error> {
		let (send, recv) = session.open_bi().await.map_err(Error::transport)?;

		let writer = Writer::new(send);
		let reader = Reader::new(recv);

		Ok(Stream { writer, reader })
	}
}
