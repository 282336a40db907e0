use std::{io, time::Duration};

use moqt::transport::{self, TransportError};
use url::Url;

/// Connects to a moqt endpoint using WebTransport over HTTP/3.
///
/// The URL supplies the host and port (443 by default) and the path of the CONNECT request.
pub struct QuicConnector {
	endpoint: quinn::Endpoint,
	timeout: Duration,
}

impl QuicConnector {
	pub fn new(endpoint: quinn::Endpoint, timeout: Duration) -> Self {
		Self { endpoint, timeout }
	}

	pub fn endpoint(&self) -> &quinn::Endpoint {
		&self.endpoint
	}

	async fn handshake(&self, url: &Url) -> Result<web_transport_quinn::Session, TransportError> {
		let host = server_name(url)?;
		let port = url.port().unwrap_or(443);

		let addr = tokio::net::lookup_host((host.as_str(), port))
			.await
			.map_err(TransportError::other)?
			.next()
			.ok_or_else(|| invalid("no address for host"))?;

		tracing::debug!(%url, %addr, "connecting");

		let connection = self
			.endpoint
			.connect(addr, &host)
			.map_err(TransportError::other)?
			.await
			.map_err(TransportError::other)?;

		tracing::debug!(%addr, id = connection.stable_id(), "connected, sending CONNECT");

		web_transport_quinn::Session::connect(connection, url.clone())
			.await
			.map_err(TransportError::other)
	}
}

impl transport::Connector for QuicConnector {
	type Session = web_transport_quinn::Session;

	async fn connect(&self, url: &Url) -> Result<web_transport_quinn::Session, TransportError> {
		match url.scheme() {
			"https" | "moqt" => {}
			_ => return Err(invalid("unsupported url scheme")),
		}

		// Covers both the QUIC handshake and the HTTP/3 CONNECT.
		match tokio::time::timeout(self.timeout, self.handshake(url)).await {
			Ok(res) => res,
			Err(_) => Err(TransportError::other(io::Error::from(io::ErrorKind::TimedOut))),
		}
	}
}

fn server_name(url: &Url) -> Result<String, TransportError> {
	let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
	Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

fn invalid(msg: &'static str) -> TransportError {
	TransportError::other(io::Error::new(io::ErrorKind::InvalidInput, msg))
}
