use std::{fs, io, net, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{QuicConnector, crypto};

/// The ALPN negotiated for WebTransport, which runs over HTTP/3.
pub const ALPN: &str = web_transport_quinn::ALPN;

/// Configuration for the QUIC client endpoint.
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
	/// Listen for UDP packets on the given address.
	#[arg(id = "client-bind", long = "client-bind", default_value = "[::]:0", env = "MOQT_CLIENT_BIND")]
	pub bind: net::SocketAddr,

	/// Use the TLS root at this path, encoded as PEM.
	///
	/// This value can be provided multiple times for multiple roots.
	/// If this is empty, system roots will be used instead.
	#[arg(id = "tls-root", long = "tls-root", env = "MOQT_CLIENT_TLS_ROOT")]
	pub tls_root: Vec<PathBuf>,

	/// How long to wait for the QUIC handshake and the WebTransport CONNECT.
	#[arg(
		id = "connect-timeout",
		long = "connect-timeout",
		default_value = "5s",
		value_parser = humantime::parse_duration,
		env = "MOQT_CLIENT_CONNECT_TIMEOUT"
	)]
	#[serde(with = "humantime_serde")]
	pub connect_timeout: Duration,

}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			bind: net::SocketAddr::new(net::Ipv6Addr::UNSPECIFIED.into(), 0),
			tls_root: Vec::new(),
			connect_timeout: Duration::from_secs(5),
		}
	}
}

impl ClientConfig {
	/// Bind the UDP socket and build a connector.
	///
	/// Must be called from within a tokio runtime.
	pub fn init(self) -> anyhow::Result<QuicConnector> {
		let mut tls = rustls::ClientConfig::builder_with_provider(crypto::provider()?)
			.with_protocol_versions(&[&rustls::version::TLS13])?
			.with_root_certificates(self.roots()?)
			.with_no_client_auth();
		tls.alpn_protocols = vec![ALPN.as_bytes().to_vec()];

		let tls: quinn::crypto::rustls::QuicClientConfig = tls.try_into()?;

		let mut transport = quinn::TransportConfig::default();
		transport.max_idle_timeout(Some(Duration::from_secs(10).try_into()?));
		transport.keep_alive_interval(Some(Duration::from_secs(4)));
		// One stream per object, so allow plenty.
		transport.max_concurrent_uni_streams(1024u32.into());

		let mut config = quinn::ClientConfig::new(Arc::new(tls));
		config.transport_config(Arc::new(transport));

		let mut endpoint = quinn::Endpoint::client(self.bind).context("failed to bind UDP socket")?;
		endpoint.set_default_client_config(config);

		tracing::debug!(bind = %self.bind, "client endpoint ready");

		Ok(QuicConnector::new(endpoint, self.connect_timeout))
	}

	fn roots(&self) -> anyhow::Result<rustls::RootCertStore> {
		let mut roots = rustls::RootCertStore::empty();

		if self.tls_root.is_empty() {
			let native = rustls_native_certs::load_native_certs();
			for err in native.errors {
				tracing::warn!(%err, "failed to load root cert");
			}

			for cert in native.certs {
				roots.add(cert).context("failed to add root cert")?;
			}
		} else {
			for path in &self.tls_root {
				let file = fs::File::open(path).with_context(|| format!("failed to open root cert: {}", path.display()))?;
				let mut reader = io::BufReader::new(file);

				let certs = rustls_pemfile::certs(&mut reader)
					.collect::<Result<Vec<_>, _>>()
					.context("failed to read root cert")?;
				anyhow::ensure!(!certs.is_empty(), "no roots found in {}", path.display());

				for cert in certs {
					roots.add(cert).context("failed to add root cert")?;
				}
			}
		}

		Ok(roots)
	}
}
