//! Helper library for native moqt applications.
//!
//! Establishes moqt sessions over WebTransport (HTTP/3) using quinn, configured by
//! [ClientConfig], and provides a [Log] initializer for binaries.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! let config = moqt_native::ClientConfig::default();
//! let client = moqt::Client::new(config.init()?, Default::default());
//! client.connect("https://localhost:4443".parse()?).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod crypto;
mod log;
mod quic;

pub use client::*;
pub use log::*;
pub use quic::*;

// Re-export these crates.
pub use moqt;
pub use quinn;
pub use rustls;
pub use web_transport_quinn;
