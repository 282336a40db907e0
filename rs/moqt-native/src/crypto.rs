use std::sync::Arc;

use rustls::crypto::CryptoProvider;

/// The crypto provider to use, preferring one installed by the application.
pub fn provider() -> anyhow::Result<Arc<CryptoProvider>> {
	if let Some(provider) = CryptoProvider::get_default() {
		return Ok(provider.clone());
	}

	#[cfg(feature = "aws-lc-rs")]
	return Ok(Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

	#[cfg(all(feature = "ring", not(feature = "aws-lc-rs")))]
	return Ok(Arc::new(rustls::crypto::ring::default_provider()));

	#[cfg(not(any(feature = "aws-lc-rs", feature = "ring")))]
	anyhow::bail!("no crypto provider: enable the aws-lc-rs or ring feature, or install a default provider");
}
