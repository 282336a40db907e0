use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Tracing configuration for binaries.
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
	/// The level filter to use, overridden per target by RUST_LOG.
	#[arg(id = "log-level", long = "log-level", default_value = "info", env = "MOQT_LOG_LEVEL")]
	pub level: String,
}

impl Default for Log {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
		}
	}
}

impl Log {
	/// The parsed level, falling back to info when it doesn't parse.
	pub fn level(&self) -> LevelFilter {
		self.level.parse().unwrap_or(LevelFilter::INFO)
	}

	pub fn filter(&self) -> EnvFilter {
		let filter = EnvFilter::builder()
			.with_default_directive(self.level().into())
			.from_env_lossy();

		// quinn is noisy below info.
		match "quinn=info".parse() {
			Ok(directive) => filter.add_directive(directive),
			Err(_) => filter,
		}
	}

	pub fn init(&self) {
		let logger = tracing_subscriber::FmtSubscriber::builder()
			.with_writer(std::io::stderr)
			.with_env_filter(self.filter())
			.finish();

		if let Err(err) = tracing::subscriber::set_global_default(logger) {
			eprintln!("failed to set tracing subscriber: {err}");
		}
	}
}
