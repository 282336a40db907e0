use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Args;
use indexmap::IndexMap;
use moqt::{JitterConfig, PackagerKind, SessionConfig, Track};
use serde::Deserialize;

/// The contents of a `--tracks` file.
///
/// ```toml
/// [session]
/// request-timeout = "2s"
///
/// [tracks.chat]
/// namespace = "demo"
/// name = "chat"
/// auth = "secret"
/// max-in-flight = 10
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TrackFile {
	pub session: SessionConfig,
	pub jitter: JitterConfig,

	/// Tracks keyed by label, in file order; namespaces are announced in the order first seen.
	pub tracks: IndexMap<String, Track>,
}

impl TrackFile {
	pub fn parse(contents: &str) -> anyhow::Result<Self> {
		let file: Self = toml::from_str(contents)?;
		anyhow::ensure!(!file.tracks.is_empty(), "no tracks configured");
		Ok(file)
	}

	pub fn tracks(&self) -> Vec<(String, Track)> {
		self.tracks
			.iter()
			.map(|(label, track)| (label.clone(), track.clone()))
			.collect()
	}
}

/// Either a tracks file, or a single track described by flags.
#[derive(Args, Clone, Debug)]
pub struct TrackArgs {
	/// Load the session and track configuration from a TOML file.
	#[arg(long, conflicts_with = "namespace")]
	pub tracks: Option<PathBuf>,

	/// The label used to refer to the track.
	#[arg(long, default_value = "data")]
	pub label: String,

	/// The track namespace.
	#[arg(long)]
	pub namespace: Option<String>,

	/// The track name; left empty, publishers pick a random one.
	#[arg(long, default_value = "")]
	pub name: String,

	/// The payload format.
	#[arg(long, default_value = "raw", value_parser = parse_packager)]
	pub packager: PackagerKind,

	/// The token sent in announce and subscribe.
	#[arg(long, default_value = "", env = "MOQT_AUTH")]
	pub auth: String,

	/// The maximum number of objects in flight when publishing.
	#[arg(long, default_value_t = 10)]
	pub max_in_flight: usize,

	/// Schedule objects ahead of normal tracks.
	#[arg(long)]
	pub high_priority: bool,
}

impl TrackArgs {
	pub fn load(&self) -> anyhow::Result<TrackFile> {
		if let Some(path) = &self.tracks {
			let contents =
				fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
			return TrackFile::parse(&contents).with_context(|| format!("invalid tracks file {}", path.display()));
		}

		let namespace = self.namespace.clone().context("either --tracks or --namespace is required")?;
		let track = Track::new(namespace, self.name.clone(), self.packager)
			.with_auth(self.auth.clone())
			.with_max_in_flight(self.max_in_flight)
			.with_high_priority(self.high_priority);

		Ok(TrackFile {
			tracks: IndexMap::from([(self.label.clone(), track)]),
			..Default::default()
		})
	}
}

fn parse_packager(s: &str) -> Result<PackagerKind, String> {
	match s {
		"raw" => Ok(PackagerKind::Raw),
		"loc" => Ok(PackagerKind::Loc),
		_ => Err(format!("unknown packager: {s} (expected raw or loc)")),
	}
}
