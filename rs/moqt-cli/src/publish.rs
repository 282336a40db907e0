use anyhow::Context;
use moqt::{Chunk, Client, Event, PackagerKind, SendOutcome};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::TrackFile;

/// Publish the configured tracks, then send every input line on the chosen raw track.
pub async fn run<R: AsyncRead + Unpin>(
	client: &Client,
	file: TrackFile,
	label: Option<String>,
	input: R,
) -> anyhow::Result<()> {
	let label = pick_label(&file, label)?;

	client.publish(file.tracks()).await?;
	tracing::info!(%label, "publishing, waiting for subscribers");

	let mut events = client.events();
	let mut lines = BufReader::new(input).lines();
	let mut seq_id = 0;

	loop {
		tokio::select! {
			line = lines.next_line() => {
				let Some(line) = line.context("failed to read input")? else {
					tracing::info!("end of input");
					return Ok(());
				};

				match client.send(label.as_str(), Chunk::data(seq_id, line)).await? {
					SendOutcome::Sent => seq_id += 1,
					SendOutcome::Dropped => tracing::warn!(seq_id, "too many objects in flight, dropped"),
					SendOutcome::Rejected(reason) => tracing::warn!(?reason, seq_id, "not sent"),
				}
			}
			event = events.next() => match event {
				Some(Event::Error { kind, error }) => tracing::warn!(?kind, %error, "session error"),
				Some(Event::Closed) | None => anyhow::bail!("session closed"),
				Some(_) => {}
			},
			_ = tokio::signal::ctrl_c() => return Ok(()),
		}
	}
}

fn pick_label(file: &TrackFile, label: Option<String>) -> anyhow::Result<String> {
	let raw = |track: &moqt::Track| track.packager == PackagerKind::Raw;

	match label {
		Some(label) => {
			let track = file.tracks.get(&label).with_context(|| format!("unknown track: {label}"))?;
			anyhow::ensure!(raw(track), "track {label} is not a raw track");
			Ok(label)
		}
		None => file
			.tracks
			.iter()
			.find(|(_, track)| raw(track))
			.map(|(label, _)| label.clone())
			.context("no raw track to publish on"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn file() -> TrackFile {
		TrackFile::parse(
			r#"
			[tracks.a-video]
			namespace = "demo"
			packager = "loc"

			[tracks.b-chat]
			namespace = "demo"
			"#,
		)
		.unwrap()
	}

	#[test]
	fn test_pick_label() {
		let file = file();
		assert_eq!(pick_label(&file, None).unwrap(), "b-chat");
		assert_eq!(pick_label(&file, Some("b-chat".to_string())).unwrap(), "b-chat");
		assert!(pick_label(&file, Some("a-video".to_string())).is_err());
		assert!(pick_label(&file, Some("missing".to_string())).is_err());
	}
}
