use std::collections::HashMap;

use moqt::{
	Client, Event,
	jitter::{JitterItem, Playout, SharedJitterBuffer},
};
use tokio::sync::mpsc;

use crate::TrackFile;

/// Subscribe to the configured tracks, printing text and playing out media until closed.
pub async fn run(client: &Client, file: TrackFile) -> anyhow::Result<()> {
	client.subscribe(file.tracks()).await?;
	tracing::info!(tracks = file.tracks.len(), "subscribed");

	let mut events = client.events();
	let mut buffers = HashMap::new();

	loop {
		let event = tokio::select! {
			event = events.next() => event,
			_ = tokio::signal::ctrl_c() => return Ok(()),
		};

		match event {
			Some(Event::Data { track, seq_id, text }) => println!("{track} #{seq_id}: {text}"),
			Some(Event::MediaChunk { track, header, chunk }) => {
				tracing::trace!(%track, group = header.group, object = header.object, "media chunk");

				let buffer = buffers
					.entry(track.clone())
					.or_insert_with(|| playout(track, &file));

				if let Some(evicted) = buffer.push(chunk.seq_id, chunk) {
					tracing::debug!(seq_id = evicted.seq_id, "jitter buffer full, evicted");
				}
			}
			Some(Event::Latency { track, media, ms }) => tracing::debug!(%track, ?media, ms, "latency"),
			Some(Event::Error { kind, error }) => tracing::warn!(?kind, %error, "session error"),
			Some(Event::Closed) | None => anyhow::bail!("session closed"),
		}
	}
}

// Start a playout loop for a media track; it stands in for the decoder and only logs.
fn playout(track: String, file: &TrackFile) -> SharedJitterBuffer {
	let buffer = SharedJitterBuffer::new(file.jitter);
	let (tx, mut rx) = mpsc::channel::<JitterItem>(file.jitter.capacity.max(1));

	tokio::spawn(Playout::new(buffer.clone(), file.jitter).run(tx));
	tokio::spawn(async move {
		while let Some(item) = rx.recv().await {
			let chunk = item.value;
			tracing::info!(
				%track,
				seq_id = item.seq_id,
				kind = ?chunk.kind,
				timestamp = chunk.timestamp,
				size = chunk.payload.len(),
				"playout"
			);
		}
	});

	buffer
}
