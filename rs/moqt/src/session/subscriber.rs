use std::sync::Arc;

use web_async::Lock;

use crate::{
	Error, ErrorKind, Event, ObjectInfo, SessionConfig, Stats,
	coding::{DecodeError, Reader},
	event::to_text,
	jitter::now_ms,
	message::ObjectHeader,
	model::{PackagerKind, TrackRegistry},
	packager::Packet,
	transport::{RecvStream, Session},
};

use super::Lifecycle;

/// Accept object streams until the session stops, handling each on its own task.
pub(crate) async fn run_recv<S: Session>(
	session: S,
	registry: Lock<TrackRegistry>,
	lifecycle: Lifecycle,
	config: SessionConfig,
	stats: Arc<dyn Stats>,
) {
	while lifecycle.is_running() {
		let stream = match session.accept_uni().await {
			Ok(stream) => stream,
			Err(err) => {
				lifecycle.fail(Error::transport(err));
				break;
			}
		};

		let registry = registry.clone();
		let lifecycle = lifecycle.clone();
		let config = config.clone();
		let stats = stats.clone();

		web_async::spawn(async move {
			let mut reader = Reader::new(stream).with_limit(config.max_message);
			if let Err(error) = recv_object(&mut reader, &registry, &lifecycle, &config, stats.as_ref()).await {
				tracing::debug!(%error, "failed to receive object");
				reader.abort(&error);
				lifecycle.emit(Event::Error {
					kind: ErrorKind::Object,
					error,
				});
			}
		});
	}

	tracing::debug!("object loop done");
}

async fn recv_object<R: RecvStream>(
	reader: &mut Reader<R>,
	registry: &Lock<TrackRegistry>,
	lifecycle: &Lifecycle,
	config: &SessionConfig,
	stats: &dyn Stats,
) -> Result<(), Error> {
	let header: ObjectHeader = reader.decode().await?;

	let (label, packager) = registry
		.lock()
		.find_by_id(header.track_id)
		.map(|(label, track)| (label.to_string(), track.packager))
		.ok_or(Error::UnknownTrackId(header.track_id))?;

	let packet = match header.length {
		Some(length) => {
			let length = usize::try_from(length).map_err(|_| DecodeError::BoundsExceeded)?;
			if length > config.max_payload {
				return Err(DecodeError::BoundsExceeded.into());
			}

			let buf = reader.read_exact(length).await?;
			Packet::decode(packager, buf)?
		}
		None => Packet::read(packager, reader, config.read_block, config.max_payload).await?,
	};

	let chunk = packet.into_chunk();
	stats.add_rx_bytes(chunk.payload.len() as u64);

	tracing::trace!(track = %label, group = header.group, object = header.object, seq_id = chunk.seq_id, "received object");

	match packager {
		PackagerKind::Raw => {
			let seq_id = chunk.seq_id;
			let text = to_text(chunk.payload)?;
			lifecycle.emit(Event::Data {
				track: label,
				seq_id,
				text,
			});
		}
		PackagerKind::Loc => {
			let ms = now_ms() as i64 - chunk.capture_clock as i64;
			let media = chunk.media_type;

			lifecycle.emit(Event::MediaChunk {
				track: label.clone(),
				header: ObjectInfo {
					track_id: header.track_id,
					group: header.group,
					object: header.object,
					send_order: header.send_order,
				},
				chunk,
			});
			lifecycle.emit(Event::Latency { track: label, media, ms });
		}
	}

	Ok(())
}
