use rand::{Rng, distr::Alphanumeric};

use crate::{Error, coding::VarInt, model::Track};

/// The tracks configured for a session, keyed by their logical label.
///
/// Insertion order is preserved so announces go out in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct TrackRegistry {
	tracks: Vec<(String, Track)>,
}

impl TrackRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Merge subscriber tracks into the registry.
	///
	/// An existing label is updated in place; its transport id can't change once assigned.
	/// Either every track is merged or, on error, the registry is left untouched.
	pub fn merge<I, L>(&mut self, tracks: I) -> Result<(), Error>
	where
		I: IntoIterator<Item = (L, Track)>,
		L: Into<String>,
	{
		let mut next = self.clone();
		for (label, track) in tracks {
			next.insert(label.into(), track)?;
		}

		*self = next;
		Ok(())
	}

	/// Merge publisher tracks into the registry.
	///
	/// Each track must have an in-flight limit. Empty names are replaced with a random
	/// `<8 alphanumerics>-<label>` name, kept across merges of the same label, and missing ids
	/// with the next free id. Either every track is merged or the registry is left untouched.
	pub fn merge_publisher<I, L>(&mut self, tracks: I) -> Result<(), Error>
	where
		I: IntoIterator<Item = (L, Track)>,
		L: Into<String>,
	{
		let mut next = self.clone();

		for (label, mut track) in tracks {
			let label = label.into();

			if track.max_in_flight.is_none() {
				return Err(Error::MissingLimit(label));
			}

			if track.name.is_empty() {
				track.name = match next.get(&label) {
					Some(existing) if !existing.name.is_empty() => existing.name.clone(),
					_ => format!("{}-{}", random_name(), label),
				};
			}

			next.insert(label, track)?;
		}

		// Assign ids after merging so explicit ids are never stolen.
		for i in 0..next.tracks.len() {
			if next.tracks[i].1.id.is_none() {
				let id = next.next_id();
				next.tracks[i].1.id = Some(id);
			}
		}

		*self = next;
		Ok(())
	}

	fn insert(&mut self, label: String, mut track: Track) -> Result<(), Error> {
		if let Some(id) = track.id {
			VarInt::try_from(id)?;
		}

		let conflict = self
			.tracks
			.iter()
			.any(|(other, t)| *other != label && t.namespace == track.namespace && t.name == track.name);
		if conflict {
			return Err(Error::DuplicateTrack(track.full_name()));
		}

		if let Some(id) = track.id
			&& self.tracks.iter().any(|(other, t)| *other != label && t.id == Some(id))
		{
			return Err(Error::TrackIdAssigned(label));
		}

		match self.get_mut(&label) {
			Some(existing) => {
				match (existing.id, track.id) {
					(Some(old), Some(new)) if old != new => return Err(Error::TrackIdAssigned(label)),
					(Some(old), None) => track.id = Some(old),
					_ => {}
				}

				track.subscribers = existing.subscribers;
				*existing = track;
			}
			None => self.tracks.push((label, track)),
		}

		Ok(())
	}

	fn next_id(&self) -> u64 {
		let mut id = 0;
		while self.tracks.iter().any(|(_, t)| t.id == Some(id)) {
			id += 1;
		}
		id
	}

	pub fn get(&self, label: &str) -> Option<&Track> {
		self.tracks.iter().find(|(l, _)| l == label).map(|(_, t)| t)
	}

	pub fn get_mut(&mut self, label: &str) -> Option<&mut Track> {
		self.tracks.iter_mut().find(|(l, _)| l == label).map(|(_, t)| t)
	}

	/// Find a track by its (namespace, name) pair, returning its label.
	pub fn find_by_name(&self, namespace: &str, name: &str) -> Option<(&str, &Track)> {
		self.tracks
			.iter()
			.find(|(_, t)| t.namespace == namespace && t.name == name)
			.map(|(l, t)| (l.as_str(), t))
	}

	/// Find a track by its transport id, returning its label.
	pub fn find_by_id(&self, id: u64) -> Option<(&str, &Track)> {
		self.tracks
			.iter()
			.find(|(_, t)| t.id == Some(id))
			.map(|(l, t)| (l.as_str(), t))
	}

	/// Record the transport id returned by a subscribe response.
	pub fn set_id(&mut self, label: &str, id: u64) -> Result<(), Error> {
		VarInt::try_from(id)?;

		if let Some((other, _)) = self.find_by_id(id)
			&& other != label
		{
			return Err(Error::TrackIdAssigned(label.to_string()));
		}

		let track = self.get_mut(label).ok_or_else(|| Error::UnknownTrack(label.to_string()))?;
		match track.id {
			Some(existing) if existing != id => Err(Error::TrackIdAssigned(label.to_string())),
			_ => {
				track.id = Some(id);
				Ok(())
			}
		}
	}

	/// Increment the subscriber count after accepting a peer subscribe, returning the new count.
	pub fn add_subscriber(&mut self, label: &str) -> Result<u64, Error> {
		let track = self.get_mut(label).ok_or_else(|| Error::UnknownTrack(label.to_string()))?;
		track.subscribers += 1;
		Ok(track.subscribers)
	}

	/// Every distinct namespace, in first-seen order.
	pub fn namespaces(&self) -> Vec<String> {
		let mut namespaces: Vec<String> = Vec::new();
		for (_, track) in &self.tracks {
			if !namespaces.contains(&track.namespace) {
				namespaces.push(track.namespace.clone());
			}
		}
		namespaces
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Track)> {
		self.tracks.iter().map(|(l, t)| (l.as_str(), t))
	}

	pub fn len(&self) -> usize {
		self.tracks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tracks.is_empty()
	}
}

fn random_name() -> String {
	rand::rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect()
}
