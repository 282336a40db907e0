/// The payload format used on a track's object streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PackagerKind {
	/// Opaque bytes, interpreted as UTF-8 text.
	#[default]
	Raw,
	/// Low overhead media chunks with timing metadata.
	Loc,
}

/// A named flow of objects, configured by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields, rename_all = "kebab-case"))]
pub struct Track {
	pub namespace: String,

	/// The track name; publisher tracks left empty get a random name.
	pub name: String,

	/// The transport id, chosen by the publisher and echoed in the subscribe response.
	pub id: Option<u64>,

	pub packager: PackagerKind,

	/// Opaque token sent in announce/subscribe and compared on incoming subscribes.
	pub auth: String,

	/// The maximum number of objects in flight, required when publishing.
	pub max_in_flight: Option<usize>,

	/// Objects on a high priority track are always scheduled before normal ones.
	pub high_priority: bool,

	/// The number of accepted peer subscriptions.
	#[cfg_attr(feature = "serde", serde(skip))]
	pub subscribers: u64,
}

impl Track {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>, packager: PackagerKind) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
			packager,
			..Default::default()
		}
	}

	pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
		self.auth = auth.into();
		self
	}

	pub fn with_max_in_flight(mut self, max: usize) -> Self {
		self.max_in_flight = Some(max);
		self
	}

	pub fn with_high_priority(mut self, high_priority: bool) -> Self {
		self.high_priority = high_priority;
		self
	}

	pub fn with_id(mut self, id: u64) -> Self {
		self.id = Some(id);
		self
	}

	/// The `namespace/name` pair, used in logs and errors.
	pub fn full_name(&self) -> String {
		format!("{}/{}", self.namespace, self.name)
	}
}
