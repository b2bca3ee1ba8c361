use serde::{Deserialize, Serialize};

/// Path carried by refresh events, which concern no file in particular.
pub const REFRESH_SENTINEL: &str = "*";

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	PartialOrd,
	Ord,
	Serialize,
	Deserialize,
	strum::Display,
	strum::AsRefStr,
	strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaEventKind {
	Add,
	Delete,
	Update,
	Thumbnail,
	/// Something changed that the window can only pick up by reloading.
	Refresh,
}

/// Events sharing a slot replace each other when a burst is coalesced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DedupeSlot {
	/// Add, update and delete: only the latest state of a file matters.
	Content,
	Thumbnail,
	Refresh,
}

impl MediaEventKind {
	pub(crate) const fn dedupe_slot(self) -> DedupeSlot {
		match self {
			Self::Add | Self::Delete | Self::Update => DedupeSlot::Content,
			Self::Thumbnail => DedupeSlot::Thumbnail,
			Self::Refresh => DedupeSlot::Refresh,
		}
	}
}

/// A change to the media library, as the windows see it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaEvent {
	#[serde(rename = "type")]
	pub kind: MediaEventKind,
	pub path: String,
}

impl MediaEvent {
	pub fn new(kind: MediaEventKind, path: impl Into<String>) -> Self {
		Self {
			kind,
			path: path.into(),
		}
		.normalized()
	}

	pub fn add(path: impl Into<String>) -> Self {
		Self::new(MediaEventKind::Add, path)
	}

	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(MediaEventKind::Delete, path)
	}

	pub fn update(path: impl Into<String>) -> Self {
		Self::new(MediaEventKind::Update, path)
	}

	pub fn thumbnail(path: impl Into<String>) -> Self {
		Self::new(MediaEventKind::Thumbnail, path)
	}

	#[must_use]
	pub fn refresh() -> Self {
		Self::new(MediaEventKind::Refresh, REFRESH_SENTINEL)
	}

	/// Refresh events always carry [`REFRESH_SENTINEL`], whatever path they
	/// were built with.
	#[must_use]
	pub fn normalized(mut self) -> Self {
		if self.kind == MediaEventKind::Refresh && self.path != REFRESH_SENTINEL {
			REFRESH_SENTINEL.clone_into(&mut self.path);
		}

		self
	}
}
