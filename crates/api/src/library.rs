//! Collaborators the media host delegates to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
	pub path: String,
	pub name: String,
	pub size: u64,
}

impl MediaItem {
	pub fn new(path: impl Into<String>, size: u64) -> Self {
		let path = path.into();
		let name = path.rsplit('/').next().unwrap_or_default().to_string();

		Self { path, name, size }
	}

	/// Parent folder, without a trailing slash.
	#[must_use]
	pub fn folder(&self) -> &str {
		self.path
			.rsplit_once('/')
			.map_or("", |(folder, _)| folder)
	}
}

#[async_trait]
pub trait MediaLibrary: Send + Sync + 'static {
	/// Items directly inside `folder`, or every item when `None`.
	async fn list(&self, folder: Option<&str>) -> Result<Vec<MediaItem>, ApiError>;

	async fn get(&self, path: &str) -> Result<Option<MediaItem>, ApiError>;

	/// Walks the library again, returning how many items it holds.
	async fn rescan(&self) -> Result<usize, ApiError>;
}

#[async_trait]
pub trait TagStore: Send + Sync + 'static {
	async fn tags(&self, path: &str) -> Result<Vec<String>, ApiError>;

	/// False if `path` already had the tag.
	async fn assign(&self, path: &str, tag: &str) -> Result<bool, ApiError>;

	/// False if `path` didn't have the tag.
	async fn remove(&self, path: &str, tag: &str) -> Result<bool, ApiError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
	async fn get(&self, key: &str) -> Result<Option<Value>, ApiError>;

	async fn set(&self, key: &str, value: Value) -> Result<(), ApiError>;
}
