//! In memory collaborators, for tests and running without a real library.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
	error::ApiError,
	library::{MediaItem, MediaLibrary, SettingsStore, TagStore},
};

#[derive(Debug, Default)]
pub struct MemoryLibrary {
	items: RwLock<BTreeMap<String, MediaItem>>,
}

impl MemoryLibrary {
	pub fn with_items(items: impl IntoIterator<Item = MediaItem>) -> Self {
		Self {
			items: RwLock::new(
				items
					.into_iter()
					.map(|item| (item.path.clone(), item))
					.collect(),
			),
		}
	}

	pub async fn insert(&self, item: MediaItem) -> Option<MediaItem> {
		self.items.write().await.insert(item.path.clone(), item)
	}

	pub async fn remove(&self, path: &str) -> Option<MediaItem> {
		self.items.write().await.remove(path)
	}
}

#[async_trait]
impl MediaLibrary for MemoryLibrary {
	async fn list(&self, folder: Option<&str>) -> Result<Vec<MediaItem>, ApiError> {
		let folder = folder.map(|folder| folder.trim_end_matches('/'));

		Ok(self
			.items
			.read()
			.await
			.values()
			.filter(|item| folder.map_or(true, |folder| item.folder() == folder))
			.cloned()
			.collect())
	}

	async fn get(&self, path: &str) -> Result<Option<MediaItem>, ApiError> {
		Ok(self.items.read().await.get(path).cloned())
	}

	async fn rescan(&self) -> Result<usize, ApiError> {
		Ok(self.items.read().await.len())
	}
}

#[derive(Debug, Default)]
pub struct MemoryTags {
	tags: RwLock<HashMap<String, BTreeSet<String>>>,
}

#[async_trait]
impl TagStore for MemoryTags {
	async fn tags(&self, path: &str) -> Result<Vec<String>, ApiError> {
		Ok(self
			.tags
			.read()
			.await
			.get(path)
			.map(|tags| tags.iter().cloned().collect())
			.unwrap_or_default())
	}

	async fn assign(&self, path: &str, tag: &str) -> Result<bool, ApiError> {
		Ok(self
			.tags
			.write()
			.await
			.entry(path.to_string())
			.or_default()
			.insert(tag.to_string()))
	}

	async fn remove(&self, path: &str, tag: &str) -> Result<bool, ApiError> {
		let mut tags = self.tags.write().await;

		let Some(set) = tags.get_mut(path) else {
			return Ok(false);
		};

		let removed = set.remove(tag);
		if set.is_empty() {
			tags.remove(path);
		}

		Ok(removed)
	}
}

#[derive(Debug, Default)]
pub struct MemorySettings {
	values: RwLock<HashMap<String, Value>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
	async fn get(&self, key: &str) -> Result<Option<Value>, ApiError> {
		Ok(self.values.read().await.get(key).cloned())
	}

	async fn set(&self, key: &str, value: Value) -> Result<(), ApiError> {
		let mut values = self.values.write().await;

		if value.is_null() {
			values.remove(key);
		} else {
			values.insert(key.to_string(), value);
		}

		Ok(())
	}
}
