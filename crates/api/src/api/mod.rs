use std::sync::Arc;

use sr_media_events::MediaEventBus;
use sr_rpc::{Registry, RegistryError};

use crate::{
	config::ApiConfig,
	library::{MediaLibrary, SettingsStore, TagStore},
	memory::{MemoryLibrary, MemorySettings, MemoryTags},
};

mod media;
mod settings;
mod tags;

/// Everything a procedure can reach. Cheap to clone, one per connection.
#[derive(Clone)]
pub struct Ctx {
	pub library: Arc<dyn MediaLibrary>,
	pub tags: Arc<dyn TagStore>,
	pub settings: Arc<dyn SettingsStore>,
	pub events: Arc<MediaEventBus>,
	pub config: Arc<ApiConfig>,
}

impl Ctx {
	pub fn new(
		library: Arc<dyn MediaLibrary>,
		tags: Arc<dyn TagStore>,
		settings: Arc<dyn SettingsStore>,
		config: ApiConfig,
	) -> Self {
		Self {
			library,
			tags,
			settings,
			events: Arc::new(MediaEventBus::new(config.event_buffer)),
			config: Arc::new(config),
		}
	}

	/// A context backed by the in memory collaborators.
	#[must_use]
	pub fn in_memory(library: MemoryLibrary, config: ApiConfig) -> Self {
		Self::new(
			Arc::new(library),
			Arc::new(MemoryTags::default()),
			Arc::new(MemorySettings::default()),
			config,
		)
	}
}

pub fn mount() -> Result<Registry<Ctx>, RegistryError> {
	Registry::builder()
		.query("version", |_: Ctx, (): ()| async move {
			Ok(env!("CARGO_PKG_VERSION"))
		})
		.merge("media", media::mount())
		.merge("tags", tags::mount())
		.merge("settings", settings::mount())
		.build()
}
