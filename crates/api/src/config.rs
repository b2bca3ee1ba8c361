//! Host configuration, persisted next to the library data

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use anyhow::{anyhow, Context as _, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "showreel.json";

const LATEST_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
	/// Config schema version
	pub version: u32,

	/// Directory the config lives in
	#[serde(skip)]
	pub data_dir: PathBuf,

	/// Quiet period before buffered media events are sent, in milliseconds
	pub debounce_ms: u64,

	/// Events each bus feed holds before slow listeners start lagging
	pub event_buffer: usize,

	/// Default `tracing` filter, `RUST_LOG` takes precedence
	pub log_filter: String,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			version: LATEST_VERSION,
			data_dir: PathBuf::new(),
			debounce_ms: 250,
			event_buffer: 1024,
			log_filter: "info,sr_rpc=debug".to_string(),
		}
	}
}

impl ApiConfig {
	/// Loads the config from `data_dir`, creating it with defaults if missing
	pub fn load_from(data_dir: impl AsRef<Path>) -> Result<Self> {
		let data_dir = data_dir.as_ref();
		let config_path = data_dir.join(CONFIG_FILE);

		if !config_path.exists() {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			return Ok(config);
		}

		info!("Loading config from {:?}", config_path);
		let json = fs::read_to_string(&config_path)
			.with_context(|| format!("failed to read {}", config_path.display()))?;
		let mut config: Self = serde_json::from_str(&json)?;
		config.data_dir = data_dir.to_path_buf();

		if config.version > LATEST_VERSION {
			return Err(anyhow!(
				"config version {} is newer than supported version {LATEST_VERSION}",
				config.version
			));
		}

		if config.version < LATEST_VERSION {
			info!(
				"Migrating config from v{} to v{LATEST_VERSION}",
				config.version
			);
			config.migrate();
			config.save()?;
		}

		Ok(config)
	}

	#[must_use]
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			data_dir,
			..Self::default()
		}
	}

	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;
		let json = serde_json::to_string_pretty(self)?;
		fs::write(self.config_path(), json)?;
		Ok(())
	}

	#[must_use]
	pub fn config_path(&self) -> PathBuf {
		self.data_dir.join(CONFIG_FILE)
	}

	#[must_use]
	pub const fn debounce_window(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	fn migrate(&mut self) {
		// v1 had no bus buffer and allowed a zero window
		if self.version < 2 {
			if self.debounce_ms == 0 {
				self.debounce_ms = Self::default().debounce_ms;
			}
			self.version = 2;
		}
	}
}
