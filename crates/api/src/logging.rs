use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::ApiConfig;

/// `RUST_LOG` wins over the configured filter.
pub fn env_filter(config: &ApiConfig) -> anyhow::Result<EnvFilter> {
	EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&config.log_filter))
		.map_err(Into::into)
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init_logger(config: &ApiConfig) -> anyhow::Result<()> {
	tracing_subscriber::registry()
		.with(env_filter(config)?)
		.with(fmt::layer().with_target(true))
		.try_init()?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn configured_filter_parses() {
		if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
			return;
		}

		assert!(env_filter(&ApiConfig::default()).is_ok());
		assert!(env_filter(&ApiConfig {
			log_filter: "sr_rpc=loud".to_string(),
			..ApiConfig::default()
		})
		.is_err());
	}
}
