use serde::Deserialize;
use serde_json::Value;
use sr_media_events::MediaEvent;
use sr_rpc::RegistryBuilder;

use super::Ctx;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub(crate) struct GetArgs {
	key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetArgs {
	key: String,
	#[serde(default)]
	value: Value,
}

/// Keys are dotted lowercase identifiers like `player.volume`.
fn validate_key(key: &str) -> Result<&str, ApiError> {
	let valid = !key.is_empty()
		&& key.split('.').all(|part| {
			!part.is_empty()
				&& part
					.chars()
					.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
		});

	if valid {
		Ok(key)
	} else {
		Err(ApiError::InvalidSettingsKey(key.to_string()))
	}
}

pub(crate) fn mount() -> RegistryBuilder<Ctx> {
	RegistryBuilder::default()
		.query("get", |ctx: Ctx, GetArgs { key }| async move {
			let key = validate_key(&key)?;
			Ok(ctx.settings.get(key).await?.unwrap_or(Value::Null))
		})
		.mutation("set", |ctx: Ctx, SetArgs { key, value }| async move {
			let key = validate_key(&key)?;
			ctx.settings.set(key, value).await?;
			ctx.events.emit(MediaEvent::refresh());

			Ok(())
		})
}

#[cfg(test)]
mod tests {
	use super::validate_key;

	#[test]
	fn settings_keys() {
		for key in ["volume", "player.volume", "player.last_folder2"] {
			assert!(validate_key(key).is_ok(), "{key}");
		}

		for key in ["", ".volume", "player.", "Player.Volume", "player volume", "a..b"] {
			assert!(validate_key(key).is_err(), "{key}");
		}
	}
}
