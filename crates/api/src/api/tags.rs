use serde::Deserialize;
use sr_media_events::MediaEvent;
use sr_rpc::RegistryBuilder;

use super::Ctx;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub(crate) struct TagArgs {
	path: String,
	tag: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListArgs {
	path: String,
}

async fn ensure_media(ctx: &Ctx, path: &str) -> Result<(), ApiError> {
	match ctx.library.get(path).await? {
		Some(_) => Ok(()),
		None => Err(ApiError::MediaNotFound(path.to_string())),
	}
}

fn tag_name(tag: &str) -> Result<&str, ApiError> {
	match tag.trim() {
		"" => Err(ApiError::EmptyTag),
		tag => Ok(tag),
	}
}

pub(crate) fn mount() -> RegistryBuilder<Ctx> {
	RegistryBuilder::default()
		.query("list", |ctx: Ctx, ListArgs { path }| async move {
			Ok(ctx.tags.tags(&path).await?)
		})
		.mutation("assign", |ctx: Ctx, TagArgs { path, tag }| async move {
			let tag = tag_name(&tag)?;
			ensure_media(&ctx, &path).await?;

			let changed = ctx.tags.assign(&path, tag).await?;
			if changed {
				ctx.events.emit(MediaEvent::update(path));
			}

			Ok(changed)
		})
		.mutation("remove", |ctx: Ctx, TagArgs { path, tag }| async move {
			let tag = tag_name(&tag)?;
			ensure_media(&ctx, &path).await?;

			let changed = ctx.tags.remove(&path, tag).await?;
			if changed {
				ctx.events.emit(MediaEvent::update(path));
			}

			Ok(changed)
		})
}
