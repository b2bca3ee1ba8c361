use serde::Deserialize;
use sr_media_events::{CoalescingSource, MediaEvent};
use sr_rpc::RegistryBuilder;
use tracing::debug;

use super::Ctx;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListArgs {
	#[serde(default)]
	folder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetArgs {
	path: String,
}

/// Takes no options yet, `null` and `{}` are both accepted.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UpdatesArgs {}

pub(crate) fn mount() -> RegistryBuilder<Ctx> {
	RegistryBuilder::default()
		.query("list", |ctx: Ctx, args: Option<ListArgs>| async move {
			let args = args.unwrap_or_default();
			Ok(ctx.library.list(args.folder.as_deref()).await?)
		})
		.query("get", |ctx: Ctx, GetArgs { path }| async move {
			let Some(item) = ctx.library.get(&path).await? else {
				return Err(ApiError::MediaNotFound(path).into());
			};

			Ok(item)
		})
		.mutation("rescan", |ctx: Ctx, (): ()| async move {
			let items = ctx.library.rescan().await?;
			debug!(items, "Library rescanned");
			ctx.events.emit(MediaEvent::refresh());

			Ok(items)
		})
		.subscription("updates", |ctx: Ctx, _: Option<UpdatesArgs>| async move {
			Ok(CoalescingSource::new(
				&ctx.events,
				ctx.config.debounce_window(),
			))
		})
}
