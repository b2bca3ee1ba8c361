use std::{fmt, future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::{
	error::{Error, ErrorCode, Result},
	source::{BoxedSource, PushSource},
};

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	Serialize,
	Deserialize,
	strum::Display,
	strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProcedureKind {
	Query,
	Mutation,
	Subscription,
}

pub(crate) type RequestFn<Ctx> =
	Arc<dyn Fn(Ctx, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

pub(crate) type SubscriptionFn<Ctx> =
	Arc<dyn Fn(Ctx, Value) -> BoxFuture<'static, Result<BoxedSource>> + Send + Sync>;

pub(crate) enum Handler<Ctx> {
	Query(RequestFn<Ctx>),
	Mutation(RequestFn<Ctx>),
	Subscription(SubscriptionFn<Ctx>),
}

impl<Ctx> Handler<Ctx> {
	pub(crate) const fn kind(&self) -> ProcedureKind {
		match self {
			Self::Query(_) => ProcedureKind::Query,
			Self::Mutation(_) => ProcedureKind::Mutation,
			Self::Subscription(_) => ProcedureKind::Subscription,
		}
	}
}

impl<Ctx> Clone for Handler<Ctx> {
	fn clone(&self) -> Self {
		match self {
			Self::Query(f) => Self::Query(Arc::clone(f)),
			Self::Mutation(f) => Self::Mutation(Arc::clone(f)),
			Self::Subscription(f) => Self::Subscription(Arc::clone(f)),
		}
	}
}

/// A registered procedure, immutable once the registry is built.
pub struct ProcedureDescriptor<Ctx> {
	path: String,
	handler: Handler<Ctx>,
}

impl<Ctx> ProcedureDescriptor<Ctx> {
	pub(crate) const fn new(path: String, handler: Handler<Ctx>) -> Self {
		Self { path, handler }
	}

	#[must_use]
	pub fn path(&self) -> &str {
		&self.path
	}

	#[must_use]
	pub const fn kind(&self) -> ProcedureKind {
		self.handler.kind()
	}

	pub(crate) const fn handler(&self) -> &Handler<Ctx> {
		&self.handler
	}
}

impl<Ctx> fmt::Debug for ProcedureDescriptor<Ctx> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProcedureDescriptor")
			.field("path", &self.path)
			.field("kind", &self.kind())
			.finish_non_exhaustive()
	}
}

fn decode_input<I: DeserializeOwned>(input: Value) -> Result<I> {
	serde_json::from_value(input).map_err(|e| {
		Error::with_cause(ErrorCode::BadRequest, format!("invalid input: {e}"), e)
	})
}

pub(crate) fn request_fn<Ctx, I, O, F, Fut>(f: F) -> RequestFn<Ctx>
where
	Ctx: Send + 'static,
	I: DeserializeOwned + Send + 'static,
	O: Serialize + Send + 'static,
	F: Fn(Ctx, I) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<O>> + Send + 'static,
{
	Arc::new(
		move |ctx: Ctx, input: Value| -> BoxFuture<'static, Result<Value>> {
			match decode_input::<I>(input) {
				Ok(input) => {
					let fut = f(ctx, input);
					async move { Ok(serde_json::to_value(fut.await?)?) }.boxed()
				}
				Err(e) => async move { Err(e) }.boxed(),
			}
		},
	)
}

pub(crate) fn subscription_fn<Ctx, I, S, F, Fut>(f: F) -> SubscriptionFn<Ctx>
where
	Ctx: Send + 'static,
	I: DeserializeOwned + Send + 'static,
	S: PushSource,
	F: Fn(Ctx, I) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<S>> + Send + 'static,
{
	Arc::new(
		move |ctx: Ctx, input: Value| -> BoxFuture<'static, Result<BoxedSource>> {
			match decode_input::<I>(input) {
				Ok(input) => {
					let fut = f(ctx, input);
					async move {
						fut.await
							.map(|source| -> BoxedSource { Box::new(source) })
					}
					.boxed()
				}
				Err(e) => async move { Err(e) }.boxed(),
			}
		},
	)
}
