use std::{
	panic::{catch_unwind, AssertUnwindSafe},
	sync::Arc,
};

use futures::{future::BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::error;

use super::{
	error::{Error, ErrorCode, Result},
	procedure::{Handler, ProcedureDescriptor, ProcedureKind},
	registry::{Registry, PATH_SEPARATOR},
	source::BoxedSource,
};

/// The registry bound to one context.
///
/// Mirrors the registry tree: [`Caller::scope`] narrows into a namespace and
/// [`Caller::procedure`] binds a single leaf. The transport goes through
/// [`Caller::call`] and [`Caller::open`], the very same code in-process
/// callers use, so both observe identical behavior.
pub struct Caller<Ctx> {
	registry: Arc<Registry<Ctx>>,
	ctx: Ctx,
	scope: Option<String>,
}

impl<Ctx: Clone> Clone for Caller<Ctx> {
	fn clone(&self) -> Self {
		Self {
			registry: Arc::clone(&self.registry),
			ctx: self.ctx.clone(),
			scope: self.scope.clone(),
		}
	}
}

impl<Ctx> Caller<Ctx>
where
	Ctx: Clone + Send + Sync + 'static,
{
	pub(crate) const fn new(registry: Arc<Registry<Ctx>>, ctx: Ctx) -> Self {
		Self {
			registry,
			ctx,
			scope: None,
		}
	}

	pub const fn context(&self) -> &Ctx {
		&self.ctx
	}

	/// A caller whose paths are relative to the `name` namespace.
	pub fn scope(&self, name: &str) -> Result<Self> {
		let path = self.full_path(name);
		self.registry.branch(&path)?;

		Ok(Self {
			registry: Arc::clone(&self.registry),
			ctx: self.ctx.clone(),
			scope: Some(path),
		})
	}

	/// The procedure at `path`, bound to this caller's context.
	pub fn procedure(&self, path: &str) -> Result<BoundProcedure<Ctx>> {
		let descriptor = self.registry.resolve(&self.full_path(path))?;

		Ok(BoundProcedure {
			descriptor: Arc::clone(descriptor),
			ctx: self.ctx.clone(),
		})
	}

	/// Kind of the procedure at `path`, `None` when nothing is registered there.
	pub fn kind_of(&self, path: &str) -> Option<ProcedureKind> {
		self.registry
			.resolve(&self.full_path(path))
			.ok()
			.map(|descriptor| descriptor.kind())
	}

	pub async fn query<I, O>(&self, path: &str, input: I) -> Result<O>
	where
		I: Serialize,
		O: DeserializeOwned,
	{
		self.typed(ProcedureKind::Query, path, input).await
	}

	pub async fn mutation<I, O>(&self, path: &str, input: I) -> Result<O>
	where
		I: Serialize,
		O: DeserializeOwned,
	{
		self.typed(ProcedureKind::Mutation, path, input).await
	}

	pub async fn subscribe<I: Serialize>(&self, path: &str, input: I) -> Result<BoxedSource> {
		self.open(path, encode_input(input)?).await
	}

	/// Runs a query or mutation with a raw JSON input.
	pub async fn call(&self, kind: ProcedureKind, path: &str, input: Value) -> Result<Value> {
		if kind == ProcedureKind::Subscription {
			return Err(Error::bad_request(format!(
				"subscription '{path}' can't be called as a request"
			)));
		}

		self.procedure(path)?.call_as(kind, input).await
	}

	/// Invokes a subscription procedure, returning its push source unstarted.
	pub async fn open(&self, path: &str, input: Value) -> Result<BoxedSource> {
		self.procedure(path)?.open(input).await
	}

	async fn typed<I, O>(&self, kind: ProcedureKind, path: &str, input: I) -> Result<O>
	where
		I: Serialize,
		O: DeserializeOwned,
	{
		let output = self.call(kind, path, encode_input(input)?).await?;

		serde_json::from_value(output).map_err(|e| {
			Error::with_cause(
				ErrorCode::InternalServerError,
				format!("failed to decode output of '{path}'"),
				e,
			)
		})
	}

	fn full_path(&self, path: &str) -> String {
		match &self.scope {
			Some(scope) => format!("{scope}{PATH_SEPARATOR}{path}"),
			None => path.to_string(),
		}
	}
}

/// One procedure bound to a context.
pub struct BoundProcedure<Ctx> {
	descriptor: Arc<ProcedureDescriptor<Ctx>>,
	ctx: Ctx,
}

impl<Ctx> BoundProcedure<Ctx>
where
	Ctx: Clone + Send + Sync + 'static,
{
	#[must_use]
	pub fn descriptor(&self) -> &Arc<ProcedureDescriptor<Ctx>> {
		&self.descriptor
	}

	/// Runs a query or a mutation.
	pub async fn call(&self, input: Value) -> Result<Value> {
		self.call_as(self.descriptor.kind(), input).await
	}

	pub async fn open(&self, input: Value) -> Result<BoxedSource> {
		let path = self.descriptor.path();

		match self.descriptor.handler() {
			Handler::Subscription(handler) => {
				guarded(path, || handler(self.ctx.clone(), input)).await
			}
			Handler::Query(_) | Handler::Mutation(_) => Err(Error::bad_request(format!(
				"'{path}' is a {}, not a subscription",
				self.descriptor.kind()
			))),
		}
	}

	async fn call_as(&self, kind: ProcedureKind, input: Value) -> Result<Value> {
		let path = self.descriptor.path();

		match (kind, self.descriptor.handler()) {
			(ProcedureKind::Query, Handler::Query(handler))
			| (ProcedureKind::Mutation, Handler::Mutation(handler)) => {
				guarded(path, || handler(self.ctx.clone(), input)).await
			}
			(_, Handler::Subscription(_)) => Err(Error::bad_request(format!(
				"subscription '{path}' can't be called as a request"
			))),
			_ => Err(Error::not_found(format!("no {kind} procedure at '{path}'"))),
		}
	}
}

fn encode_input<I: Serialize>(input: I) -> Result<Value> {
	serde_json::to_value(input)
		.map_err(|e| Error::with_cause(ErrorCode::BadRequest, "failed to encode input", e))
}

/// Runs a handler, turning a panic into an internal error instead of
/// unwinding into the transport.
async fn guarded<T>(
	path: &str,
	handler: impl FnOnce() -> BoxFuture<'static, Result<T>>,
) -> Result<T> {
	let panicked = || {
		error!(%path, "Procedure handler panicked");
		Error::internal(format!("procedure '{path}' panicked"))
	};

	match catch_unwind(AssertUnwindSafe(handler)) {
		Ok(fut) => AssertUnwindSafe(fut)
			.catch_unwind()
			.await
			.unwrap_or_else(|_| Err(panicked())),
		Err(_) => Err(panicked()),
	}
}
