use std::{
	collections::{hash_map::Entry, HashMap},
	future::Future,
	sync::Arc,
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{
	caller::Caller,
	error::{NotFound, RegistryError, Result},
	procedure::{request_fn, subscription_fn, Handler, ProcedureDescriptor, ProcedureKind},
	source::PushSource,
};

pub const PATH_SEPARATOR: char = '.';

/// A node of the procedure tree.
pub enum Node<Ctx> {
	Branch(HashMap<String, Node<Ctx>>),
	Leaf(Arc<ProcedureDescriptor<Ctx>>),
}

/// Static namespace of every procedure the backend exposes, built once at startup.
pub struct Registry<Ctx> {
	root: HashMap<String, Node<Ctx>>,
}

impl<Ctx> Registry<Ctx>
where
	Ctx: Clone + Send + Sync + 'static,
{
	#[must_use]
	pub fn builder() -> RegistryBuilder<Ctx> {
		RegistryBuilder::default()
	}

	/// Walks `path` segment by segment, stopping at the first segment that
	/// does not exist. Paths ending on a namespace, or continuing past a
	/// procedure, are not found either.
	pub fn resolve(&self, path: &str) -> Result<&Arc<ProcedureDescriptor<Ctx>>, NotFound> {
		let not_found = |segment: &str| NotFound {
			path: path.to_string(),
			segment: segment.to_string(),
		};

		let mut segments = path.split(PATH_SEPARATOR).peekable();
		let mut children = &self.root;

		while let Some(segment) = segments.next() {
			let is_last = segments.peek().is_none();

			match children.get(segment) {
				Some(Node::Branch(next)) if !is_last => children = next,
				Some(Node::Leaf(descriptor)) if is_last => return Ok(descriptor),
				// Path stops on a namespace
				Some(Node::Branch(_)) => return Err(not_found(segment)),
				// Path continues past a procedure
				Some(Node::Leaf(_)) => {
					return Err(not_found(segments.next().unwrap_or_default()));
				}
				None => return Err(not_found(segment)),
			}
		}

		Err(not_found(path))
	}

	/// Returns the namespace at `path`, used to scope a [`Caller`].
	pub(crate) fn branch(&self, path: &str) -> Result<&HashMap<String, Node<Ctx>>, NotFound> {
		let mut children = &self.root;

		for segment in path.split(PATH_SEPARATOR) {
			match children.get(segment) {
				Some(Node::Branch(next)) => children = next,
				Some(Node::Leaf(_)) | None => {
					return Err(NotFound {
						path: path.to_string(),
						segment: segment.to_string(),
					})
				}
			}
		}

		Ok(children)
	}

	/// Every registered `(path, kind)`, sorted by path.
	#[must_use]
	pub fn procedures(&self) -> Vec<(String, ProcedureKind)> {
		fn walk<Ctx>(nodes: &HashMap<String, Node<Ctx>>, out: &mut Vec<(String, ProcedureKind)>) {
			for node in nodes.values() {
				match node {
					Node::Branch(children) => walk(children, out),
					Node::Leaf(descriptor) => {
						out.push((descriptor.path().to_string(), descriptor.kind()));
					}
				}
			}
		}

		let mut out = Vec::new();
		walk(&self.root, &mut out);
		out.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
		out
	}

	/// Binds every procedure to `ctx`. This is the only way procedures are
	/// invoked, by the transport and by in-process callers alike.
	#[must_use]
	pub fn caller(self: &Arc<Self>, ctx: Ctx) -> Caller<Ctx> {
		Caller::new(Arc::clone(self), ctx)
	}
}

/// Collects registrations and validates the whole tree on [`RegistryBuilder::build`].
pub struct RegistryBuilder<Ctx> {
	entries: Vec<(Vec<String>, Handler<Ctx>)>,
	errors: Vec<RegistryError>,
}

impl<Ctx> Default for RegistryBuilder<Ctx> {
	fn default() -> Self {
		Self {
			entries: Vec::new(),
			errors: Vec::new(),
		}
	}
}

impl<Ctx> RegistryBuilder<Ctx>
where
	Ctx: Clone + Send + Sync + 'static,
{
	#[must_use]
	pub fn query<I, O, F, Fut>(self, name: &str, f: F) -> Self
	where
		I: DeserializeOwned + Send + 'static,
		O: Serialize + Send + 'static,
		F: Fn(Ctx, I) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<O>> + Send + 'static,
	{
		self.push(name, Handler::Query(request_fn(f)))
	}

	#[must_use]
	pub fn mutation<I, O, F, Fut>(self, name: &str, f: F) -> Self
	where
		I: DeserializeOwned + Send + 'static,
		O: Serialize + Send + 'static,
		F: Fn(Ctx, I) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<O>> + Send + 'static,
	{
		self.push(name, Handler::Mutation(request_fn(f)))
	}

	#[must_use]
	pub fn subscription<I, S, F, Fut>(self, name: &str, f: F) -> Self
	where
		I: DeserializeOwned + Send + 'static,
		S: PushSource,
		F: Fn(Ctx, I) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<S>> + Send + 'static,
	{
		self.push(name, Handler::Subscription(subscription_fn(f)))
	}

	/// Mounts every procedure of `other` under `prefix`.
	#[must_use]
	pub fn merge(mut self, prefix: &str, other: Self) -> Self {
		match split_name(prefix) {
			Ok(prefix) => {
				self.entries
					.extend(other.entries.into_iter().map(|(segments, handler)| {
						(prefix.iter().cloned().chain(segments).collect(), handler)
					}));
				self.errors.extend(other.errors);
			}
			Err(e) => self.errors.push(e),
		}

		self
	}

	pub fn build(self) -> Result<Registry<Ctx>, RegistryError> {
		if let Some(e) = self.errors.into_iter().next() {
			return Err(e);
		}

		let mut root = HashMap::new();

		for (segments, handler) in self.entries {
			insert(&mut root, &segments, handler)?;
		}

		let registry = Registry { root };

		debug!(
			procedures = registry.procedures().len(),
			"Procedure registry built"
		);

		Ok(registry)
	}

	fn push(mut self, name: &str, handler: Handler<Ctx>) -> Self {
		match split_name(name) {
			Ok(segments) => self.entries.push((segments, handler)),
			Err(e) => self.errors.push(e),
		}

		self
	}
}

fn split_name(name: &str) -> Result<Vec<String>, RegistryError> {
	name.split(PATH_SEPARATOR)
		.map(|segment| {
			if segment.is_empty() || segment.trim() != segment {
				Err(RegistryError::InvalidName(name.to_string()))
			} else {
				Ok(segment.to_string())
			}
		})
		.collect()
}

fn insert<Ctx>(
	root: &mut HashMap<String, Node<Ctx>>,
	segments: &[String],
	handler: Handler<Ctx>,
) -> Result<(), RegistryError> {
	let path = segments.join(".");
	let Some((leaf, namespaces)) = segments.split_last() else {
		return Err(RegistryError::InvalidName(path));
	};

	let mut children = root;
	for (depth, segment) in namespaces.iter().enumerate() {
		let node = children
			.entry(segment.clone())
			.or_insert_with(|| Node::Branch(HashMap::new()));

		children = match node {
			Node::Branch(next) => next,
			Node::Leaf(_) => return Err(RegistryError::Collision(segments[..=depth].join("."))),
		};
	}

	match children.entry(leaf.clone()) {
		Entry::Vacant(slot) => {
			slot.insert(Node::Leaf(Arc::new(ProcedureDescriptor::new(path, handler))));
			Ok(())
		}
		Entry::Occupied(slot) => match slot.get() {
			Node::Leaf(_) => Err(RegistryError::Duplicate(path)),
			Node::Branch(_) => Err(RegistryError::Collision(path)),
		},
	}
}
