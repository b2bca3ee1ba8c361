use std::{error::Error as StdError, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Machine readable code carried by every failed call.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	BadRequest,
	Unauthorized,
	Forbidden,
	NotFound,
	Conflict,
	InternalServerError,
}

impl ErrorCode {
	/// Codes a client is expected to act upon, these are forwarded as is.
	/// Anything else is reported as [`ErrorCode::InternalServerError`].
	#[must_use]
	pub const fn is_client_facing(self) -> bool {
		!matches!(self, Self::InternalServerError)
	}
}

/// The error type returned by procedure handlers and by the [`Caller`](crate::Caller).
#[derive(Clone, Error)]
#[error("{message} <code='{code}'>")]
pub struct Error {
	code: ErrorCode,
	message: String,
	#[source]
	cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			cause: None,
		}
	}

	pub fn with_cause<E>(code: ErrorCode, message: impl Into<String>, cause: E) -> Self
	where
		E: StdError + Send + Sync + 'static,
	{
		Self {
			code,
			message: message.into(),
			cause: Some(Arc::new(cause)),
		}
	}

	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::BadRequest, message)
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::NotFound, message)
	}

	pub fn internal(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::InternalServerError, message)
	}

	#[must_use]
	pub const fn code(&self) -> ErrorCode {
		self.code
	}

	#[must_use]
	pub fn message(&self) -> &str {
		&self.message
	}

	#[must_use]
	pub fn to_shape(&self) -> ErrorShape {
		ErrorShape {
			code: self.code,
			message: self.message.clone(),
		}
	}
}

impl fmt::Debug for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Error")
			.field("code", &self.code)
			.field("message", &self.message)
			.field("cause", &self.cause.as_ref().map(ToString::to_string))
			.finish()
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Self::with_cause(
			ErrorCode::InternalServerError,
			"failed to serialize procedure output",
			e,
		)
	}
}

impl From<NotFound> for Error {
	fn from(e: NotFound) -> Self {
		Self::new(ErrorCode::NotFound, e.to_string())
	}
}

/// `{ code, message }` as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorShape {
	pub code: ErrorCode,
	pub message: String,
}

impl From<ErrorShape> for Error {
	fn from(ErrorShape { code, message }: ErrorShape) -> Self {
		Self::new(code, message)
	}
}

/// Returned by [`Registry::resolve`](crate::Registry::resolve) when a path does not lead to a
/// procedure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no procedure found at path '{path}' <missing_segment='{segment}'>")]
pub struct NotFound {
	pub path: String,
	pub segment: String,
}

/// Registration failures, reported once by
/// [`RegistryBuilder::build`](crate::RegistryBuilder::build).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
	#[error("procedure name must be a non empty segment without dots: '{0}'")]
	InvalidName(String),
	#[error("duplicate procedure registered at '{0}'")]
	Duplicate(String),
	#[error("'{0}' is registered both as a namespace and as a procedure")]
	Collision(String),
}
