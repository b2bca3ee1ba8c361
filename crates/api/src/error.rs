use std::io;

use sr_rpc::ErrorCode;
use thiserror::Error;

/// Failures of the media host and its collaborators.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("no media at '{0}'")]
	MediaNotFound(String),
	#[error("tag name can't be empty")]
	EmptyTag,
	#[error("invalid settings key: '{0}'")]
	InvalidSettingsKey(String),
	#[error("library storage is unavailable: {0}")]
	Unavailable(String),

	#[error(transparent)]
	Io(#[from] io::Error),
	#[error(transparent)]
	Serialization(#[from] serde_json::Error),
}

impl From<ApiError> for sr_rpc::Error {
	fn from(e: ApiError) -> Self {
		match e {
			ApiError::MediaNotFound(_) => Self::new(ErrorCode::NotFound, e.to_string()),
			ApiError::EmptyTag | ApiError::InvalidSettingsKey(_) => {
				Self::new(ErrorCode::BadRequest, e.to_string())
			}
			ApiError::Unavailable(_) | ApiError::Io(_) | ApiError::Serialization(_) => {
				Self::with_cause(ErrorCode::InternalServerError, e.to_string(), e)
			}
		}
	}
}
