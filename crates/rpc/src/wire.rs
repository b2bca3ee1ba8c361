//! Messages exchanged with a window over a multiplexed channel.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
	error::{Error, ErrorShape, Result},
	procedure::ProcedureKind,
};

/// Client chosen subscription id, unique process wide while the subscription lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SubscriptionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SubscriptionId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for SubscriptionId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
	/// Only used to correlate the response.
	pub id: u32,
	pub path: String,
	pub kind: ProcedureKind,
	#[serde(default)]
	pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOpenRequest {
	pub id: SubscriptionId,
	pub path: String,
	#[serde(default)]
	pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
	pub id: SubscriptionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum ClientMessage {
	Request(RequestEnvelope),
	Subscribe(SubscriptionOpenRequest),
	Unsubscribe(UnsubscribeRequest),
}

/// Either the data of a successful call or its error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEnvelope {
	Result { data: Value },
	Error(ErrorShape),
}

impl From<Result<Value>> for ResponseEnvelope {
	fn from(result: Result<Value>) -> Self {
		match result {
			Ok(data) => Self::Result { data },
			Err(e) => Self::Error(e.to_shape()),
		}
	}
}

impl ResponseEnvelope {
	pub fn into_result(self) -> Result<Value> {
		match self {
			Self::Result { data } => Ok(data),
			Self::Error(shape) => Err(Error::from(shape)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum PushMessage {
	Data(Value),
	Error(ErrorShape),
	Complete,
}

impl PushMessage {
	#[must_use]
	pub const fn is_terminal(&self) -> bool {
		!matches!(self, Self::Data(_))
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum ServerMessage {
	Response {
		id: u32,
		body: ResponseEnvelope,
	},
	Push {
		id: SubscriptionId,
		message: PushMessage,
	},
}
