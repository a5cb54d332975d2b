//! The wire shape every command answers with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CommandError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: ErrorCode,
    pub message: String,
    pub operation: String,
}

impl From<CommandError> for WireError {
    fn from(e: CommandError) -> Self {
        Self {
            code: e.code,
            message: e.message,
            operation: e.operation,
        }
    }
}

/// `{ status, data?, error? }`. Exactly one of `data` / `error` is present and
/// `status` says which. Fields are private so that invariant cannot be broken
/// after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<WireError>,
}

impl WireResponse {
    pub fn success(data: Value) -> Self {
        Self {
            status: Status::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: CommandError) -> Self {
        Self {
            status: Status::Error,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&WireError> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn into_result(self) -> Result<Value, WireError> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Wrap a command outcome for the wire.
pub fn wrap(outcome: Result<Value, CommandError>) -> WireResponse {
    match outcome {
        Ok(data) => WireResponse::success(data),
        Err(e) => WireResponse::failure(e),
    }
}
