use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::studio::StudioError;

/// Stable error codes exposed on the wire. Clients match on these strings,
/// so variants must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParameter,
    InvalidRange,
    InvalidParameterIndex,
    MissingRequiredParameter,
    TrackNotFound,
    TrackNotSelected,
    DeviceNotFound,
    DeviceNotSelected,
    SceneNotFound,
    SceneNotSelected,
    ClipNotFound,
    IndexOutOfBounds,
    ExternalApiError,
    OperationFailed,
    InternalError,
}

/// Coarse grouping of error codes. The HTTP layer maps families to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorFamily {
    InvalidParameter,
    InvalidRange,
    NotFound,
    IndexOutOfBounds,
    ExternalApi,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::InvalidRange => "INVALID_RANGE",
            Self::InvalidParameterIndex => "INVALID_PARAMETER_INDEX",
            Self::MissingRequiredParameter => "MISSING_REQUIRED_PARAMETER",
            Self::TrackNotFound => "TRACK_NOT_FOUND",
            Self::TrackNotSelected => "TRACK_NOT_SELECTED",
            Self::DeviceNotFound => "DEVICE_NOT_FOUND",
            Self::DeviceNotSelected => "DEVICE_NOT_SELECTED",
            Self::SceneNotFound => "SCENE_NOT_FOUND",
            Self::SceneNotSelected => "SCENE_NOT_SELECTED",
            Self::ClipNotFound => "CLIP_NOT_FOUND",
            Self::IndexOutOfBounds => "INDEX_OUT_OF_BOUNDS",
            Self::ExternalApiError => "EXTERNAL_API_ERROR",
            Self::OperationFailed => "OPERATION_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn family(self) -> ErrorFamily {
        match self {
            Self::InvalidParameter | Self::MissingRequiredParameter => {
                ErrorFamily::InvalidParameter
            }
            Self::InvalidRange | Self::InvalidParameterIndex => ErrorFamily::InvalidRange,
            Self::TrackNotFound
            | Self::TrackNotSelected
            | Self::DeviceNotFound
            | Self::DeviceNotSelected
            | Self::SceneNotFound
            | Self::SceneNotSelected
            | Self::ClipNotFound => ErrorFamily::NotFound,
            Self::IndexOutOfBounds => ErrorFamily::IndexOutOfBounds,
            Self::ExternalApiError | Self::OperationFailed => ErrorFamily::ExternalApi,
            Self::InternalError => ErrorFamily::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed command failure: what went wrong, in words, and which operation
/// produced it. Every handler, resolver and batch item reports through this.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{code}: {message}")]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
    pub operation: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            operation: String::new(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParameter, message)
    }

    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRange, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalApiError, message)
    }

    /// Internal failures never carry raw filesystem paths to the wire.
    pub fn internal(message: impl AsRef<str>) -> Self {
        Self::new(ErrorCode::InternalError, sanitize_message(message.as_ref()))
    }

    /// Set the operation name, replacing any existing one.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Set the operation name only if none was recorded yet.
    pub fn in_operation(mut self, operation: &str) -> Self {
        if self.operation.is_empty() {
            self.operation = operation.to_string();
        }
        self
    }

    pub fn family(&self) -> ErrorFamily {
        self.code.family()
    }
}

impl From<StudioError> for CommandError {
    fn from(e: StudioError) -> Self {
        CommandError::external(e.to_string())
    }
}

/// Extract a readable message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Replace anything that looks like an absolute filesystem path with a
/// placeholder.
pub fn sanitize_message(raw: &str) -> String {
    raw.split(' ')
        .map(|word| {
            let trimmed = word.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '(' | ')' | ',' | ':'));
            if looks_like_path(trimmed) {
                word.replace(trimmed, "<path>")
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_path(word: &str) -> bool {
    let unix = word.starts_with('/') && word.get(1..).is_some_and(|rest| rest.contains('/'));
    let bytes = word.as_bytes();
    let windows = bytes.len() > 3
        && bytes.first().is_some_and(u8::is_ascii_alphabetic)
        && bytes.get(1) == Some(&b':')
        && bytes.get(2) == Some(&b'\\');
    unix || windows
}
