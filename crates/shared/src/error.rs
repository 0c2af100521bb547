use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str = "network error";
pub const DEFAULT_SUCCESS_MESSAGE: &str = "operation succeeded";
pub const DEFAULT_FAILURE_MESSAGE: &str = "operation failed";

/// Why a request did not succeed, by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    /// No response was received.
    Network,
    AuthExpired,
    Forbidden,
    NotFound,
    BadRequest,
    Server(u16),
    Http(u16),
    /// 2xx transport with a non-zero envelope code.
    Business(i64),
    /// 2xx transport whose body is not a decodable envelope.
    Malformed,
}

impl FailureKind {
    /// Maps a non-2xx status onto the taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::AuthExpired,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500..=599 => Self::Server(status),
            other => Self::Http(other),
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Network => NETWORK_ERROR_MESSAGE,
            Self::AuthExpired => "session expired, please sign in again",
            Self::Forbidden => "permission denied",
            Self::NotFound => "resource not found",
            Self::BadRequest => "invalid request parameters",
            Self::Server(_) => "server error, please retry later",
            Self::Http(_) => "request failed, please retry later",
            Self::Business(_) => DEFAULT_FAILURE_MESSAGE,
            Self::Malformed => "malformed response from server",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthExpired => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::BadRequest => Some(400),
            Self::Server(status) | Self::Http(status) => Some(*status),
            Self::Network | Self::Business(_) | Self::Malformed => None,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }
}

/// A classified failure with the message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Uses `message` when non-blank, otherwise the kind's default.
    pub fn with_fallback(kind: FailureKind, message: Option<&str>) -> Self {
        match message.map(str::trim).filter(|m| !m.is_empty()) {
            Some(message) => Self::new(kind, message),
            None => Self::new(kind, kind.default_message()),
        }
    }
}
