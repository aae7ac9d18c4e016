//! Shared error types across flowgate crates.
//!
//! Two layers exist:
//! - [`UnitError`] is what a policy unit returns from `check`. It is either a
//!   controlled [`Abort`] or an arbitrary failure.
//! - [`FlowError`] is what crosses the boundary to the inbound adapter. Aborts
//!   pass through unchanged; everything else is translated so raw causes never
//!   leak into responses.

use std::fmt;

use thiserror::Error;

/// Boxed error used for unit failures and backend errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fixed message surfaced for any unexpected unit failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal flow error";

/// Fixed message surfaced when the caller went away mid-flow.
pub const CANCELLED_MESSAGE: &str = "Request cancelled";

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Missing or invalid credentials.
    AuthenticationFailed,
    /// Principal lacks a permission or role.
    PermissionDenied,
    /// Feature flag is off.
    FeatureDisabled,
    /// Rate limit exceeded.
    Throttled,
    /// Generic controlled abort (malformed input and friends).
    Aborted,
    /// Caller cancelled the request.
    Cancelled,
    /// Configuration could not be compiled.
    InvalidConfig,
    /// Internal server error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON responses and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::FeatureDisabled => "FEATURE_DISABLED",
            ErrorCode::Throttled => "THROTTLED",
            ErrorCode::Aborted => "ABORTED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of controlled abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortKind {
    AuthenticationFailed,
    PermissionDenied,
    FeatureDisabled,
    Throttled,
    Generic,
}

/// Controlled, expected failure carrying a status code and detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail} ({status})")]
pub struct Abort {
    kind: AbortKind,
    status: u16,
    detail: String,
    retry_after: Option<u64>,
}

impl Abort {
    /// Generic abort with a caller-chosen status (400 for malformed input).
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            kind: AbortKind::Generic,
            status,
            detail: detail.into(),
            retry_after: None,
        }
    }

    /// Generic 400 abort.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, detail)
    }

    pub fn authentication_failed() -> Self {
        Self::authentication_failed_with("Authentication failed")
    }

    pub fn authentication_failed_with(detail: impl Into<String>) -> Self {
        Self {
            kind: AbortKind::AuthenticationFailed,
            status: 401,
            detail: detail.into(),
            retry_after: None,
        }
    }

    pub fn permission_denied() -> Self {
        Self::permission_denied_with("Permission denied")
    }

    pub fn permission_denied_with(detail: impl Into<String>) -> Self {
        Self {
            kind: AbortKind::PermissionDenied,
            status: 403,
            detail: detail.into(),
            retry_after: None,
        }
    }

    pub fn feature_disabled() -> Self {
        Self::feature_disabled_with("Feature disabled")
    }

    pub fn feature_disabled_with(detail: impl Into<String>) -> Self {
        Self {
            kind: AbortKind::FeatureDisabled,
            status: 403,
            detail: detail.into(),
            retry_after: None,
        }
    }

    /// Rate limit exceeded; `retry_after` is in seconds.
    pub fn throttled(retry_after: Option<u64>) -> Self {
        Self {
            kind: AbortKind::Throttled,
            status: 429,
            detail: "Rate limit exceeded".into(),
            retry_after,
        }
    }

    pub fn kind(&self) -> AbortKind {
        self.kind
    }
    pub fn status(&self) -> u16 {
        self.status
    }
    pub fn detail(&self) -> &str {
        &self.detail
    }
    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    /// Map abort kind to a stable client-facing code.
    pub fn code(&self) -> ErrorCode {
        match self.kind {
            AbortKind::AuthenticationFailed => ErrorCode::AuthenticationFailed,
            AbortKind::PermissionDenied => ErrorCode::PermissionDenied,
            AbortKind::FeatureDisabled => ErrorCode::FeatureDisabled,
            AbortKind::Throttled => ErrorCode::Throttled,
            AbortKind::Generic => ErrorCode::Aborted,
        }
    }
}

/// Error returned by a policy unit's `check`.
#[derive(Debug, Error)]
pub enum UnitError {
    /// Controlled failure; stops the flow and reaches the boundary unchanged.
    #[error(transparent)]
    Abort(#[from] Abort),
    /// Anything else. Translated into [`FlowError::Internal`] by the engine.
    #[error("{0}")]
    Failure(BoxError),
}

impl UnitError {
    pub fn failure<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        UnitError::Failure(err.into())
    }

    pub fn as_abort(&self) -> Option<&Abort> {
        match self {
            UnitError::Abort(a) => Some(a),
            UnitError::Failure(_) => None,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Unified boundary error used by core and engine.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Aborted(#[from] Abort),
    /// Unexpected failure. Display is fixed; the cause is only reachable via
    /// `source()` / [`FlowError::cause`].
    #[error("{}", INTERNAL_ERROR_MESSAGE)]
    Internal {
        #[source]
        cause: BoxError,
    },
    #[error("{}", CANCELLED_MESSAGE)]
    Cancelled,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl FlowError {
    pub fn internal<E>(cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        FlowError::Internal {
            cause: cause.into(),
        }
    }

    /// Map internal error to a stable client-facing code.
    pub fn code(&self) -> ErrorCode {
        match self {
            FlowError::Aborted(a) => a.code(),
            FlowError::Internal { .. } => ErrorCode::Internal,
            FlowError::Cancelled => ErrorCode::Cancelled,
            FlowError::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }

    /// HTTP-equivalent status for the boundary response.
    pub fn status(&self) -> u16 {
        match self {
            FlowError::Aborted(a) => a.status(),
            FlowError::Internal { .. } | FlowError::InvalidConfig(_) => 500,
            FlowError::Cancelled => 499,
        }
    }

    /// Message safe to show to clients.
    pub fn detail(&self) -> &str {
        match self {
            FlowError::Aborted(a) => a.detail(),
            FlowError::Internal { .. } | FlowError::InvalidConfig(_) => INTERNAL_ERROR_MESSAGE,
            FlowError::Cancelled => CANCELLED_MESSAGE,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            FlowError::Aborted(a) => a.retry_after(),
            _ => None,
        }
    }

    pub fn as_abort(&self) -> Option<&Abort> {
        match self {
            FlowError::Aborted(a) => Some(a),
            _ => None,
        }
    }

    /// Original cause of an internal error, for diagnostics only.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            FlowError::Internal { cause } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<UnitError> for FlowError {
    fn from(e: UnitError) -> Self {
        match e {
            UnitError::Abort(a) => FlowError::Aborted(a),
            UnitError::Failure(cause) => FlowError::Internal { cause },
        }
    }
}
