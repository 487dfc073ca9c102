//! Error types for r-account.
//!
//! [`RAccountError`] is what every [`crate::RSessionManager`] operation returns. The
//! collaborator errors ([`StoreError`], [`CacheError`], [`TokenError`]) stay small and
//! are folded into it by the manager according to the propagation policy:
//! store failures abort the operation, cache failures never do.
//!
//! ## 日本語
//!
//! r-account のエラー型です。
//!
//! [`RAccountError`] は [`crate::RSessionManager`] の全操作が返すエラーです。
//! ストア障害は操作を中断し、キャッシュ障害は決して操作を失敗させません。

/// Coarse classification of [`RAccountError`], used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input.
    Validation,
    /// The email is already taken.
    Conflict,
    /// Authentication failed. Deliberately uninformative about which check failed.
    Unauthenticated,
    /// Authenticated, but the role lacks the permission.
    Forbidden,
    /// The record is absent.
    NotFound,
    /// The authoritative store is unavailable or inconsistent.
    Persistence,
    /// A broken primitive (hashing, signing).
    Internal,
}

impl ErrorKind {
    /// Stable snake_case code used in error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors returned by [`crate::RSessionManager`].
///
/// ## 日本語
///
/// [`crate::RSessionManager`] が返すエラーの集合です。
#[derive(Debug, thiserror::Error)]
pub enum RAccountError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("email is used by another account")]
    EmailConflict,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("permission denied")]
    Forbidden,

    #[error("user not found")]
    NotFound,

    #[error("persistence error: {0}")]
    Persistence(#[source] StoreError),

    /// Password hash generation failed. Signals a broken primitive.
    #[error("password hashing failure: {0}")]
    HashFailure(String),

    /// Access token signing failed.
    #[error("access token could not be signed")]
    TokenSigning(#[source] TokenError),
}

impl RAccountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RAccountError::Validation(_) => ErrorKind::Validation,
            RAccountError::EmailAlreadyExists | RAccountError::EmailConflict => ErrorKind::Conflict,
            RAccountError::Unauthenticated
            | RAccountError::InvalidCredentials
            | RAccountError::IncorrectPassword => ErrorKind::Unauthenticated,
            RAccountError::Forbidden => ErrorKind::Forbidden,
            RAccountError::NotFound => ErrorKind::NotFound,
            RAccountError::Persistence(_) => ErrorKind::Persistence,
            RAccountError::HashFailure(_) | RAccountError::TokenSigning(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error.
    ///
    /// Client errors map to 4xx; persistence and primitive failures map to 500.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Persistence | ErrorKind::Internal => 500,
        }
    }

    /// Message safe to show to a client. Server-side detail is withheld.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Persistence | ErrorKind::Internal => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// ## 日本語
///
/// HTTP アダプタが返す JSON エラーボディです。
///
/// ## English
///
/// JSON error body written by the HTTP adapters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&RAccountError> for ErrorBody {
    fn from(err: &RAccountError) -> Self {
        Self {
            error: err.kind().as_str().to_string(),
            message: err.public_message(),
        }
    }
}

/// Errors reported by a [`crate::RecordStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate email")]
    DuplicateEmail,

    #[error("record not found")]
    NotFound,

    /// The internal lock of an in-process store has been poisoned.
    #[error("record store lock poisoned")]
    Poisoned,

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record store deadline exceeded")]
    Timeout,
}

/// Errors reported by a [`crate::SessionCache`].
///
/// Every variant is advisory from the manager's point of view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The internal lock of an in-process cache has been poisoned.
    #[error("session cache lock poisoned")]
    Poisoned,

    #[error("session cache backend error: {0}")]
    Backend(String),

    /// A key holds a value of the wrong shape (e.g. a set where a string was expected).
    #[error("unexpected value at key {0}")]
    WrongType(String),

    #[error("session cache deadline exceeded")]
    Timeout,
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Errors returned by [`crate::RTokenCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    /// Returned by [`crate::RTokenCodec::issue`] only.
    #[error("token signing failed")]
    Signing,
}

/// Errors raised while building configuration or primitives at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("signing secret must not be empty")]
    EmptySecret,
}
