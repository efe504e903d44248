//! Error types for all tenantq operations.

use thiserror::Error;

use crate::types::KeyType;

/// Top-level error type for tenantq operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether the failure is transient and the caller may retry the call.
    ///
    /// The engine itself never retries; retry budgets belong to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(StoreError::Unavailable(_)))
    }

    /// Short stable name of the error class, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Store(StoreError::Unavailable(_)) => "StoreUnavailable",
            Error::Store(StoreError::Fault(_)) => "StoreFault",
            Error::Validation(_) => "ValidationError",
            Error::Config(_) => "ConfigError",
        }
    }
}

/// Failures reported by the underlying store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Throttling or connectivity trouble. Safe to retry later.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the request. Retrying the same call will fail again.
    #[error("store fault: {0}")]
    Fault(String),
}

/// Caller errors detected before any store call is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("limit must be between {min} and {max} (got {limit})")]
    LimitOutOfRange { limit: usize, min: usize, max: usize },

    #[error("no fields provided for update")]
    EmptyUpdate,

    #[error("cannot update key attribute '{0}'")]
    KeyAttributeUpdate(String),

    #[error("missing key attribute: {0}")]
    MissingKeyAttribute(String),

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("key type mismatch for attribute '{name}': expected {expected:?}")]
    KeyTypeMismatch { name: String, expected: KeyType },

    #[error("query targets table '{requested}' but accessor wraps '{accessor}'")]
    TableMismatch { requested: String, accessor: String },

    #[error("unknown table: {0}")]
    UnknownTable(String),
}

/// Key encoding failures inside a store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("NaN is not a valid key value")]
    NaN,

    #[error("record exceeds maximum size of {max} bytes (got {actual})")]
    RecordTooLarge { max: usize, actual: usize },

    #[error("key exceeds maximum size of {max} bytes (got {actual})")]
    KeyTooLarge { max: usize, actual: usize },
}

/// Filter expression evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid filter expression: {0}")]
    InvalidExpression(String),
}

/// Update actions that cannot be applied to the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("type mismatch on '{attribute}': {message}")]
    TypeMismatch { attribute: String, message: String },
}

/// Configuration loading failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<EncodingError> for StoreError {
    fn from(err: EncodingError) -> Self {
        StoreError::Fault(err.to_string())
    }
}

/// A request the store itself rejects as malformed is a permanent fault.
impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::Fault(err.to_string())
    }
}

impl From<UpdateError> for StoreError {
    fn from(err: UpdateError) -> Self {
        StoreError::Fault(err.to_string())
    }
}

impl From<FilterError> for StoreError {
    fn from(err: FilterError) -> Self {
        StoreError::Fault(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
