//! Error types for the field server.

use thiserror::Error;

/// Result type alias using FieldError.
pub type FieldResult<T> = Result<T, FieldError>;

/// Primary error type for field reads and derivations.
///
/// Every variant carries the field, URL and/or time needed to diagnose the
/// failure without re-running the request with verbose logging.
#[derive(Debug, Clone, Error)]
pub enum FieldError {
    // === Request Errors ===
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Derived field '{derived}': time-offset differencing needs a time-based search, request used explicit path '{path}'")]
    UnsupportedTimeSearchMode { derived: String, path: String },

    #[error("Derived field '{derived}': unknown derivation function '{function}'")]
    UnknownDerivedFunction { derived: String, function: String },

    // === Data Errors ===
    #[error("No data found: {0}")]
    NotFound(String),

    #[error("Failed to read data: {0}")]
    ReadFailed(String),

    #[error("Source unavailable: {url}: {message}")]
    SourceUnavailable { url: String, message: String },

    #[error("Derived field '{derived}': missing base field(s) {missing:?}")]
    MissingBaseField { derived: String, missing: Vec<String> },

    #[error("Derived field '{derived}': geometry of '{field1}' does not match '{field2}'")]
    GeometryMismatch {
        derived: String,
        field1: String,
        field2: String,
    },

    #[error("Derived field '{derived}': cannot read '{field}' from {url} at {time}: {message}")]
    SecondaryReadFailure {
        derived: String,
        field: String,
        url: String,
        time: String,
        message: String,
    },

    #[error("Field '{field}': sample count {actual} does not match header dimensions ({expected} expected)")]
    SampleCountMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    // === Routing / Assembly Errors ===
    #[error("All {attempted} candidate source(s) failed, last error: {last}")]
    AllSourcesExhausted {
        attempted: usize,
        last: Box<FieldError>,
    },

    #[error("Time-height profile at {path}: field '{field}' has nz={actual}, expected nz={expected}")]
    InconsistentProfileShape {
        path: String,
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Time-height read failed at {time} ({path}): {message}")]
    ProfileReadFailure {
        time: String,
        path: String,
        message: String,
    },

    /// Measured RHI could not be used; always recovered by falling back to a
    /// reconstructed cross-section.
    #[error("Measured RHI not available: {0}")]
    RhiNotAvailable(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl FieldError {
    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an InvalidRequest error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a SourceUnavailable error.
    pub fn source_unavailable(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// True when the archive itself could not be reached, as opposed to the
    /// requested data simply not being there.
    pub fn is_source_unreachable(&self) -> bool {
        match self {
            FieldError::SourceUnavailable { .. } => true,
            FieldError::AllSourcesExhausted { last, .. } => last.is_source_unreachable(),
            _ => false,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            FieldError::InvalidRequest(_) | FieldError::UnsupportedTimeSearchMode { .. } => 400,

            FieldError::NotFound(_) | FieldError::MissingBaseField { .. } => 404,

            FieldError::SourceUnavailable { .. } => 503,
            FieldError::AllSourcesExhausted { last, .. } => last.http_status_code(),

            _ => 500,
        }
    }
}

impl From<std::io::Error> for FieldError {
    fn from(err: std::io::Error) -> Self {
        FieldError::ReadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for FieldError {
    fn from(err: serde_json::Error) -> Self {
        FieldError::ReadFailed(format!("JSON error: {}", err))
    }
}
