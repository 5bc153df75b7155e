//! Error types for Avatar Assist.

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Token-exchange errors. Any of these aborts the current bootstrap attempt;
/// the caller decides whether to retry the whole bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Client credentials are empty")]
    EmptyCredentials,

    #[error("Token request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Token endpoint returned {status}: {body}")]
    BadStatus { status: u16, body: String },

    /// The response parsed but carried no usable token in either of the
    /// known locations. Carries the raw body for diagnostics.
    #[error("No token in auth response: {body}")]
    TokenMissing { body: String },
}

/// Knowledge-base resolution errors. Recoverable by default: the bootstrap
/// proceeds without a knowledge id unless strict mode is configured.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("Knowledge creation request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Knowledge endpoint returned {status}: {body}")]
    BadStatus { status: u16, body: String },

    /// The service answered with a non-success application code.
    #[error("Knowledge creation rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("No knowledge id in creation response: {body}")]
    IdMissing { body: String },
}

/// Durable cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed cache file {path}: {message}")]
    Malformed { path: String, message: String },
}

/// Streaming session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session start failed: {reason}")]
    StartFailed { reason: String },

    #[error("Session stop failed: {reason}")]
    StopFailed { reason: String },

    /// Message forwarding failed after the session was already streaming.
    /// Non-fatal: logged by the controller, never surfaced to the state
    /// machine.
    #[error("Message send failed: {reason}")]
    SendFailed { reason: String },

    #[error("No streaming session is active")]
    NotStreaming,
}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;
