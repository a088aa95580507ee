//! Error types for the ipsync system
//!
//! Two families of errors live here:
//! - [`ResolveError`]: why a single public-IP probe failed. These are
//!   captured per address family inside a [`ProbeSet`](crate::probe::ProbeSet)
//!   and never escalate past the probe aggregator.
//! - [`Error`]: everything else (zone validation, provider calls, config).

use thiserror::Error;

/// Result type alias for ipsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure cause of one public-IP resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No response arrived within the timeout, after all retries
    #[error("resolution timed out after {attempts} attempt(s)")]
    Timeout {
        /// Number of queries sent
        attempts: u32,
    },

    /// The resolver answered, but with no usable address record
    #[error("resolver returned no usable answer: {0}")]
    InvalidAnswer(String),

    /// The returned value is not a strict IP literal of the requested family
    #[error("resolver returned an invalid address: {0}")]
    ValidationFailed(String),

    /// The query was cancelled before it settled
    #[error("resolution cancelled")]
    Cancelled,

    /// The socket could not be set up (bind or connect)
    #[error("transport error: {0}")]
    Transport(String),
}

impl ResolveError {
    /// Create a transport error from any displayable cause
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }
}

/// Core error type for the ipsync system
#[derive(Error, Debug)]
pub enum Error {
    /// Configured zones are missing on the provider side
    #[error("Couldn't find the following zones on the provider: [{}]", zones.join(", "))]
    ZoneNotFound {
        /// Every local zone name absent from the provider's zone list
        zones: Vec<String>,
    },

    /// A call to the authoritative-zone provider failed
    #[error("Provider call failed ({provider}): {message}")]
    ProviderCallFailed {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found on the provider
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider call error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderCallFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a zone-not-found error for the given zone names
    pub fn zone_not_found(zones: Vec<String>) -> Self {
        Self::ZoneNotFound { zones }
    }

    /// Whether this error must stop the scheduler loop
    ///
    /// Only a zone-validation failure is fatal: retrying cannot fix a zone
    /// that does not exist on the provider.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ZoneNotFound { .. })
    }
}
