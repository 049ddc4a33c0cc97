//! Core error types for meeting-reminder-core.
//!
//! One thiserror enum per concern; each API returns the narrowest one. Only
//! [`ConfigError`] is fatal; everything the scheduler meets while running
//! is logged and absorbed at the poll-step boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// No usable home/config directory
    #[error("Cannot determine configuration directory")]
    NoConfigDir,
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Authorization failed
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Callback timeout
    #[error("OAuth callback timeout: no callback received within {timeout_secs} seconds")]
    CallbackTimeout { timeout_secs: u64 },

    /// Invalid callback
    #[error("Invalid OAuth callback: {0}")]
    InvalidCallback(String),

    /// Access token expired
    #[error("Access token expired and no refresh token available")]
    TokenExpired,

    /// Not authenticated
    #[error("Not authenticated with {service}")]
    NotAuthenticated { service: String },

    /// Credentials not configured
    #[error("OAuth credentials not configured for {service}")]
    CredentialsNotConfigured { service: String },

    /// Token or credential storage failed
    #[error("Credential storage error: {0}")]
    Storage(String),

    /// Transport failure while talking to the token endpoint
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors returned by an event source query. All of them are transient
/// from the scheduler's point of view.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The calendar backend could not be reached
    #[error("Calendar unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The calendar backend answered with an error payload
    #[error("Calendar API error: {0}")]
    Api(String),

    /// The response body did not have the expected shape
    #[error("Unexpected calendar response: {0}")]
    InvalidResponse(String),

    /// No usable access token
    #[error("Authentication failed: {0}")]
    Auth(#[from] OAuthError),
}

/// Alert device faults.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Writing an output pin failed
    #[error("Failed to set pin {pin}: {source}")]
    Output {
        pin: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading an input pin failed
    #[error("Failed to read pin {pin}: {source}")]
    Input {
        pin: String,
        #[source]
        source: std::io::Error,
    },

    /// A pin value could not be interpreted
    #[error("Invalid value {value:?} on pin {pin}")]
    InvalidValue { pin: String, value: String },

    /// The device could not be opened
    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) is before start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Missing or unparseable timestamp on a calendar entry
    #[error("Malformed event '{id}': {message}")]
    MalformedEvent { id: String, message: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<tokio::time::error::Elapsed> for OAuthError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        OAuthError::CallbackTimeout { timeout_secs: 300 }
    }
}

impl From<keyring::Error> for OAuthError {
    fn from(err: keyring::Error) -> Self {
        OAuthError::Storage(err.to_string())
    }
}
