//! Error types for the Autarco monitor.
//!
//! Failures are split by where they happen: talking to the inverter
//! ([`FetchError`]), reading its reply ([`ParseError`]), running an update
//! cycle ([`UpdateError`]) and loading configuration ([`ConfigError`]).

use crate::config::ISSUE_URL;
use thiserror::Error;

/// Errors raised while requesting data from the inverter.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The inverter did not answer within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The inverter rejected the configured credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The inverter answered with a non-success HTTP status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Connection or transfer failure.
    #[error("HTTP request failed")]
    Transport(#[source] reqwest::Error),

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Returns true for the expected, quietly retried failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err)
        }
    }
}

/// Errors raised while decoding an inverter reply.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// A numeric field held text that is not a finite number.
    #[error("field {field} is not a valid number: {value:?}")]
    InvalidNumber {
        /// Zero-based field position.
        field: usize,
        /// The raw field text.
        value: String,
    },
}

/// Failures that abort an update cycle and surface as the error marker.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UpdateError {
    #[error("could not parse inverter reply")]
    Parse(#[from] ParseError),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no inverter host configured")]
    MissingHost,

    #[error("invalid poll interval: {0}")]
    InvalidInterval(String),

    #[error("invalid request timeout: {0}")]
    InvalidTimeout(String),

    #[error("invalid configuration entry")]
    InvalidEntry(#[from] serde_json::Error),
}

/// Logs an unexpected failure with its full cause chain so it can be pasted
/// into a bug report.
pub fn report_error(context: &str, err: &dyn std::error::Error) {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str("\n  caused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    tracing::error!(
        issue_url = ISSUE_URL,
        "Autarco integration error while {context}, please open a ticket and include:\n{chain}"
    );
}
