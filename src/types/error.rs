//! Error types for the Visa gift card balance checker
//!
//! This module defines all error types that can occur while validating cards,
//! talking to the card service, and parsing its pages.
//! Errors are designed to be descriptive and user-friendly for CLI output:
//! the `Display` form of a card-level error is exactly the reason written to
//! the output file after `ERROR: `.
//!
//! # Error Categories
//!
//! - **Validation Errors**: Card number, expiry, cvv or postal code rejected locally
//! - **Network Errors**: Transport failure, timeout, DNS, TLS
//! - **Authentication Failures**: Login step rejected by the service
//! - **Parse Errors**: Malformed markup or unparseable monetary text
//! - **Record Not Found**: The service answered but knows no such card
//! - **File I/O Errors**: Input or output file problems (process-level)

use thiserror::Error;

/// Reasons a card row is rejected before any network call
///
/// Checks run in declaration order and stop at the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Card number is not exactly 16 digits
    #[error("invalid card number")]
    InvalidCardNumber,

    /// Card number does not start with `4`
    #[error("not a VISA gift card")]
    NotVisaGiftCard,

    /// Month is not a number in 1..=12 (reported zero-padded)
    #[error("invalid month {month}")]
    InvalidExpirationMonth {
        /// The month as given, after zero-padding
        month: String,
    },

    /// Year is not a number in 16..=99
    #[error("invalid year {year}")]
    InvalidExpirationYear {
        /// The year as given
        year: String,
    },

    /// CVV is not a number in 0..=999
    #[error("invalid cvv {cvv}")]
    InvalidCvv {
        /// The cvv as given
        cvv: String,
    },

    /// Postal code is not exactly 5 characters
    #[error("invalid postal {postal}")]
    InvalidPostalCode {
        /// The postal code as given
        postal: String,
    },

    /// PIN is not exactly four digits
    #[error("invalid pin")]
    InvalidPin,
}

/// Main error type for the balance checker
///
/// Card-level variants are stored on the owning `CardRecord` and reported in
/// the output; process-level variants (`FileNotFound`, `Io`, `Csv`, `Runtime`)
/// abort the run before any output is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckerError {
    /// Card failed local validation
    ///
    /// Terminal for the card. No request is ever sent for it.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport-level failure talking to the card service
    ///
    /// Terminal for this attempt; not retried.
    #[error("network error: {message}")]
    Network {
        /// Description of the transport failure
        message: String,
    },

    /// The service rejected the login step of a two-step flow
    ///
    /// Signalled by the absence of a redirect after the login POST, or by
    /// the missing hidden card token on the login page.
    #[error("authentication failed: {reason}")]
    AuthenticationFailure {
        /// Why the login was considered rejected
        reason: String,
    },

    /// The response page could not be parsed
    #[error("parse error: {message}")]
    Parse {
        /// Description of the parse failure
        message: String,
    },

    /// The page parsed but carried no balance fields
    #[error("card not found")]
    RecordNotFound,

    /// Input file not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// CSV reading or writing error
    #[error("CSV error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Csv {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the CSV error
        message: String,
    },

    /// The async runtime could not be started or a task could not be joined
    #[error("runtime error: {message}")]
    Runtime {
        /// Description of the runtime failure
        message: String,
    },
}

// Conversion from io::Error to CheckerError
impl From<std::io::Error> for CheckerError {
    fn from(error: std::io::Error) -> Self {
        CheckerError::Io {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to CheckerError
impl From<csv::Error> for CheckerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        CheckerError::Csv {
            line,
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for CheckerError {
    fn from(error: csv_async::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        CheckerError::Csv {
            line,
            message: error.to_string(),
        }
    }
}

// Every reqwest failure is a transport problem from the card's point of view
impl From<reqwest::Error> for CheckerError {
    fn from(error: reqwest::Error) -> Self {
        CheckerError::Network {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl CheckerError {
    /// Create a Network error
    pub fn network(message: impl Into<String>) -> Self {
        CheckerError::Network {
            message: message.into(),
        }
    }

    /// Create an AuthenticationFailure error
    pub fn authentication_failure(reason: impl Into<String>) -> Self {
        CheckerError::AuthenticationFailure {
            reason: reason.into(),
        }
    }

    /// Create a Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        CheckerError::Parse {
            message: message.into(),
        }
    }

    /// Create a FileNotFound error
    pub fn file_not_found(path: impl Into<String>) -> Self {
        CheckerError::FileNotFound { path: path.into() }
    }

    /// Create a Runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        CheckerError::Runtime {
            message: message.into(),
        }
    }
}
