//! Unified error handling for the session tracker.
//!
//! Only `start_tracking` hands an error back to its caller. Everything that
//! goes wrong on the asynchronous position stream is recorded in the
//! tracker snapshot instead, so a single bad fix never tears the stream down.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for tracker operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum TrackerError {
    /// Location capability was refused by the platform
    #[error("Permission to access location was denied. Enable location access in your device settings to track distance.")]
    PermissionDenied,
    /// Platform location service failed after (or while) subscribing
    #[error("Location service unavailable: {message}")]
    SourceUnavailable { message: String },
    /// Fix with non-finite or out-of-range coordinates
    #[error("Invalid position sample ({latitude}, {longitude})")]
    InvalidSample { latitude: f64, longitude: f64 },
    /// Session already stopped; reset the tracker before starting again
    #[error("Session has ended; reset the tracker to start a new one")]
    SessionEnded,
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Payload-free classification of a [`TrackerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    PermissionDenied,
    SourceUnavailable,
    InvalidSample,
    SessionEnded,
    Config,
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::PermissionDenied => ErrorKind::PermissionDenied,
            TrackerError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            TrackerError::InvalidSample { .. } => ErrorKind::InvalidSample,
            TrackerError::SessionEnded => ErrorKind::SessionEnded,
            TrackerError::Config { .. } => ErrorKind::Config,
        }
    }

    pub(crate) fn source_unavailable(message: impl Into<String>) -> Self {
        TrackerError::SourceUnavailable {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        TrackerError::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
