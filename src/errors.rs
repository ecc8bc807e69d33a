/*!
 * Error types for the scriptreel application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions. The orchestrator
 * and retry policy only ever consult the classification methods
 * ([`AdapterError::is_retryable`], [`AdapterError::retry_after`]) to decide
 * control flow, never the adapter family itself.
 */

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The adapter family a generation call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterFamily {
    /// Text-to-speech narration
    Audio,
    /// Illustrative image generation
    Image,
    /// Background music generation
    Bgm,
    /// Stock footage search
    Stock,
}

impl fmt::Display for AdapterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Bgm => "bgm",
            Self::Stock => "stock",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur when calling a generation adapter
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The service signalled a rate limit; always retryable, optionally
    /// carrying the wait the service asked for
    #[error("{family} service rate limited: {message}")]
    RateLimited {
        /// Adapter family that was rate limited
        family: AdapterFamily,
        /// Error message from the service
        message: String,
        /// Wait suggested by the service, if it sent one
        retry_after: Option<Duration>,
    },

    /// The call did not complete within the per-call timeout; retryable
    #[error("{family} call timed out after {after:?}")]
    Timeout {
        /// Adapter family whose call timed out
        family: AdapterFamily,
        /// The timeout that expired
        after: Duration,
    },

    /// A failure that is expected to clear on retry (network error, 5xx)
    #[error("{family} transient failure: {message}")]
    Transient {
        /// Adapter family that failed
        family: AdapterFamily,
        /// Error message
        message: String,
    },

    /// A failure that retrying cannot fix (bad request, auth rejection)
    #[error("{family} permanent failure: {message}")]
    Permanent {
        /// Adapter family that failed
        family: AdapterFamily,
        /// Error message
        message: String,
    },
}

impl AdapterError {
    /// Create a transient error for a family
    pub fn transient(family: AdapterFamily, message: impl Into<String>) -> Self {
        Self::Transient { family, message: message.into() }
    }

    /// Create a permanent error for a family
    pub fn permanent(family: AdapterFamily, message: impl Into<String>) -> Self {
        Self::Permanent { family, message: message.into() }
    }

    /// Create a rate-limit error with an optional suggested wait
    pub fn rate_limited(
        family: AdapterFamily,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::RateLimited { family, message: message.into(), retry_after }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Transient { .. } => true,
            Self::Permanent { .. } => false,
        }
    }

    /// Wait suggested by the service, when it sent one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// The adapter family this error came from
    pub fn family(&self) -> AdapterFamily {
        match self {
            Self::RateLimited { family, .. }
            | Self::Timeout { family, .. }
            | Self::Transient { family, .. }
            | Self::Permanent { family, .. } => *family,
        }
    }
}

/// Configuration errors; always fatal, the run aborts before any job dispatch
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required credential is missing for an enabled stage
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// A setting has an invalid value
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// The config file could not be read or parsed
    #[error("failed to load configuration: {0}")]
    Load(String),
}

/// Parse errors; fatal for the whole run, a malformed script is rejected
/// wholesale since downstream ordering depends on a fully valid sequence
#[derive(Error, Debug)]
pub enum ParseError {
    /// A non-empty line had no recognizable speaker prefix
    #[error("line {line_no}: no recognizable speaker prefix: {content:?}")]
    UnrecognizedLine {
        /// 1-based line number in the input
        line_no: usize,
        /// The offending line text
        content: String,
    },

    /// A ruby annotation was malformed (unbalanced braces, empty part)
    #[error("line {line_no}: malformed reading annotation in {content:?}")]
    MalformedAnnotation {
        /// 1-based line number in the input
        line_no: usize,
        /// The offending line text
        content: String,
    },

    /// A prompt-block line did not match `[n] M:SS-M:SS | text`
    #[error("line {line_no}: malformed prompt block: {content:?}")]
    MalformedPromptBlock {
        /// 1-based line number in the input
        line_no: usize,
        /// The offending line text
        content: String,
    },

    /// A clock field was not a valid `M:SS` or `H:MM:SS` value
    #[error("line {line_no}: invalid clock value {value:?}")]
    InvalidClock {
        /// 1-based line number in the input
        line_no: usize,
        /// The offending clock field
        value: String,
    },

    /// A scene window had `start >= end`
    #[error("line {line_no}: scene window must satisfy start < end ({start_secs}s >= {end_secs}s)")]
    InvalidWindow {
        /// 1-based line number in the input
        line_no: usize,
        /// Parsed start offset in seconds
        start_secs: u64,
        /// Parsed end offset in seconds
        end_secs: u64,
    },

    /// Two prompt-block lines claimed the same scene index; indices drive
    /// artifact path reservation, so they must be unique
    #[error("line {line_no}: duplicate scene index {scene_index}")]
    DuplicateSceneIndex {
        /// 1-based line number of the second claim
        line_no: usize,
        /// The repeated scene index
        scene_index: usize,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Fatal configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fatal script or prompt-block parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error from a generation adapter that escaped job-level recovery
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
