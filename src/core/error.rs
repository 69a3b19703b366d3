//! Error and outcome types
//!
//! Two families are kept apart on purpose:
//!
//! - [`ProfilerError`] for operations that touch the outside world
//!   (OS probes, config files, report files).
//! - [`AnalysisOutcome`] for the expected "no result" cases of the pure
//!   analyzers. These are normal outcomes, not faults.

use std::fmt;
use std::io;

/// Errors that can occur while probing, configuring or persisting.
#[derive(Debug, Clone)]
pub enum ProfilerError {
    /// OS or runtime memory introspection failed
    Probe(String),
    /// Generic I/O error
    Io(String),
    /// Configuration could not be parsed or was invalid
    Config(String),
    /// Report (de)serialization failed
    Serialization(String),
    /// Operation not supported in the current environment
    NotSupported(String),
}

impl fmt::Display for ProfilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfilerError::Probe(msg) => write!(f, "Probe failed: {}", msg),
            ProfilerError::Io(msg) => write!(f, "I/O error: {}", msg),
            ProfilerError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            ProfilerError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ProfilerError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
        }
    }
}

impl std::error::Error for ProfilerError {}

impl From<io::Error> for ProfilerError {
    fn from(err: io::Error) -> Self {
        ProfilerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ProfilerError {
    fn from(err: serde_json::Error) -> Self {
        ProfilerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ProfilerError {
    fn from(err: toml::de::Error) -> Self {
        ProfilerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ProfilerError {
    fn from(err: toml::ser::Error) -> Self {
        ProfilerError::Serialization(err.to_string())
    }
}

/// Result type alias for profiler operations.
pub type ProfilerResult<T> = Result<T, ProfilerError>;

/// Why an analysis produced no result.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Fewer samples than the analysis needs
    InsufficientData { required: usize, available: usize },
    /// GC generation counts differ between the compared snapshots
    MismatchedGenerations { first: usize, last: usize },
    /// Inputs were present but could not produce a meaningful value
    Degenerate(String),
}

impl AnalysisOutcome {
    pub(crate) fn require(required: usize, available: usize) -> AnalysisResult<()> {
        if available < required {
            Err(AnalysisOutcome::InsufficientData { required, available })
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisOutcome::InsufficientData { required, available } => write!(
                f,
                "Insufficient data: {} samples required, {} available",
                required, available
            ),
            AnalysisOutcome::MismatchedGenerations { first, last } => write!(
                f,
                "GC generation count changed from {} to {}",
                first, last
            ),
            AnalysisOutcome::Degenerate(msg) => write!(f, "Degenerate input: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisOutcome {}

/// Result type alias for analyzer operations.
pub type AnalysisResult<T> = Result<T, AnalysisOutcome>;
