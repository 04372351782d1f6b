//! pipectl error abstractions.

use std::time::Duration;

use thiserror::Error;

use crate::client::RemoteError;
use crate::model::{JobError, ParameterType, MAX_BITRATE_KBPS, MIN_BITRATE_KBPS};

/// A result type where the error is an `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error variants.
///
/// Validation variants are always produced client-side and are returned before any remote call
/// is issued. `Remote` wraps failures surfaced by the control plane verbatim.
#[derive(Debug, Error)]
pub enum AppError {
    /// The topology is structurally invalid; holds every violation found.
    #[error("invalid topology: {}", .0.join("; "))]
    InvalidTopology(Vec<String>),
    /// Definitions were given for parameters which the topology does not declare.
    #[error("parameters are not declared by the topology: {}", .0.join(", "))]
    UnknownParameter(Vec<String>),
    /// The same parameter was bound more than once.
    #[error("parameter `{0}` is bound more than once")]
    DuplicateParameter(String),
    /// A bound value does not conform to its declared type.
    #[error("value of parameter `{name}` does not conform to its declared type `{expected}`")]
    TypeMismatch { name: String, expected: ParameterType },
    /// Declared parameters without a default were left unbound.
    #[error("required parameters are not bound: {}", .0.join(", "))]
    UnboundRequired(Vec<String>),
    /// The requested live pipeline bitrate is outside of the allowed range.
    #[error("bitrate of {0} kbps is outside of the allowed range of {}..={} kbps", MIN_BITRATE_KBPS, MAX_BITRATE_KBPS)]
    InvalidBitrate(u32),
    /// A job time range is malformed or inverted.
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),
    /// The remote resource is in a state which does not permit the requested operation.
    #[error("{kind} `{name}` is {state}, which does not permit {operation}")]
    InvalidState {
        kind: &'static str,
        name: String,
        state: String,
        operation: &'static str,
    },
    /// The target live pipeline does not exist.
    #[error("live pipeline `{0}` does not exist")]
    PipelineNotFound(String),
    /// The target pipeline job does not exist, and its grace period has elapsed.
    #[error("pipeline job `{0}` does not exist")]
    JobNotFound(String),
    /// The control plane returned an error.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// A client-side deadline elapsed while waiting on remote state.
    #[error("timed out after {after:?} waiting for {waiting_for}")]
    Timeout { waiting_for: String, after: Duration },
    /// A pipeline job terminated with a failure.
    #[error("pipeline job `{name}` failed: {detail}")]
    JobFailed { name: String, detail: JobError },
    /// The run was interrupted by a shutdown signal.
    #[error("run cancelled by shutdown signal")]
    Cancelled,
}
