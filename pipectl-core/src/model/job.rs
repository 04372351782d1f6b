//! Pipeline job model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::model::ParameterDefinition;

/// A one-shot execution of a batch topology over a bounded range of input.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineJob {
    /// The name of this job, unique within an account.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The name of the topology this job instantiates.
    pub topology_name: String,
    /// The parameter bindings of this job.
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// The state of this job as last observed from the control plane.
    #[serde(default)]
    pub state: PipelineJobState,
    /// Details of the failure when `state` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl PipelineJob {
    /// Create a new job definition.
    pub fn new(name: impl Into<String>, topology_name: impl Into<String>, parameters: Vec<ParameterDefinition>) -> Self {
        Self {
            name: name.into(),
            description: None,
            topology_name: topology_name.into(),
            parameters,
            state: PipelineJobState::Processing,
            error: None,
        }
    }

    /// Get the bound value of the given parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.iter().find(|def| def.name == name).map(|def| def.value.as_str())
    }
}

/// The state of a pipeline job.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum PipelineJobState {
    Processing,
    Completed,
    Failed,
    #[serde(alias = "Canceled")]
    Cancelled,
}

impl PipelineJobState {
    /// Check if this state is terminal. Terminal jobs may only be deleted.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl Default for PipelineJobState {
    fn default() -> Self {
        Self::Processing
    }
}

impl std::fmt::Display for PipelineJobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Processing => "Processing",
                Self::Completed => "Completed",
                Self::Failed => "Failed",
                Self::Cancelled => "Cancelled",
            }
        )
    }
}

/// Details of a pipeline job failure, reported verbatim from the control plane.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct JobError {
    pub code: String,
    pub message: String,
}

impl JobError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// An absolute range of time, where `start` is strictly before `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new instance, rejecting empty & inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(AppError::InvalidTimeRange(format!("start {} must be before end {}", start.to_rfc3339(), end.to_rfc3339())));
        }
        Ok(Self { start, end })
    }

    /// Parse a range from its parameter encoding, a JSON array holding a single
    /// `[start, end]` pair of RFC 3339 timestamps.
    pub fn parse(value: &str) -> Result<Self> {
        let ranges: Vec<[DateTime<Utc>; 2]> =
            serde_json::from_str(value).map_err(|err| AppError::InvalidTimeRange(format!("malformed time range `{}`: {}", value, err)))?;
        match ranges.as_slice() {
            [[start, end]] => Self::new(*start, *end),
            _ => Err(AppError::InvalidTimeRange(format!("expected exactly one `[start, end]` pair, got {}", ranges.len()))),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Encode this range as a time sequence parameter value.
    pub fn to_parameter_value(&self) -> Result<String> {
        serde_json::to_string(&[[self.start, self.end]]).map_err(|err| AppError::InvalidTimeRange(format!("error encoding time range: {}", err)))
    }
}
