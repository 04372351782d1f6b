//! The control plane abstraction.
//!
//! Transport, authentication & wire encoding are the concern of implementors. Every method is
//! scoped to the account the implementor was built for.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{LivePipeline, PipelineJob, Topology};

/// Error code returned when a resource is in a state which conflicts with the request.
pub const CODE_CONFLICT: &str = "Conflict";
/// Error code returned when a resource which must exist does not.
pub const CODE_NOT_FOUND: &str = "NotFound";

/// An error returned by the control plane, carrying its code & message verbatim.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("control plane error {code}: {message}")]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A remote, eventually consistent control plane which holds pipeline resources.
///
/// All `get_*` methods return `Ok(None)` when the resource does not exist. All `delete_*`
/// methods succeed when the resource is already absent.
#[async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    /// Create or replace a topology.
    async fn upsert_topology(&self, topology: &Topology) -> Result<Topology, RemoteError>;

    async fn get_topology(&self, name: &str) -> Result<Option<Topology>, RemoteError>;

    /// Delete a topology. Fails while live pipelines or jobs still reference it.
    async fn delete_topology(&self, name: &str) -> Result<(), RemoteError>;

    /// Create or update a live pipeline. The referenced topology must exist.
    async fn upsert_live_pipeline(&self, pipeline: &LivePipeline) -> Result<LivePipeline, RemoteError>;

    async fn get_live_pipeline(&self, name: &str) -> Result<Option<LivePipeline>, RemoteError>;

    /// Begin activation of a live pipeline. Completion is observed through `get_live_pipeline`.
    async fn activate_live_pipeline(&self, name: &str) -> Result<(), RemoteError>;

    /// Begin deactivation of a live pipeline. Completion is observed through `get_live_pipeline`.
    async fn deactivate_live_pipeline(&self, name: &str) -> Result<(), RemoteError>;

    /// Delete a live pipeline. Fails unless the pipeline is inactive.
    async fn delete_live_pipeline(&self, name: &str) -> Result<(), RemoteError>;

    /// Create a pipeline job, which begins processing immediately. The referenced topology must exist.
    async fn upsert_job(&self, job: &PipelineJob) -> Result<PipelineJob, RemoteError>;

    async fn get_job(&self, name: &str) -> Result<Option<PipelineJob>, RemoteError>;

    /// Cancel a processing job. Cancelling a terminal job has no effect.
    async fn cancel_job(&self, name: &str) -> Result<(), RemoteError>;

    /// Delete a pipeline job. Fails while the job is processing.
    async fn delete_job(&self, name: &str) -> Result<(), RemoteError>;
}
