//! Pipeline job lifecycle controller.
//!
//! ```text
//! Absent --create--> Processing --(poll)--> {Completed | Failed | Cancelled} --delete--> Absent
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipectl_core::binder::bind;
use pipectl_core::client::ControlPlane;
use pipectl_core::model::{JobError, Named, ParameterDefinition, PipelineJob, PipelineJobState, TimeRange, Topology, TopologyKind};
use pipectl_core::{AppError, Result};

use crate::controller::{ControllerSettings, Poller};
use crate::reconciler::Convergent;

/// The terminal outcome of a pipeline job.
#[derive(Clone, Debug, PartialEq)]
pub enum JobOutcome {
    /// The job completed, producing the named video.
    Completed { video_name: String },
    /// The job failed. The detail is reported verbatim from the control plane.
    Failed(JobError),
    /// The job was cancelled.
    Cancelled,
}

/// A controller driving pipeline jobs through their lifecycle.
pub struct JobController {
    client: Arc<dyn ControlPlane>,
    settings: Arc<ControllerSettings>,
}

impl JobController {
    /// Create a new instance.
    pub fn new(client: Arc<dyn ControlPlane>, settings: Arc<ControllerSettings>) -> Self {
        Self { client, settings }
    }

    /// Create an export job which processes the given range of the source video into the sink video.
    #[tracing::instrument(level = "debug", skip(self, name, topology), fields(job = %name, topology = %topology.name))]
    pub async fn create(&self, name: &str, topology: &Topology, source_video_name: &str, time_range: &TimeRange, sink_video_name: &str) -> Result<PipelineJob> {
        let params = &self.settings.export_parameters;
        let definitions = vec![
            ParameterDefinition::new(params.source_video_name.clone(), source_video_name),
            ParameterDefinition::new(params.time_sequence.clone(), time_range.to_parameter_value()?),
            ParameterDefinition::new(params.sink_video_name.clone(), sink_video_name),
        ];
        self.create_with_definitions(name, topology, &definitions).await
    }

    /// Create a job binding the given definitions against the given topology.
    #[tracing::instrument(level = "debug", skip(self, name, topology, definitions), fields(job = %name, topology = %topology.name))]
    pub async fn create_with_definitions(&self, name: &str, topology: &Topology, definitions: &[ParameterDefinition]) -> Result<PipelineJob> {
        if topology.kind != TopologyKind::Batch {
            return Err(AppError::InvalidTopology(vec![format!(
                "topology `{}` is of kind {}, pipeline jobs require a Batch topology",
                topology.name, topology.kind
            )]));
        }
        let bound = bind(topology, definitions)?;
        tracing::debug!(parameters = %bound, "parameters bound");

        let job = self.client.upsert_job(&PipelineJob::new(name, topology.name.clone(), bound.definitions())).await?;
        tracing::info!(job = %name, "pipeline job created");
        Ok(job)
    }

    /// Get the current state of the named job, `None` if it does not exist.
    #[tracing::instrument(level = "debug", skip(self, name), fields(job = %name))]
    pub async fn get_state(&self, name: &str) -> Result<Option<PipelineJob>> {
        Ok(self.client.get_job(name).await?)
    }

    /// Poll the named job until it terminates or the timeout elapses.
    ///
    /// A job which is not found within the not-found grace period is treated as still processing,
    /// as newly created jobs may not be visible yet.
    #[tracing::instrument(level = "debug", skip(self, name), fields(job = %name))]
    pub async fn await_completion(&self, name: &str, poll_interval: Duration, timeout: Duration) -> Result<JobOutcome> {
        let mut poller = Poller::new(poll_interval, timeout);
        while poller.tick().await {
            let job = match self.get_state(name).await? {
                Some(job) => job,
                None if poller.elapsed() < self.settings.not_found_grace => {
                    tracing::debug!(polls = poller.polls(), "pipeline job not found yet");
                    continue;
                }
                None => return Err(AppError::JobNotFound(name.into())),
            };
            match job.state {
                PipelineJobState::Processing => {
                    tracing::debug!(polls = poller.polls(), "pipeline job is still processing");
                }
                PipelineJobState::Completed => {
                    let video_name = job.parameter(&self.settings.export_parameters.sink_video_name).unwrap_or_default().to_string();
                    tracing::info!(job = %name, %video_name, "pipeline job completed");
                    return Ok(JobOutcome::Completed { video_name });
                }
                PipelineJobState::Failed => {
                    let detail = job
                        .error
                        .unwrap_or_else(|| JobError::new("Unknown", "pipeline job failed without reporting an error"));
                    tracing::error!(job = %name, error = %detail, "pipeline job failed");
                    return Ok(JobOutcome::Failed(detail));
                }
                PipelineJobState::Cancelled => {
                    tracing::info!(job = %name, "pipeline job was cancelled");
                    return Ok(JobOutcome::Cancelled);
                }
            }
        }
        Err(AppError::Timeout {
            waiting_for: format!("pipeline job `{}` to terminate", name),
            after: poller.timeout(),
        })
    }

    /// Cancel the named job if it is processing. Terminal & absent jobs are left untouched.
    #[tracing::instrument(level = "debug", skip(self, name), fields(job = %name))]
    pub async fn cancel(&self, name: &str) -> Result<()> {
        match self.get_state(name).await? {
            Some(job) if job.state == PipelineJobState::Processing => {
                self.client.cancel_job(name).await?;
                tracing::info!(job = %name, "pipeline job cancelled");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Delete the named job, cancelling it first if it is still processing.
    #[tracing::instrument(level = "debug", skip(self, name), fields(job = %name))]
    pub async fn delete(&self, name: &str) -> Result<()> {
        let job = match self.get_state(name).await? {
            Some(job) => job,
            None => return Ok(()),
        };
        if job.state == PipelineJobState::Processing {
            self.client.cancel_job(name).await?;
            self.wait_for_terminal(name).await?;
        }
        self.client.delete_job(name).await?;
        tracing::info!(job = %name, "pipeline job deleted");
        Ok(())
    }

    async fn wait_for_terminal(&self, name: &str) -> Result<()> {
        let mut poller = Poller::new(self.settings.poll_interval, self.settings.state_timeout);
        while poller.tick().await {
            match self.get_state(name).await? {
                Some(job) if !job.state.is_terminal() => (),
                _ => return Ok(()),
            }
        }
        Err(AppError::Timeout {
            waiting_for: format!("{} `{}` to terminate after cancellation", PipelineJob::KIND, name),
            after: poller.timeout(),
        })
    }
}

#[async_trait]
impl Convergent for JobController {
    fn kind(&self) -> &'static str {
        PipelineJob::KIND
    }

    async fn observe(&self, name: &str) -> Result<Option<bool>> {
        Ok(self.get_state(name).await?.map(|job| job.state.is_terminal()))
    }

    /// Jobs may not be visible right after creation, so absence is only trusted once the
    /// not-found grace period has elapsed.
    async fn locate(&self, name: &str) -> Result<Option<bool>> {
        let mut poller = Poller::new(self.settings.poll_interval, self.settings.not_found_grace);
        while poller.tick().await {
            if let Some(idle) = self.observe(name).await? {
                return Ok(Some(idle));
            }
            tracing::debug!(job = %name, polls = poller.polls(), "pipeline job not found yet");
        }
        Ok(None)
    }

    async fn quiesce(&self, name: &str) -> Result<()> {
        self.cancel(name).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.delete(name).await
    }
}
