//! Live pipeline lifecycle controller.
//!
//! ```text
//! Absent --create--> Inactive --activate--> Activating --(remote ack)--> Active
//! Active --deactivate--> Deactivating --(remote ack)--> Inactive --delete--> Absent
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use pipectl_core::binder::bind;
use pipectl_core::client::ControlPlane;
use pipectl_core::model::{LivePipeline, LivePipelineState, Named, ParameterDefinition, Topology, TopologyKind};
use pipectl_core::{AppError, Result};

use crate::controller::{ControllerSettings, Poller};
use crate::reconciler::Convergent;

/// A controller driving live pipelines through their lifecycle.
pub struct LiveController {
    client: Arc<dyn ControlPlane>,
    settings: Arc<ControllerSettings>,
}

impl LiveController {
    /// Create a new instance.
    pub fn new(client: Arc<dyn ControlPlane>, settings: Arc<ControllerSettings>) -> Self {
        Self { client, settings }
    }

    /// Validate the given topology & ensure it exists on the control plane with the given content.
    #[tracing::instrument(level = "debug", skip(self, topology), fields(topology = %topology.name))]
    pub async fn ensure_topology(&self, topology: &Topology) -> Result<()> {
        topology.validate()?;
        self.client.upsert_topology(topology).await?;
        tracing::debug!(account = %self.settings.account, "topology ensured");
        Ok(())
    }

    /// Create the named pipeline, or update it if it already exists with different content.
    ///
    /// All validation happens before the control plane is contacted.
    #[tracing::instrument(level = "debug", skip(self, name, topology, definitions), fields(pipeline = %name, topology = %topology.name))]
    pub async fn create_or_update(&self, name: &str, topology: &Topology, bitrate_kbps: u32, definitions: &[ParameterDefinition]) -> Result<LivePipeline> {
        LivePipeline::check_bitrate(bitrate_kbps)?;
        if topology.kind != TopologyKind::Live {
            return Err(AppError::InvalidTopology(vec![format!(
                "topology `{}` is of kind {}, live pipelines require a Live topology",
                topology.name, topology.kind
            )]));
        }
        let bound = bind(topology, definitions)?;
        tracing::debug!(parameters = %bound, "parameters bound");

        let desired = LivePipeline::new(name, topology.name.clone(), bitrate_kbps, bound.definitions());
        if let Some(existing) = self.get_state(name).await? {
            let unchanged = existing.topology_name == desired.topology_name && existing.bitrate_kbps == desired.bitrate_kbps && existing.parameters == desired.parameters;
            if unchanged {
                tracing::debug!(state = %existing.state, "live pipeline already exists with desired content");
                return Ok(existing);
            }
            if existing.state != LivePipelineState::Inactive {
                return Err(AppError::InvalidState {
                    kind: LivePipeline::KIND,
                    name: name.into(),
                    state: existing.state.to_string(),
                    operation: "update",
                });
            }
        }
        let pipeline = self.client.upsert_live_pipeline(&desired).await?;
        tracing::info!(pipeline = %name, bitrate_kbps, "live pipeline created");
        Ok(pipeline)
    }

    /// Get the current state of the named pipeline, `None` if it does not exist.
    #[tracing::instrument(level = "debug", skip(self, name), fields(pipeline = %name))]
    pub async fn get_state(&self, name: &str) -> Result<Option<LivePipeline>> {
        Ok(self.client.get_live_pipeline(name).await?)
    }

    /// Activate the named pipeline, waiting until it is observed as active.
    #[tracing::instrument(level = "debug", skip(self, name), fields(pipeline = %name))]
    pub async fn activate(&self, name: &str) -> Result<LivePipeline> {
        let pipeline = self.settled(name).await?.ok_or_else(|| AppError::PipelineNotFound(name.into()))?;
        match pipeline.state {
            LivePipelineState::Active => {
                tracing::debug!("live pipeline already active");
                return Ok(pipeline);
            }
            _ => self.client.activate_live_pipeline(name).await?,
        }
        let pipeline = self.wait_for(name, LivePipelineState::Active).await?.ok_or_else(|| AppError::PipelineNotFound(name.into()))?;
        tracing::info!(pipeline = %name, "live pipeline activated");
        Ok(pipeline)
    }

    /// Deactivate the named pipeline, waiting until it is observed as inactive.
    ///
    /// Deactivating a pipeline which does not exist is a no-op.
    #[tracing::instrument(level = "debug", skip(self, name), fields(pipeline = %name))]
    pub async fn deactivate(&self, name: &str) -> Result<()> {
        let pipeline = match self.settled(name).await? {
            Some(pipeline) => pipeline,
            None => return Ok(()),
        };
        if pipeline.state == LivePipelineState::Inactive {
            return Ok(());
        }
        self.client.deactivate_live_pipeline(name).await?;
        self.wait_for(name, LivePipelineState::Inactive).await?;
        tracing::info!(pipeline = %name, "live pipeline deactivated");
        Ok(())
    }

    /// Delete the named pipeline. Only inactive pipelines may be deleted.
    #[tracing::instrument(level = "debug", skip(self, name), fields(pipeline = %name))]
    pub async fn delete(&self, name: &str) -> Result<()> {
        let pipeline = match self.get_state(name).await? {
            Some(pipeline) => pipeline,
            None => return Ok(()),
        };
        if pipeline.state != LivePipelineState::Inactive {
            return Err(AppError::InvalidState {
                kind: LivePipeline::KIND,
                name: name.into(),
                state: pipeline.state.to_string(),
                operation: "delete",
            });
        }
        self.client.delete_live_pipeline(name).await?;
        tracing::info!(pipeline = %name, "live pipeline deleted");
        Ok(())
    }

    /// Wait for the named pipeline to leave any transitional state.
    async fn settled(&self, name: &str) -> Result<Option<LivePipeline>> {
        let mut poller = Poller::new(self.settings.poll_interval, self.settings.state_timeout);
        while poller.tick().await {
            match self.get_state(name).await? {
                Some(pipeline) if pipeline.state.is_transitional() => {
                    tracing::debug!(state = %pipeline.state, polls = poller.polls(), "waiting for live pipeline to settle");
                }
                other => return Ok(other),
            }
        }
        Err(AppError::Timeout {
            waiting_for: format!("live pipeline `{}` to settle", name),
            after: poller.timeout(),
        })
    }

    /// Wait for the named pipeline to reach the given state, returning `None` if it disappears.
    async fn wait_for(&self, name: &str, target: LivePipelineState) -> Result<Option<LivePipeline>> {
        let mut poller = Poller::new(self.settings.poll_interval, self.settings.state_timeout);
        while poller.tick().await {
            match self.get_state(name).await? {
                Some(pipeline) if pipeline.state != target => {
                    tracing::debug!(state = %pipeline.state, desired = %target, polls = poller.polls(), "waiting for live pipeline state");
                }
                other => return Ok(other),
            }
        }
        Err(AppError::Timeout {
            waiting_for: format!("live pipeline `{}` to become {}", name, target),
            after: poller.timeout(),
        })
    }
}

#[async_trait]
impl Convergent for LiveController {
    fn kind(&self) -> &'static str {
        LivePipeline::KIND
    }

    async fn observe(&self, name: &str) -> Result<Option<bool>> {
        Ok(self.get_state(name).await?.map(|pipeline| pipeline.state == LivePipelineState::Inactive))
    }

    async fn quiesce(&self, name: &str) -> Result<()> {
        match self.get_state(name).await?.map(|pipeline| pipeline.state) {
            Some(LivePipelineState::Active) | Some(LivePipelineState::Activating) => Ok(self.client.deactivate_live_pipeline(name).await?),
            _ => Ok(()),
        }
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.delete(name).await
    }
}
