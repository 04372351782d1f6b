//! Runnable scenarios.
//!
//! Every scenario runs under the reconciler, so all resources it may create are removed once it
//! ends, whether it succeeded, failed or was interrupted.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use pipectl_core::client::ControlPlane;
use pipectl_core::model::{JobError, ParameterDefinition, TimeRange, Topology, Tunnel};
use pipectl_core::template::{self, RTSP_PASSWORD_PARAMETER, RTSP_URL_PARAMETER, RTSP_USERNAME_PARAMETER, VIDEO_NAME_PARAMETER};
use pipectl_core::{AppError, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, Scenario};
use crate::controller::{ControllerSettings, JobController, JobOutcome, LiveController};
use crate::reconciler::{CleanupPlan, Reconciler, RunError};

/// The delay between the end of an exported clip and the time of export.
const EXPORT_LAG_SECONDS: i64 = 2;

/// The successful outcome of a scenario.
#[derive(Clone, Debug, PartialEq)]
pub enum ScenarioOutcome {
    /// The camera was ingested for the configured hold duration.
    Ingested { pipeline: String, video_name: String },
    /// A clip was exported to a new video.
    Exported { job: String, video_name: String },
}

/// Runs the configured scenario.
pub struct ScenarioRunner {
    config: Arc<Config>,
    settings: Arc<ControllerSettings>,
    live: Arc<LiveController>,
    jobs: Arc<JobController>,
    reconciler: Reconciler,
}

impl ScenarioRunner {
    /// Create a new instance.
    pub fn new(config: Arc<Config>, client: Arc<dyn ControlPlane>) -> Self {
        let settings = Arc::new(ControllerSettings::from_config(&config));
        let live = Arc::new(LiveController::new(client.clone(), settings.clone()));
        let jobs = Arc::new(JobController::new(client.clone(), settings.clone()));
        let reconciler = Reconciler::new(client, jobs.clone(), live.clone(), settings.clone());
        Self {
            config,
            settings,
            live,
            jobs,
            reconciler,
        }
    }

    /// Spawn this runner, signalling shutdown on the given channel once the run has ended.
    pub fn spawn(self, shutdown_tx: broadcast::Sender<()>) -> JoinHandle<anyhow::Result<()>> {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let res = self.run(&mut shutdown_rx).await;
            let _ = shutdown_tx.send(());
            match res {
                Ok(outcome) => {
                    tracing::info!(?outcome, "scenario complete, all resources cleaned up");
                    Ok(())
                }
                Err(err) if err.is_clean_shutdown() => {
                    tracing::info!("scenario stopped by shutdown signal, all resources cleaned up");
                    Ok(())
                }
                Err(err) => Err(err).context("error running scenario"),
            }
        })
    }

    /// The resources which the configured scenario may create.
    pub fn cleanup_plan(&self) -> CleanupPlan {
        let plan = CleanupPlan::default();
        let plan = match self.config.scenario {
            Scenario::BatchExport => plan.with_job(&self.config.job_name).with_topology(&self.config.batch_topology_name),
            Scenario::LiveIngest | Scenario::IngestBehindFirewall => plan,
        };
        plan.with_live_pipeline(&self.config.live_pipeline_name)
            .with_topology(&self.config.live_topology_name)
    }

    /// Run the configured scenario to completion, cleaning up afterwards.
    pub async fn run(&self, shutdown: &mut broadcast::Receiver<()>) -> std::result::Result<ScenarioOutcome, RunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, scenario = %self.config.scenario, account = %self.settings.account);
        let plan = self.cleanup_plan();
        self.reconciler.run(&plan, shutdown, self.execute()).instrument(span).await
    }

    async fn execute(&self) -> Result<ScenarioOutcome> {
        match self.config.scenario {
            Scenario::LiveIngest | Scenario::IngestBehindFirewall => {
                let video_name = self.ingest().await?;
                match self.config.hold() {
                    Some(hold) => {
                        tracing::info!(?hold, "holding live pipeline active");
                        tokio::time::sleep(hold).await;
                    }
                    None => {
                        tracing::info!("holding live pipeline active until shutdown");
                        futures::future::pending::<()>().await;
                    }
                }
                let pipeline = self.config.live_pipeline_name.clone();
                self.live.deactivate(&pipeline).await?;
                Ok(ScenarioOutcome::Ingested { pipeline, video_name })
            }
            Scenario::BatchExport => self.export().await,
        }
    }

    /// The live topology of the configured scenario.
    fn live_topology(&self) -> Topology {
        let tunnel = match self.config.scenario {
            Scenario::IngestBehindFirewall => Some(Tunnel {
                device_id: self.config.tunnel_device_id.clone().unwrap_or_default(),
                iot_hub_name: self.config.iot_hub_name.clone().unwrap_or_default(),
            }),
            Scenario::LiveIngest | Scenario::BatchExport => None,
        };
        template::live_ingest_topology(&self.config.live_topology_name, tunnel)
    }

    /// Ingest the configured camera, returning the name of the recorded video.
    async fn ingest(&self) -> Result<String> {
        let topology = self.live_topology();
        self.live.ensure_topology(&topology).await?;

        let video_name = self.config.ingest_video_name();
        let definitions = vec![
            ParameterDefinition::new(RTSP_USERNAME_PARAMETER, self.config.rtsp_username.expose()),
            ParameterDefinition::new(RTSP_PASSWORD_PARAMETER, self.config.rtsp_password.expose()),
            ParameterDefinition::new(RTSP_URL_PARAMETER, self.config.rtsp_url.clone()),
            ParameterDefinition::new(VIDEO_NAME_PARAMETER, video_name.clone()),
        ];
        let pipeline = &self.config.live_pipeline_name;
        self.live.create_or_update(pipeline, &topology, self.config.bitrate_kbps, &definitions).await?;
        self.live.activate(pipeline).await?;
        Ok(video_name)
    }

    /// Ingest the configured camera, then export a clip of the recording.
    async fn export(&self) -> Result<ScenarioOutcome> {
        let source_video_name = self.ingest().await?;

        // Allow a full clip to be recorded before it is exported.
        let clip = self.config.clip_duration();
        tokio::time::sleep(clip.saturating_mul(2)).await;

        let topology = template::batch_export_topology(&self.config.batch_topology_name);
        self.live.ensure_topology(&topology).await?;

        let clip = chrono::Duration::from_std(clip).map_err(|err| AppError::InvalidTimeRange(format!("clip duration out of range: {}", err)))?;
        let lag = chrono::Duration::seconds(EXPORT_LAG_SECONDS);
        let now = Utc::now();
        let range = TimeRange::new(now - clip - lag, now - lag)?;

        let job = &self.config.job_name;
        let sink_video_name = self.config.export_video_name();
        self.jobs.create(job, &topology, &source_video_name, &range, &sink_video_name).await?;
        match self.jobs.await_completion(job, self.settings.poll_interval, self.settings.job_timeout).await? {
            JobOutcome::Completed { video_name } => Ok(ScenarioOutcome::Exported { job: job.clone(), video_name }),
            JobOutcome::Failed(detail) => Err(AppError::JobFailed { name: job.clone(), detail }),
            JobOutcome::Cancelled => Err(AppError::JobFailed {
                name: job.clone(),
                detail: JobError::new("Cancelled", "pipeline job was cancelled before completing"),
            }),
        }
    }
}
