//! Runtime configuration.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// The upper bound of all configured wait durations, one week.
pub const MAX_WAIT_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The operator's logging config, which uses Rust's `env_logger` directives.
    pub rust_log: String,
    /// The name of the account which holds all pipeline resources.
    pub account_name: String,
    /// The scenario to run.
    #[serde(default)]
    pub scenario: Scenario,

    /// The URL of the RTSP camera to ingest.
    pub rtsp_url: String,
    /// The username used to authenticate with the RTSP camera.
    pub rtsp_username: Secret,
    /// The password used to authenticate with the RTSP camera.
    pub rtsp_password: Secret,
    /// The ID of the IoT device which tunnels traffic to cameras behind a firewall.
    pub tunnel_device_id: Option<String>,
    /// The name of the IoT hub to which the tunnel device is registered.
    pub iot_hub_name: Option<String>,

    #[serde(default = "default_live_topology_name")]
    pub live_topology_name: String,
    #[serde(default = "default_live_pipeline_name")]
    pub live_pipeline_name: String,
    #[serde(default = "default_batch_topology_name")]
    pub batch_topology_name: String,
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// The capacity in kbps reserved for the live pipeline.
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
    /// The duration of the clip exported by the batch export scenario.
    #[serde(default = "default_clip_duration_seconds")]
    pub clip_duration_seconds: u64,
    /// The interval at which remote state is polled.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// The maximum duration to wait for a job to terminate.
    #[serde(default = "default_job_timeout_seconds")]
    pub job_timeout_seconds: u64,
    /// The duration after job creation for which the job not being found is tolerated.
    #[serde(default = "default_not_found_grace_seconds")]
    pub not_found_grace_seconds: u64,
    /// The maximum duration to wait for a live pipeline or job to settle.
    #[serde(default = "default_state_timeout_seconds")]
    pub state_timeout_seconds: u64,
    /// The duration for which a live pipeline is held active. Held until shutdown when absent.
    pub hold_seconds: Option<u64>,
}

/// The scenarios which the operator is able to run.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Ingest a public RTSP camera to a video resource.
    LiveIngest,
    /// Ingest an RTSP camera behind a firewall through a device tunnel.
    IngestBehindFirewall,
    /// Ingest a camera, then export a clip of the recording through a pipeline job.
    BatchExport,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::LiveIngest
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::LiveIngest => "live-ingest",
                Self::IngestBehindFirewall => "ingest-behind-firewall",
                Self::BatchExport => "batch-export",
            }
        )
    }
}

/// A configuration value which is never formatted.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

fn default_live_topology_name() -> String {
    "PublicIngestionTopology-1".into()
}

fn default_live_pipeline_name() -> String {
    "PublicIngestionPipeline-1".into()
}

fn default_batch_topology_name() -> String {
    "ExportBatchTopology-1".into()
}

fn default_job_name() -> String {
    "PipelineJob-1".into()
}

fn default_bitrate_kbps() -> u32 {
    1500
}

fn default_clip_duration_seconds() -> u64 {
    5
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_job_timeout_seconds() -> u64 {
    300
}

fn default_not_found_grace_seconds() -> u64 {
    15
}

fn default_state_timeout_seconds() -> u64 {
    60
}

impl Config {
    /// Create a new config instance.
    ///
    /// Currently this routine just parses the runtime environment and builds the application
    /// config from that.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        let config: Config = envy::from_env().context("error building config from env")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the relationships between config values.
    pub fn validate(&self) -> Result<()> {
        if self.scenario == Scenario::IngestBehindFirewall && (self.tunnel_device_id.is_none() || self.iot_hub_name.is_none()) {
            bail!("TUNNEL_DEVICE_ID and IOT_HUB_NAME must be set for the {} scenario", self.scenario);
        }
        if self.poll_interval_seconds == 0 {
            bail!("POLL_INTERVAL_SECONDS must be greater than 0");
        }
        if self.clip_duration_seconds == 0 {
            bail!("CLIP_DURATION_SECONDS must be greater than 0");
        }
        let waits = [
            ("CLIP_DURATION_SECONDS", self.clip_duration_seconds),
            ("POLL_INTERVAL_SECONDS", self.poll_interval_seconds),
            ("JOB_TIMEOUT_SECONDS", self.job_timeout_seconds),
            ("NOT_FOUND_GRACE_SECONDS", self.not_found_grace_seconds),
            ("STATE_TIMEOUT_SECONDS", self.state_timeout_seconds),
        ];
        for (key, val) in waits {
            if val > MAX_WAIT_SECONDS {
                bail!("{} must be at most {}, got {}", key, MAX_WAIT_SECONDS, val);
            }
        }
        Ok(())
    }

    /// The name of the video recorded by the live pipeline.
    pub fn ingest_video_name(&self) -> String {
        format!("{}camera-001", self.live_pipeline_name)
    }

    /// The name of the video created by the export job.
    pub fn export_video_name(&self) -> String {
        format!("{}camera-001", self.job_name)
    }

    pub fn clip_duration(&self) -> Duration {
        Duration::from_secs(self.clip_duration_seconds)
    }

    pub fn hold(&self) -> Option<Duration> {
        self.hold_seconds.map(Duration::from_secs)
    }
}
