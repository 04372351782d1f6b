//! Lifecycle controllers for live pipelines & pipeline jobs.
//!
//! Controllers hold no state of their own. Every decision is derived from the state observed on
//! the control plane, so that any operation may be safely re-run.

mod job;
mod live;
#[cfg(test)]
mod live_test;
mod poll;

use std::time::Duration;

use pipectl_core::template::{VIDEO_SINK_NAME_PARAMETER, VIDEO_SOURCE_TIME_SEQUENCE_PARAMETER, VIDEO_SOURCE_VIDEO_NAME_PARAMETER};

use crate::config::Config;

pub use job::{JobController, JobOutcome};
pub use live::LiveController;
pub use poll::Poller;

/// Settings shared by all controllers.
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// The name of the account which holds all resources, used for diagnostics.
    pub account: String,
    /// The interval at which remote state is polled.
    pub poll_interval: Duration,
    /// The maximum duration to wait for a resource to settle.
    pub state_timeout: Duration,
    /// The maximum duration to wait for a job to terminate.
    pub job_timeout: Duration,
    /// The duration after polling begins for which a job not being found is tolerated.
    pub not_found_grace: Duration,
    /// The parameter names used when binding export jobs.
    pub export_parameters: ExportParameters,
}

/// The names of the parameters bound by export jobs.
#[derive(Clone, Debug)]
pub struct ExportParameters {
    pub source_video_name: String,
    pub time_sequence: String,
    pub sink_video_name: String,
}

impl Default for ExportParameters {
    fn default() -> Self {
        Self {
            source_video_name: VIDEO_SOURCE_VIDEO_NAME_PARAMETER.into(),
            time_sequence: VIDEO_SOURCE_TIME_SEQUENCE_PARAMETER.into(),
            sink_video_name: VIDEO_SINK_NAME_PARAMETER.into(),
        }
    }
}

impl ControllerSettings {
    /// Derive controller settings from the given runtime config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            account: config.account_name.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            state_timeout: Duration::from_secs(config.state_timeout_seconds),
            job_timeout: Duration::from_secs(config.job_timeout_seconds),
            not_found_grace: Duration::from_secs(config.not_found_grace_seconds),
            export_parameters: ExportParameters::default(),
        }
    }
}
