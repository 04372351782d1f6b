//! Shared test fixtures.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pipectl_core::client::ControlPlane;
use pipectl_core::memory::{InMemoryControlPlane, SimulationConfig};
use pipectl_core::model::ParameterDefinition;
use pipectl_core::template::{RTSP_PASSWORD_PARAMETER, RTSP_URL_PARAMETER, RTSP_USERNAME_PARAMETER, VIDEO_NAME_PARAMETER};

use crate::config::Config;
use crate::controller::{ControllerSettings, ExportParameters};

pub const LIVE_TOPOLOGY: &str = "PublicIngestionTopology-1";
pub const LIVE_PIPELINE: &str = "PublicIngestionPipeline-1";
pub const BATCH_TOPOLOGY: &str = "ExportBatchTopology-1";
pub const JOB: &str = "PipelineJob-1";

/// Controller settings with a 5s poll interval.
pub fn settings() -> Arc<ControllerSettings> {
    Arc::new(ControllerSettings {
        account: "contoso".into(),
        poll_interval: Duration::from_secs(5),
        state_timeout: Duration::from_secs(60),
        job_timeout: Duration::from_secs(300),
        not_found_grace: Duration::from_secs(15),
        export_parameters: ExportParameters::default(),
    })
}

/// An in-memory control plane, along with a trait object handle to it.
pub fn control_plane(config: SimulationConfig) -> (Arc<InMemoryControlPlane>, Arc<dyn ControlPlane>) {
    let plane = Arc::new(InMemoryControlPlane::new(config));
    let client: Arc<dyn ControlPlane> = plane.clone();
    (plane, client)
}

/// A full set of definitions for the live ingest topology.
pub fn live_definitions() -> Vec<ParameterDefinition> {
    vec![
        ParameterDefinition::new(RTSP_USERNAME_PARAMETER, "admin"),
        ParameterDefinition::new(RTSP_PASSWORD_PARAMETER, "hunter2"),
        ParameterDefinition::new(RTSP_URL_PARAMETER, "rtsp://camera.example.com:554/stream"),
        ParameterDefinition::new(VIDEO_NAME_PARAMETER, "PublicIngestionPipeline-1camera-001"),
    ]
}

/// A runtime config for the given scenario, with any extra env vars applied.
pub fn config(scenario: &str, extra: &[(&str, &str)]) -> Result<Arc<Config>> {
    let mut env: Vec<(String, String)> = vec![
        ("RUST_LOG".into(), "error".into()),
        ("ACCOUNT_NAME".into(), "contoso".into()),
        ("SCENARIO".into(), scenario.into()),
        ("RTSP_URL".into(), "rtsp://camera.example.com:554/stream".into()),
        ("RTSP_USERNAME".into(), "admin".into()),
        ("RTSP_PASSWORD".into(), "hunter2".into()),
    ];
    env.extend(extra.iter().map(|(key, val)| (key.to_string(), val.to_string())));
    let config: Config = envy::from_iter(env)?;
    config.validate()?;
    Ok(Arc::new(config))
}
