use anyhow::Result;

use crate::client::{ControlPlane, RemoteError, CODE_CONFLICT, CODE_NOT_FOUND};
use crate::memory::{InMemoryControlPlane, JobScript, Operation, SimulationConfig};
use crate::model::{JobError, LivePipeline, LivePipelineState, PipelineJob, PipelineJobState};
use crate::template::{batch_export_topology, live_ingest_topology};

const TOPOLOGY: &str = "PublicIngestionTopology-1";
const PIPELINE: &str = "PublicIngestionPipeline-1";
const BATCH_TOPOLOGY: &str = "ExportBatchTopology-1";
const JOB: &str = "PipelineJob-1";

async fn seeded(config: SimulationConfig) -> Result<InMemoryControlPlane> {
    let plane = InMemoryControlPlane::new(config);
    plane.upsert_topology(&live_ingest_topology(TOPOLOGY, None)).await?;
    plane.upsert_topology(&batch_export_topology(BATCH_TOPOLOGY)).await?;
    plane.upsert_live_pipeline(&LivePipeline::new(PIPELINE, TOPOLOGY, 1500, vec![])).await?;
    Ok(plane)
}

async fn pipeline_state(plane: &InMemoryControlPlane) -> Result<Option<LivePipelineState>> {
    Ok(plane.get_live_pipeline(PIPELINE).await?.map(|pipeline| pipeline.state))
}

#[tokio::test]
async fn activation_is_observed_after_configured_reads() -> Result<()> {
    let plane = seeded(SimulationConfig {
        activation_reads: 2,
        ..Default::default()
    })
    .await?;

    plane.activate_live_pipeline(PIPELINE).await?;
    assert_eq!(pipeline_state(&plane).await?, Some(LivePipelineState::Activating));
    assert_eq!(pipeline_state(&plane).await?, Some(LivePipelineState::Activating));
    assert_eq!(pipeline_state(&plane).await?, Some(LivePipelineState::Active));

    plane.deactivate_live_pipeline(PIPELINE).await?;
    assert_eq!(pipeline_state(&plane).await?, Some(LivePipelineState::Deactivating));
    assert_eq!(pipeline_state(&plane).await?, Some(LivePipelineState::Inactive));
    Ok(())
}

#[tokio::test]
async fn active_pipelines_and_referenced_topologies_are_not_deleted() -> Result<()> {
    let plane = seeded(SimulationConfig {
        activation_reads: 0,
        ..Default::default()
    })
    .await?;
    plane.activate_live_pipeline(PIPELINE).await?;
    assert_eq!(pipeline_state(&plane).await?, Some(LivePipelineState::Active));

    let res = plane.delete_live_pipeline(PIPELINE).await;
    assert!(matches!(&res, Err(err) if err.code == CODE_CONFLICT), "expected conflict deleting active pipeline, got {:?}", res);
    let res = plane.delete_topology(TOPOLOGY).await;
    assert!(matches!(&res, Err(err) if err.code == CODE_CONFLICT), "expected conflict deleting topology in use, got {:?}", res);
    assert_eq!(pipeline_state(&plane).await?, Some(LivePipelineState::Active), "expected pipeline to survive");
    Ok(())
}

#[tokio::test]
async fn missing_resources_read_as_absent_and_delete_cleanly() -> Result<()> {
    let plane = InMemoryControlPlane::default();
    assert!(plane.get_topology("nope").await?.is_none());
    assert!(plane.get_live_pipeline("nope").await?.is_none());
    assert!(plane.get_job("nope").await?.is_none());
    plane.delete_job("nope").await?;
    plane.delete_live_pipeline("nope").await?;
    plane.delete_topology("nope").await?;

    let res = plane.activate_live_pipeline("nope").await;
    assert!(matches!(&res, Err(err) if err.code == CODE_NOT_FOUND), "expected not found activating missing pipeline, got {:?}", res);
    Ok(())
}

#[tokio::test]
async fn pipelines_require_their_topology() -> Result<()> {
    let plane = InMemoryControlPlane::default();
    let res = plane.upsert_live_pipeline(&LivePipeline::new(PIPELINE, TOPOLOGY, 1500, vec![])).await;
    assert!(matches!(&res, Err(err) if err.code == CODE_NOT_FOUND), "expected missing topology error, got {:?}", res);
    assert_eq!(plane.resource_count(), 0, "expected nothing to be created");
    Ok(())
}

#[tokio::test]
async fn jobs_follow_their_script() -> Result<()> {
    let err = JobError::new("InvalidTimeRange", "no video in range");
    let plane = seeded(SimulationConfig {
        job_visibility_reads: 1,
        job_script: JobScript::FailAfter(1, err.clone()),
        ..Default::default()
    })
    .await?;
    plane.upsert_job(&PipelineJob::new(JOB, BATCH_TOPOLOGY, vec![])).await?;

    assert!(plane.get_job(JOB).await?.is_none(), "expected new job to be invisible for one read");
    let job = plane.get_job(JOB).await?;
    assert_eq!(job.map(|job| job.state), Some(PipelineJobState::Processing));
    let job = plane.get_job(JOB).await?;
    assert_eq!(job.as_ref().map(|job| job.state), Some(PipelineJobState::Failed));
    assert_eq!(job.and_then(|job| job.error), Some(err), "expected job error to be reported verbatim");

    plane.delete_job(JOB).await?;
    assert!(plane.get_job(JOB).await?.is_none(), "expected job to be deleted");
    Ok(())
}

#[tokio::test]
async fn processing_jobs_must_be_cancelled_before_deletion() -> Result<()> {
    let plane = seeded(SimulationConfig {
        job_script: JobScript::Never,
        ..Default::default()
    })
    .await?;
    plane.upsert_job(&PipelineJob::new(JOB, BATCH_TOPOLOGY, vec![])).await?;

    let res = plane.delete_job(JOB).await;
    assert!(matches!(&res, Err(err) if err.code == CODE_CONFLICT), "expected conflict deleting processing job, got {:?}", res);
    let res = plane.upsert_job(&PipelineJob::new(JOB, BATCH_TOPOLOGY, vec![])).await;
    assert!(matches!(&res, Err(err) if err.code == CODE_CONFLICT), "expected conflict recreating job, got {:?}", res);

    plane.cancel_job(JOB).await?;
    plane.cancel_job(JOB).await?;
    assert_eq!(plane.get_job(JOB).await?.map(|job| job.state), Some(PipelineJobState::Cancelled));
    plane.delete_job(JOB).await?;
    Ok(())
}

#[tokio::test]
async fn injected_faults_are_returned_and_counted() -> Result<()> {
    let plane = InMemoryControlPlane::default();
    let fault = RemoteError::new("ServiceUnavailable", "try again later");
    plane.inject_fault(Operation::GetTopology, fault.clone());

    let res = plane.get_topology(TOPOLOGY).await;
    assert_eq!(res, Err(fault), "expected injected fault");
    plane.clear_fault(Operation::GetTopology);
    assert!(plane.get_topology(TOPOLOGY).await?.is_none());

    assert_eq!(plane.calls(Operation::GetTopology), 2, "expected failed calls to be counted");
    assert_eq!(plane.calls(Operation::DeleteTopology), 0);
    assert_eq!(plane.total_calls(), 2);
    Ok(())
}
