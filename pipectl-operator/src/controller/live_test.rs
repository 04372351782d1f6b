use std::sync::Arc;

use anyhow::Result;
use pipectl_core::client::{ControlPlane, RemoteError, CODE_CONFLICT};
use pipectl_core::memory::{InMemoryControlPlane, Operation, SimulationConfig};
use pipectl_core::model::{LivePipelineState, Topology, TopologyKind};
use pipectl_core::template::{batch_export_topology, live_ingest_topology, VIDEO_NAME_PARAMETER};
use pipectl_core::AppError;

use crate::controller::LiveController;
use crate::fixtures::{control_plane, live_definitions, settings, BATCH_TOPOLOGY, LIVE_PIPELINE, LIVE_TOPOLOGY};

async fn created(config: SimulationConfig) -> Result<(Arc<InMemoryControlPlane>, LiveController)> {
    let (plane, client) = control_plane(config);
    let controller = LiveController::new(client, settings());
    let topology = live_ingest_topology(LIVE_TOPOLOGY, None);
    controller.ensure_topology(&topology).await?;
    controller.create_or_update(LIVE_PIPELINE, &topology, 1500, &live_definitions()).await?;
    Ok((plane, controller))
}

async fn state(plane: &InMemoryControlPlane) -> Result<Option<LivePipelineState>> {
    Ok(plane.get_live_pipeline(LIVE_PIPELINE).await?.map(|pipeline| pipeline.state))
}

#[tokio::test]
async fn ensure_topology_is_idempotent() -> Result<()> {
    let (plane, client) = control_plane(SimulationConfig::default());
    let controller = LiveController::new(client, settings());
    let topology = live_ingest_topology(LIVE_TOPOLOGY, None);

    controller.ensure_topology(&topology).await?;
    controller.ensure_topology(&topology).await?;

    assert_eq!(plane.calls(Operation::UpsertTopology), 2, "expected both upserts to reach the control plane");
    assert_eq!(plane.resource_count(), 1, "expected exactly one topology to exist");
    let stored = plane.get_topology(LIVE_TOPOLOGY).await?;
    assert_eq!(stored.as_ref(), Some(&topology), "expected stored topology to match the desired topology");
    Ok(())
}

#[tokio::test]
async fn ensure_topology_rejects_invalid_topology_without_remote_calls() -> Result<()> {
    let (plane, client) = control_plane(SimulationConfig::default());
    let controller = LiveController::new(client, settings());

    let res = controller.ensure_topology(&Topology::new("EmptyTopology-1", TopologyKind::Live)).await;

    assert!(matches!(res, Err(AppError::InvalidTopology(_))), "expected invalid topology error, got {:?}", res);
    assert_eq!(plane.total_calls(), 0, "expected no calls to the control plane");
    Ok(())
}

#[tokio::test]
async fn create_rejects_out_of_range_bitrate_without_remote_calls() -> Result<()> {
    let (plane, client) = control_plane(SimulationConfig::default());
    let controller = LiveController::new(client, settings());
    let topology = live_ingest_topology(LIVE_TOPOLOGY, None);

    let res = controller.create_or_update(LIVE_PIPELINE, &topology, 4000, &live_definitions()).await;

    assert!(matches!(res, Err(AppError::InvalidBitrate(4000))), "expected invalid bitrate error, got {:?}", res);
    assert_eq!(plane.total_calls(), 0, "expected no calls to the control plane");
    Ok(())
}

#[tokio::test]
async fn create_rejects_unbound_parameters_without_remote_calls() -> Result<()> {
    let (plane, client) = control_plane(SimulationConfig::default());
    let controller = LiveController::new(client, settings());
    let topology = live_ingest_topology(LIVE_TOPOLOGY, None);
    let definitions: Vec<_> = live_definitions().into_iter().filter(|def| def.name != VIDEO_NAME_PARAMETER).collect();

    let res = controller.create_or_update(LIVE_PIPELINE, &topology, 1500, &definitions).await;

    match res {
        Err(AppError::UnboundRequired(names)) => assert_eq!(names, vec![VIDEO_NAME_PARAMETER.to_string()]),
        other => panic!("expected unbound required error, got {:?}", other),
    }
    assert_eq!(plane.total_calls(), 0, "expected no calls to the control plane");
    Ok(())
}

#[tokio::test]
async fn create_rejects_batch_topology() -> Result<()> {
    let (plane, client) = control_plane(SimulationConfig::default());
    let controller = LiveController::new(client, settings());

    let res = controller.create_or_update(LIVE_PIPELINE, &batch_export_topology(BATCH_TOPOLOGY), 1500, &[]).await;

    assert!(matches!(res, Err(AppError::InvalidTopology(_))), "expected invalid topology error, got {:?}", res);
    assert_eq!(plane.total_calls(), 0, "expected no calls to the control plane");
    Ok(())
}

#[tokio::test]
async fn create_is_idempotent_for_unchanged_content() -> Result<()> {
    let (plane, controller) = created(SimulationConfig::default()).await?;
    let topology = live_ingest_topology(LIVE_TOPOLOGY, None);

    let pipeline = controller.create_or_update(LIVE_PIPELINE, &topology, 1500, &live_definitions()).await?;

    assert_eq!(plane.calls(Operation::UpsertLivePipeline), 1, "expected unchanged pipeline not to be upserted again");
    assert_eq!(pipeline.state, LivePipelineState::Inactive);
    assert_eq!(pipeline.bitrate_kbps, 1500);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn update_of_active_pipeline_is_rejected() -> Result<()> {
    let (plane, controller) = created(SimulationConfig::default()).await?;
    let topology = live_ingest_topology(LIVE_TOPOLOGY, None);
    controller.activate(LIVE_PIPELINE).await?;

    let res = controller.create_or_update(LIVE_PIPELINE, &topology, 2000, &live_definitions()).await;

    assert!(
        matches!(&res, Err(AppError::InvalidState { operation: "update", .. })),
        "expected invalid state error, got {:?}",
        res
    );
    assert_eq!(plane.calls(Operation::UpsertLivePipeline), 1, "expected no upsert of the active pipeline");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn activate_waits_for_active_and_is_idempotent() -> Result<()> {
    let (plane, controller) = created(SimulationConfig {
        activation_reads: 2,
        ..Default::default()
    })
    .await?;

    let pipeline = controller.activate(LIVE_PIPELINE).await?;
    assert_eq!(pipeline.state, LivePipelineState::Active, "expected pipeline to be active once activate returns");

    let pipeline = controller.activate(LIVE_PIPELINE).await?;
    assert_eq!(pipeline.state, LivePipelineState::Active);
    assert_eq!(plane.calls(Operation::ActivateLivePipeline), 1, "expected activation of an active pipeline to be a no-op");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn activate_from_activating_waits_without_reissuing() -> Result<()> {
    let (plane, controller) = created(SimulationConfig {
        activation_reads: 2,
        ..Default::default()
    })
    .await?;
    plane.activate_live_pipeline(LIVE_PIPELINE).await?;

    let pipeline = controller.activate(LIVE_PIPELINE).await?;

    assert_eq!(pipeline.state, LivePipelineState::Active);
    assert_eq!(plane.calls(Operation::ActivateLivePipeline), 1, "expected no further activation request");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn activate_times_out_when_pipeline_never_settles() -> Result<()> {
    let (_plane, controller) = created(SimulationConfig {
        activation_reads: u32::MAX,
        ..Default::default()
    })
    .await?;

    let res = controller.activate(LIVE_PIPELINE).await;

    assert!(matches!(res, Err(AppError::Timeout { .. })), "expected timeout, got {:?}", res);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn activate_of_absent_pipeline_is_not_found() -> Result<()> {
    let (plane, client) = control_plane(SimulationConfig::default());
    let controller = LiveController::new(client, settings());

    let res = controller.activate(LIVE_PIPELINE).await;

    assert!(matches!(&res, Err(AppError::PipelineNotFound(name)) if name == LIVE_PIPELINE), "expected not found, got {:?}", res);
    assert_eq!(plane.calls(Operation::ActivateLivePipeline), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn activate_surfaces_remote_errors() -> Result<()> {
    let (plane, controller) = created(SimulationConfig::default()).await?;
    plane.inject_fault(Operation::ActivateLivePipeline, RemoteError::new(CODE_CONFLICT, "capacity exhausted"));

    let res = controller.activate(LIVE_PIPELINE).await;

    assert!(matches!(&res, Err(AppError::Remote(err)) if err.code == CODE_CONFLICT), "expected remote error, got {:?}", res);
    assert_eq!(state(&plane).await?, Some(LivePipelineState::Inactive));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deactivate_of_absent_or_inactive_pipeline_is_a_no_op() -> Result<()> {
    let (plane, controller) = created(SimulationConfig::default()).await?;

    controller.deactivate(LIVE_PIPELINE).await?;
    controller.deactivate("MissingPipeline-1").await?;

    assert_eq!(plane.calls(Operation::DeactivateLivePipeline), 0, "expected no deactivation requests");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn delete_of_active_pipeline_is_rejected() -> Result<()> {
    let (plane, controller) = created(SimulationConfig::default()).await?;
    controller.activate(LIVE_PIPELINE).await?;

    let res = controller.delete(LIVE_PIPELINE).await;

    assert!(
        matches!(&res, Err(AppError::InvalidState { operation: "delete", state, .. }) if state == "Active"),
        "expected invalid state error, got {:?}",
        res
    );
    assert_eq!(plane.calls(Operation::DeleteLivePipeline), 0, "expected no delete request");
    assert_eq!(state(&plane).await?, Some(LivePipelineState::Active), "expected pipeline to survive");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn full_lifecycle_ends_absent() -> Result<()> {
    let (plane, controller) = created(SimulationConfig::default()).await?;

    controller.activate(LIVE_PIPELINE).await?;
    controller.deactivate(LIVE_PIPELINE).await?;
    assert_eq!(state(&plane).await?, Some(LivePipelineState::Inactive));
    controller.delete(LIVE_PIPELINE).await?;
    controller.delete(LIVE_PIPELINE).await?;

    assert_eq!(state(&plane).await?, None, "expected pipeline to be absent");
    assert_eq!(plane.calls(Operation::DeleteLivePipeline), 1, "expected delete of an absent pipeline to be a no-op");
    Ok(())
}
