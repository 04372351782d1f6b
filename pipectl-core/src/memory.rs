//! An in-memory control plane.
//!
//! Simulates the eventually consistent behavior of the remote service: live pipeline transitions
//! remain visible for a configurable number of reads, newly created jobs may not be visible yet,
//! and jobs progress according to a script. Faults may be injected per operation, and every call
//! is counted.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::client::{ControlPlane, RemoteError, CODE_CONFLICT, CODE_NOT_FOUND};
use crate::model::{JobError, LivePipeline, LivePipelineState, PipelineJob, PipelineJobState, Topology};

/// The operations of the control plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    UpsertTopology,
    GetTopology,
    DeleteTopology,
    UpsertLivePipeline,
    GetLivePipeline,
    ActivateLivePipeline,
    DeactivateLivePipeline,
    DeleteLivePipeline,
    UpsertJob,
    GetJob,
    CancelJob,
    DeleteJob,
}

/// How a simulated job progresses once it is visible.
#[derive(Clone, Debug, PartialEq)]
pub enum JobScript {
    /// Complete once the job has been observed as processing the given number of times.
    CompleteAfter(u32),
    /// Fail with the given error once the job has been observed as processing the given number of times.
    FailAfter(u32, JobError),
    /// Never leave the processing state unless cancelled.
    Never,
}

/// Simulation parameters.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// The number of reads for which an activating pipeline is observed as `Activating`.
    pub activation_reads: u32,
    /// The number of reads for which a deactivating pipeline is observed as `Deactivating`.
    pub deactivation_reads: u32,
    /// The number of reads for which a newly created job is not found.
    pub job_visibility_reads: u32,
    /// The script applied to newly created jobs.
    pub job_script: JobScript,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            activation_reads: 1,
            deactivation_reads: 1,
            job_visibility_reads: 0,
            job_script: JobScript::CompleteAfter(1),
        }
    }
}

struct PipelineEntry {
    pipeline: LivePipeline,
    /// Reads remaining before the current transition settles.
    pending_reads: u32,
}

struct JobEntry {
    job: PipelineJob,
    hidden_reads: u32,
    observed: u32,
    script: JobScript,
}

/// A control plane which holds all resources in memory.
pub struct InMemoryControlPlane {
    config: SimulationConfig,
    topologies: DashMap<String, Topology>,
    pipelines: DashMap<String, PipelineEntry>,
    jobs: DashMap<String, JobEntry>,
    faults: DashMap<Operation, RemoteError>,
    calls: DashMap<Operation, usize>,
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl InMemoryControlPlane {
    /// Create a new instance.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            topologies: DashMap::new(),
            pipelines: DashMap::new(),
            jobs: DashMap::new(),
            faults: DashMap::new(),
            calls: DashMap::new(),
        }
    }

    /// Cause every subsequent call of the given operation to fail with the given error.
    pub fn inject_fault(&self, op: Operation, err: RemoteError) {
        self.faults.insert(op, err);
    }

    /// Remove a fault injected for the given operation.
    pub fn clear_fault(&self, op: Operation) {
        self.faults.remove(&op);
    }

    /// Override the script of a job which has already been created.
    pub fn script_job(&self, name: &str, script: JobScript) {
        if let Some(mut entry) = self.jobs.get_mut(name) {
            entry.script = script;
        }
    }

    /// The number of calls made of the given operation.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.get(&op).map(|count| *count).unwrap_or(0)
    }

    /// The number of calls made of all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|count| *count.value()).sum()
    }

    /// The number of resources of all kinds currently held.
    pub fn resource_count(&self) -> usize {
        self.topologies.len() + self.pipelines.len() + self.jobs.len()
    }

    /// Record a call of the given operation, failing if a fault has been injected for it.
    fn record(&self, op: Operation) -> Result<(), RemoteError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.faults.get(&op) {
            Some(err) => {
                tracing::debug!(?op, error = %err.value(), "returning injected fault");
                Err(err.clone())
            }
            None => Ok(()),
        }
    }

    fn require_topology(&self, name: &str) -> Result<(), RemoteError> {
        if self.topologies.contains_key(name) {
            Ok(())
        } else {
            Err(RemoteError::new(CODE_NOT_FOUND, format!("topology `{}` not found", name)))
        }
    }
}

fn not_found(kind: &str, name: &str) -> RemoteError {
    RemoteError::new(CODE_NOT_FOUND, format!("{} `{}` not found", kind, name))
}

fn conflict(message: String) -> RemoteError {
    RemoteError::new(CODE_CONFLICT, message)
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn upsert_topology(&self, topology: &Topology) -> Result<Topology, RemoteError> {
        self.record(Operation::UpsertTopology)?;
        self.topologies.insert(topology.name.clone(), topology.clone());
        tracing::debug!(topology = %topology.name, "topology upserted");
        Ok(topology.clone())
    }

    async fn get_topology(&self, name: &str) -> Result<Option<Topology>, RemoteError> {
        self.record(Operation::GetTopology)?;
        Ok(self.topologies.get(name).map(|topology| topology.clone()))
    }

    async fn delete_topology(&self, name: &str) -> Result<(), RemoteError> {
        self.record(Operation::DeleteTopology)?;
        let in_use = self.pipelines.iter().any(|entry| entry.pipeline.topology_name == name) || self.jobs.iter().any(|entry| entry.job.topology_name == name);
        if in_use {
            return Err(conflict(format!("topology `{}` is in use", name)));
        }
        self.topologies.remove(name);
        Ok(())
    }

    async fn upsert_live_pipeline(&self, pipeline: &LivePipeline) -> Result<LivePipeline, RemoteError> {
        self.record(Operation::UpsertLivePipeline)?;
        self.require_topology(&pipeline.topology_name)?;
        let mut stored = pipeline.clone();
        match self.pipelines.get_mut(&pipeline.name) {
            Some(mut entry) => {
                if entry.pipeline.state != LivePipelineState::Inactive {
                    return Err(conflict(format!(
                        "live pipeline `{}` is {} and can not be updated",
                        pipeline.name, entry.pipeline.state
                    )));
                }
                stored.state = LivePipelineState::Inactive;
                entry.pipeline = stored.clone();
            }
            None => {
                stored.state = LivePipelineState::Inactive;
                self.pipelines.insert(
                    pipeline.name.clone(),
                    PipelineEntry {
                        pipeline: stored.clone(),
                        pending_reads: 0,
                    },
                );
            }
        }
        Ok(stored)
    }

    async fn get_live_pipeline(&self, name: &str) -> Result<Option<LivePipeline>, RemoteError> {
        self.record(Operation::GetLivePipeline)?;
        let mut entry = match self.pipelines.get_mut(name) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if entry.pipeline.state.is_transitional() {
            if entry.pending_reads > 0 {
                entry.pending_reads -= 1;
            } else {
                entry.pipeline.state = match entry.pipeline.state {
                    LivePipelineState::Activating => LivePipelineState::Active,
                    _ => LivePipelineState::Inactive,
                };
            }
        }
        Ok(Some(entry.pipeline.clone()))
    }

    async fn activate_live_pipeline(&self, name: &str) -> Result<(), RemoteError> {
        self.record(Operation::ActivateLivePipeline)?;
        let mut entry = self.pipelines.get_mut(name).ok_or_else(|| not_found("live pipeline", name))?;
        match entry.pipeline.state {
            LivePipelineState::Inactive => {
                entry.pipeline.state = LivePipelineState::Activating;
                entry.pending_reads = self.config.activation_reads;
                Ok(())
            }
            LivePipelineState::Activating | LivePipelineState::Active => Ok(()),
            LivePipelineState::Deactivating => Err(conflict(format!("live pipeline `{}` is Deactivating", name))),
        }
    }

    async fn deactivate_live_pipeline(&self, name: &str) -> Result<(), RemoteError> {
        self.record(Operation::DeactivateLivePipeline)?;
        let mut entry = self.pipelines.get_mut(name).ok_or_else(|| not_found("live pipeline", name))?;
        match entry.pipeline.state {
            LivePipelineState::Active | LivePipelineState::Activating => {
                entry.pipeline.state = LivePipelineState::Deactivating;
                entry.pending_reads = self.config.deactivation_reads;
                Ok(())
            }
            LivePipelineState::Deactivating | LivePipelineState::Inactive => Ok(()),
        }
    }

    async fn delete_live_pipeline(&self, name: &str) -> Result<(), RemoteError> {
        self.record(Operation::DeleteLivePipeline)?;
        if let Some(entry) = self.pipelines.get(name) {
            if entry.pipeline.state != LivePipelineState::Inactive {
                return Err(conflict(format!("live pipeline `{}` is {} and can not be deleted", name, entry.pipeline.state)));
            }
        }
        self.pipelines.remove(name);
        Ok(())
    }

    async fn upsert_job(&self, job: &PipelineJob) -> Result<PipelineJob, RemoteError> {
        self.record(Operation::UpsertJob)?;
        self.require_topology(&job.topology_name)?;
        if self.jobs.contains_key(&job.name) {
            return Err(conflict(format!("pipeline job `{}` already exists", job.name)));
        }
        let mut stored = job.clone();
        stored.state = PipelineJobState::Processing;
        stored.error = None;
        self.jobs.insert(
            job.name.clone(),
            JobEntry {
                job: stored.clone(),
                hidden_reads: self.config.job_visibility_reads,
                observed: 0,
                script: self.config.job_script.clone(),
            },
        );
        Ok(stored)
    }

    async fn get_job(&self, name: &str) -> Result<Option<PipelineJob>, RemoteError> {
        self.record(Operation::GetJob)?;
        let mut entry = match self.jobs.get_mut(name) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if entry.hidden_reads > 0 {
            entry.hidden_reads -= 1;
            return Ok(None);
        }
        if entry.job.state == PipelineJobState::Processing {
            let observed = entry.observed;
            entry.observed += 1;
            match entry.script.clone() {
                JobScript::CompleteAfter(count) if observed >= count => entry.job.state = PipelineJobState::Completed,
                JobScript::FailAfter(count, err) if observed >= count => {
                    entry.job.state = PipelineJobState::Failed;
                    entry.job.error = Some(err);
                }
                _ => (),
            }
        }
        Ok(Some(entry.job.clone()))
    }

    async fn cancel_job(&self, name: &str) -> Result<(), RemoteError> {
        self.record(Operation::CancelJob)?;
        let mut entry = self.jobs.get_mut(name).ok_or_else(|| not_found("pipeline job", name))?;
        if entry.job.state == PipelineJobState::Processing {
            entry.job.state = PipelineJobState::Cancelled;
        }
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<(), RemoteError> {
        self.record(Operation::DeleteJob)?;
        if let Some(entry) = self.jobs.get(name) {
            if entry.job.state == PipelineJobState::Processing {
                return Err(conflict(format!("pipeline job `{}` is Processing and can not be deleted", name)));
            }
        }
        self.jobs.remove(name);
        Ok(())
    }
}
