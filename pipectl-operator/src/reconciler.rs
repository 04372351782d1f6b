//! Run reconciliation & cleanup.
//!
//! The reconciler drives a run and then, however the run ended, converges every resource of its
//! cleanup plan to absent. Jobs are removed first, then live pipelines, then the topologies they
//! reference.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use pipectl_core::client::ControlPlane;
use pipectl_core::model::{Named, Topology};
use pipectl_core::{AppError, Result};
use tokio::sync::broadcast;

use crate::controller::{ControllerSettings, JobController, LiveController, Poller};

/// A kind of remote resource which may be converged to absent.
#[async_trait]
pub trait Convergent: Send + Sync {
    /// The kind of resource, as used in diagnostics.
    fn kind(&self) -> &'static str;

    /// Observe the named resource.
    ///
    /// Returns `None` when absent, else whether the resource is idle & may be removed.
    async fn observe(&self, name: &str) -> Result<Option<bool>>;

    /// Observe the named resource, waiting for it to become visible where the control plane may
    /// not list a resource right after creation.
    async fn locate(&self, name: &str) -> Result<Option<bool>> {
        self.observe(name).await
    }

    /// Begin bringing the named resource to an idle state.
    async fn quiesce(&self, name: &str) -> Result<()>;

    /// Remove the named idle resource.
    async fn remove(&self, name: &str) -> Result<()>;
}

/// Topologies are always idle.
struct TopologyCleanup {
    client: Arc<dyn ControlPlane>,
}

#[async_trait]
impl Convergent for TopologyCleanup {
    fn kind(&self) -> &'static str {
        Topology::KIND
    }

    async fn observe(&self, name: &str) -> Result<Option<bool>> {
        Ok(self.client.get_topology(name).await?.map(|_| true))
    }

    async fn quiesce(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        Ok(self.client.delete_topology(name).await?)
    }
}

/// A reference to a remote resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Job(String),
    LivePipeline(String),
    Topology(String),
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Job(name) => write!(f, "pipeline job `{}`", name),
            Self::LivePipeline(name) => write!(f, "live pipeline `{}`", name),
            Self::Topology(name) => write!(f, "topology `{}`", name),
        }
    }
}

/// The set of remote resources which a run may create.
#[derive(Clone, Debug, Default)]
pub struct CleanupPlan {
    jobs: Vec<String>,
    pipelines: Vec<String>,
    topologies: Vec<String>,
}

impl CleanupPlan {
    pub fn with_job(mut self, name: impl Into<String>) -> Self {
        self.jobs.push(name.into());
        self
    }

    pub fn with_live_pipeline(mut self, name: impl Into<String>) -> Self {
        self.pipelines.push(name.into());
        self
    }

    pub fn with_topology(mut self, name: impl Into<String>) -> Self {
        self.topologies.push(name.into());
        self
    }

    /// All resources of this plan, in cleanup order.
    pub fn ordered(&self) -> Vec<ResourceRef> {
        let jobs = self.jobs.iter().cloned().map(ResourceRef::Job);
        let pipelines = self.pipelines.iter().cloned().map(ResourceRef::LivePipeline);
        let topologies = self.topologies.iter().cloned().map(ResourceRef::Topology);
        jobs.chain(pipelines).chain(topologies).collect()
    }
}

/// A resource which could not be cleaned up.
#[derive(Debug)]
pub struct CleanupFailure {
    pub resource: ResourceRef,
    pub error: AppError,
}

/// The error of a run, pairing the error which ended the run with any cleanup failures.
#[derive(Debug)]
pub struct RunError {
    /// The error which ended the run, `None` if the run itself succeeded.
    pub primary: Option<AppError>,
    pub cleanup: Vec<CleanupFailure>,
}

impl RunError {
    /// Check if the run was ended by a shutdown signal & cleaned up fully.
    pub fn is_clean_shutdown(&self) -> bool {
        matches!(self.primary, Some(AppError::Cancelled)) && self.cleanup.is_empty()
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.primary {
            Some(err) => write!(f, "{}", err)?,
            None => write!(f, "run succeeded")?,
        }
        if !self.cleanup.is_empty() {
            let failures: Vec<_> = self.cleanup.iter().map(|failure| format!("{}: {}", failure.resource, failure.error)).collect();
            write!(f, "; cleanup failed for {}", failures.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.primary.as_ref().map(|err| err as &(dyn std::error::Error + 'static))
    }
}

/// Drives runs & cleans up after them.
pub struct Reconciler {
    jobs: Arc<JobController>,
    pipelines: Arc<LiveController>,
    topologies: TopologyCleanup,
    settings: Arc<ControllerSettings>,
}

impl Reconciler {
    /// Create a new instance.
    pub fn new(client: Arc<dyn ControlPlane>, jobs: Arc<JobController>, pipelines: Arc<LiveController>, settings: Arc<ControllerSettings>) -> Self {
        Self {
            jobs,
            pipelines,
            topologies: TopologyCleanup { client },
            settings,
        }
    }

    /// Drive the given run until it completes or shutdown is signalled, then clean up every
    /// resource of the given plan.
    pub async fn run<F, T>(&self, plan: &CleanupPlan, shutdown: &mut broadcast::Receiver<()>, run: F) -> std::result::Result<T, RunError>
    where
        F: Future<Output = Result<T>>,
    {
        let primary = tokio::select! {
            res = run => res,
            _ = shutdown.recv() => {
                tracing::info!("shutdown signal received, stopping run");
                Err(AppError::Cancelled)
            }
        };
        if let Err(err) = &primary {
            tracing::error!(error = %err, "run failed");
        }

        let cleanup = self.cleanup(plan).await;
        match primary {
            Ok(val) if cleanup.is_empty() => Ok(val),
            Ok(_) => Err(RunError { primary: None, cleanup }),
            Err(err) => Err(RunError { primary: Some(err), cleanup }),
        }
    }

    /// Converge every resource of the given plan to absent, returning all failures.
    ///
    /// A failure does not stop the cleanup of the remaining resources.
    pub async fn cleanup(&self, plan: &CleanupPlan) -> Vec<CleanupFailure> {
        let mut failures = vec![];
        for resource in plan.ordered() {
            let (target, name) = match &resource {
                ResourceRef::Job(name) => (self.jobs.as_ref() as &dyn Convergent, name.as_str()),
                ResourceRef::LivePipeline(name) => (self.pipelines.as_ref() as &dyn Convergent, name.as_str()),
                ResourceRef::Topology(name) => (&self.topologies as &dyn Convergent, name.as_str()),
            };
            match self.converge(target, name).await {
                Ok(()) => tracing::debug!(%resource, "resource cleaned up"),
                Err(error) => {
                    tracing::error!(%resource, error = %error, "error cleaning up resource");
                    failures.push(CleanupFailure { resource, error });
                }
            }
        }
        failures
    }

    /// Observe, quiesce, wait for idle, then remove the named resource.
    async fn converge(&self, target: &dyn Convergent, name: &str) -> Result<()> {
        let idle = match target.locate(name).await? {
            Some(idle) => idle,
            None => return Ok(()),
        };
        if !idle {
            tracing::debug!(kind = target.kind(), resource = name, "quiescing resource before removal");
            target.quiesce(name).await?;
            let mut poller = Poller::new(self.settings.poll_interval, self.settings.state_timeout);
            let mut settled = false;
            while poller.tick().await {
                match target.observe(name).await? {
                    None => return Ok(()),
                    Some(true) => {
                        settled = true;
                        break;
                    }
                    Some(false) => (),
                }
            }
            if !settled {
                return Err(AppError::Timeout {
                    waiting_for: format!("{} `{}` to become idle", target.kind(), name),
                    after: poller.timeout(),
                });
            }
        }
        target.remove(name).await
    }
}
