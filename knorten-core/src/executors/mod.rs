//! Contracts for the domain operations events trigger.
//!
//! Each mutation family (teams, charts, compute instances, user secret
//! managers, helm releases) is a trait the embedding application implements
//! against its cloud and cluster APIs. [`DomainExecutors`] bundles one
//! implementation per family and registers a handler for every
//! [`EventType`].

pub mod dry_run;
pub mod workers;

pub use dry_run::DryRunExecutor;
pub use workers::{ChartWorker, ComputeWorker, HelmWorker, TeamWorker, UserSecretWorker};

use crate::logger::EventLogger;
use crate::registry::WorkerRegistryBuilder;
use async_trait::async_trait;
use knorten_sdk::objects::EventType;
use knorten_sdk::objects::payloads::{
    AirflowValues, ComputeInstance, HelmEventData, JupyterValues, Team, UserSecretManager,
};
use std::sync::Arc;

/// Result of one executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The mutation was applied; the event completes.
    Done,
    /// Transient failure; the event goes back to `pending`.
    Retry,
    /// Permanent failure; the event fails with this reason.
    Fatal(String),
}

#[async_trait]
pub trait TeamClient: Send + Sync {
    async fn create_team(&self, team: &Team, log: &EventLogger) -> Outcome;
    async fn update_team(&self, team: &Team, log: &EventLogger) -> Outcome;
    async fn delete_team(&self, team_id: &str, log: &EventLogger) -> Outcome;
}

/// Installs and removes the per-team Jupyter and Airflow charts.
#[async_trait]
pub trait ChartClient: Send + Sync {
    async fn sync_jupyter(&self, values: &JupyterValues, log: &EventLogger) -> Outcome;
    async fn delete_jupyter(&self, team_id: &str, log: &EventLogger) -> Outcome;
    async fn sync_airflow(&self, values: &AirflowValues, log: &EventLogger) -> Outcome;
    async fn delete_airflow(&self, team_id: &str, log: &EventLogger) -> Outcome;
}

#[async_trait]
pub trait ComputeClient: Send + Sync {
    async fn create_instance(&self, instance: &ComputeInstance, log: &EventLogger) -> Outcome;
    async fn resize_instance(&self, instance: &ComputeInstance, log: &EventLogger) -> Outcome;
    async fn delete_instance(&self, owner: &str, log: &EventLogger) -> Outcome;
}

#[async_trait]
pub trait UserSecretClient: Send + Sync {
    async fn create_secret_manager(&self, manager: &UserSecretManager, log: &EventLogger)
    -> Outcome;
    async fn delete_secret_manager(&self, owner: &str, log: &EventLogger) -> Outcome;
}

#[async_trait]
pub trait HelmClient: Send + Sync {
    async fn rollout(&self, release: &HelmEventData, log: &EventLogger) -> Outcome;
    async fn rollback(&self, release: &HelmEventData, log: &EventLogger) -> Outcome;
    async fn uninstall(&self, release: &HelmEventData, log: &EventLogger) -> Outcome;
}

/// One client per mutation family.
#[derive(Clone)]
pub struct DomainExecutors {
    pub team: Arc<dyn TeamClient>,
    pub chart: Arc<dyn ChartClient>,
    pub compute: Arc<dyn ComputeClient>,
    pub user_secret: Arc<dyn UserSecretClient>,
    pub helm: Arc<dyn HelmClient>,
}

impl DomainExecutors {
    /// Every family backed by [`DryRunExecutor`].
    pub fn dry_run() -> Self {
        let executor = Arc::new(DryRunExecutor);
        Self {
            team: executor.clone(),
            chart: executor.clone(),
            compute: executor.clone(),
            user_secret: executor.clone(),
            helm: executor,
        }
    }

    /// Register a handler for every [`EventType`].
    pub fn register(&self, mut builder: WorkerRegistryBuilder) -> WorkerRegistryBuilder {
        let team = Arc::new(TeamWorker::new(self.team.clone()));
        let chart = Arc::new(ChartWorker::new(self.chart.clone()));
        let compute = Arc::new(ComputeWorker::new(self.compute.clone()));
        let user_secret = Arc::new(UserSecretWorker::new(self.user_secret.clone()));
        let helm = Arc::new(HelmWorker::new(self.helm.clone()));

        for event_type in EventType::ALL {
            builder = match event_type {
                EventType::CreateTeam | EventType::UpdateTeam | EventType::DeleteTeam => {
                    builder.register_type(event_type, team.clone())
                }
                EventType::CreateJupyter
                | EventType::UpdateJupyter
                | EventType::DeleteJupyter
                | EventType::CreateAirflow
                | EventType::UpdateAirflow
                | EventType::DeleteAirflow => builder.register_type(event_type, chart.clone()),
                EventType::CreateCompute | EventType::ResizeCompute | EventType::DeleteCompute => {
                    builder.register_type(event_type, compute.clone())
                }
                EventType::CreateUserGsm | EventType::DeleteUserGsm => {
                    builder.register_type(event_type, user_secret.clone())
                }
                EventType::HelmRolloutJupyter
                | EventType::HelmRollbackJupyter
                | EventType::HelmUninstallJupyter
                | EventType::HelmRolloutAirflow
                | EventType::HelmRollbackAirflow
                | EventType::HelmUninstallAirflow => builder.register_type(event_type, helm.clone()),
            };
        }
        builder
    }
}

impl std::fmt::Debug for DomainExecutors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainExecutors").finish_non_exhaustive()
    }
}
