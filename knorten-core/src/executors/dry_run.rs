use super::{ChartClient, ComputeClient, HelmClient, Outcome, TeamClient, UserSecretClient};
use crate::logger::EventLogger;
use async_trait::async_trait;
use knorten_sdk::objects::payloads::{
    AirflowValues, ComputeInstance, HelmEventData, JupyterValues, Team, UserSecretManager,
};
use tracing::info;

/// Executor that touches nothing and reports every call as done.
///
/// Used when running without cloud and cluster credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl TeamClient for DryRunExecutor {
    async fn create_team(&self, team: &Team, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), team = %team.slug, "dry run: create team");
        Outcome::Done
    }

    async fn update_team(&self, team: &Team, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), team = %team.slug, "dry run: update team");
        Outcome::Done
    }

    async fn delete_team(&self, team_id: &str, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), team_id, "dry run: delete team");
        Outcome::Done
    }
}

#[async_trait]
impl ChartClient for DryRunExecutor {
    async fn sync_jupyter(&self, values: &JupyterValues, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), team_id = %values.team_id, "dry run: sync jupyter");
        Outcome::Done
    }

    async fn delete_jupyter(&self, team_id: &str, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), team_id, "dry run: delete jupyter");
        Outcome::Done
    }

    async fn sync_airflow(&self, values: &AirflowValues, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), team_id = %values.team_id, "dry run: sync airflow");
        Outcome::Done
    }

    async fn delete_airflow(&self, team_id: &str, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), team_id, "dry run: delete airflow");
        Outcome::Done
    }
}

#[async_trait]
impl ComputeClient for DryRunExecutor {
    async fn create_instance(&self, instance: &ComputeInstance, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), instance = %instance.name, "dry run: create compute instance");
        Outcome::Done
    }

    async fn resize_instance(&self, instance: &ComputeInstance, log: &EventLogger) -> Outcome {
        info!(
            event_id = %log.event_id(),
            instance = %instance.name,
            disk_size_gb = ?instance.disk_size_gb,
            "dry run: resize compute instance"
        );
        Outcome::Done
    }

    async fn delete_instance(&self, owner: &str, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), owner, "dry run: delete compute instance");
        Outcome::Done
    }
}

#[async_trait]
impl UserSecretClient for DryRunExecutor {
    async fn create_secret_manager(
        &self,
        manager: &UserSecretManager,
        log: &EventLogger,
    ) -> Outcome {
        info!(event_id = %log.event_id(), secret = %manager.name, "dry run: create secret manager");
        Outcome::Done
    }

    async fn delete_secret_manager(&self, owner: &str, log: &EventLogger) -> Outcome {
        info!(event_id = %log.event_id(), owner, "dry run: delete secret manager");
        Outcome::Done
    }
}

#[async_trait]
impl HelmClient for DryRunExecutor {
    async fn rollout(&self, release: &HelmEventData, log: &EventLogger) -> Outcome {
        info!(
            event_id = %log.event_id(),
            release = %release.release_name,
            namespace = %release.namespace,
            "dry run: helm rollout"
        );
        Outcome::Done
    }

    async fn rollback(&self, release: &HelmEventData, log: &EventLogger) -> Outcome {
        info!(
            event_id = %log.event_id(),
            release = %release.release_name,
            namespace = %release.namespace,
            "dry run: helm rollback"
        );
        Outcome::Done
    }

    async fn uninstall(&self, release: &HelmEventData, log: &EventLogger) -> Outcome {
        info!(
            event_id = %log.event_id(),
            release = %release.release_name,
            namespace = %release.namespace,
            "dry run: helm uninstall"
        );
        Outcome::Done
    }
}
