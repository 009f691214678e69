//! Handlers that route each event type to its family client.

use super::{ChartClient, ComputeClient, HelmClient, Outcome, TeamClient, UserSecretClient};
use crate::entities::Event;
use crate::logger::EventLogger;
use crate::registry::{Handler, HandlerError};
use async_trait::async_trait;
use knorten_sdk::objects::EventType;
use knorten_sdk::objects::payloads::{
    AirflowValues, ComputeInstance, HelmEventData, JupyterValues, Team, UserSecretManager,
};
use std::sync::Arc;

fn event_type_of(event: &Event) -> Result<EventType, HandlerError> {
    event
        .event_type
        .parse()
        .map_err(|_| HandlerError::Unsupported(event.event_type.clone()))
}

fn unsupported(event: &Event) -> HandlerError {
    HandlerError::Unsupported(event.event_type.clone())
}

pub struct TeamWorker {
    client: Arc<dyn TeamClient>,
}

impl TeamWorker {
    pub fn new(client: Arc<dyn TeamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for TeamWorker {
    async fn handle(&self, event: &Event, log: &EventLogger) -> Result<Outcome, HandlerError> {
        Ok(match event_type_of(event)? {
            EventType::CreateTeam => {
                let team: Team = event.decode_payload()?;
                self.client.create_team(&team, log).await
            }
            EventType::UpdateTeam => {
                let team: Team = event.decode_payload()?;
                self.client.update_team(&team, log).await
            }
            EventType::DeleteTeam => self.client.delete_team(&event.owner, log).await,
            _ => return Err(unsupported(event)),
        })
    }
}

pub struct ChartWorker {
    client: Arc<dyn ChartClient>,
}

impl ChartWorker {
    pub fn new(client: Arc<dyn ChartClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for ChartWorker {
    async fn handle(&self, event: &Event, log: &EventLogger) -> Result<Outcome, HandlerError> {
        Ok(match event_type_of(event)? {
            EventType::CreateJupyter | EventType::UpdateJupyter => {
                let values: JupyterValues = event.decode_payload()?;
                self.client.sync_jupyter(&values, log).await
            }
            EventType::DeleteJupyter => self.client.delete_jupyter(&event.owner, log).await,
            EventType::CreateAirflow | EventType::UpdateAirflow => {
                let values: AirflowValues = event.decode_payload()?;
                self.client.sync_airflow(&values, log).await
            }
            EventType::DeleteAirflow => self.client.delete_airflow(&event.owner, log).await,
            _ => return Err(unsupported(event)),
        })
    }
}

pub struct ComputeWorker {
    client: Arc<dyn ComputeClient>,
}

impl ComputeWorker {
    pub fn new(client: Arc<dyn ComputeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for ComputeWorker {
    async fn handle(&self, event: &Event, log: &EventLogger) -> Result<Outcome, HandlerError> {
        Ok(match event_type_of(event)? {
            EventType::CreateCompute => {
                let instance: ComputeInstance = event.decode_payload()?;
                self.client.create_instance(&instance, log).await
            }
            EventType::ResizeCompute => {
                let instance: ComputeInstance = event.decode_payload()?;
                self.client.resize_instance(&instance, log).await
            }
            EventType::DeleteCompute => self.client.delete_instance(&event.owner, log).await,
            _ => return Err(unsupported(event)),
        })
    }
}

pub struct UserSecretWorker {
    client: Arc<dyn UserSecretClient>,
}

impl UserSecretWorker {
    pub fn new(client: Arc<dyn UserSecretClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for UserSecretWorker {
    async fn handle(&self, event: &Event, log: &EventLogger) -> Result<Outcome, HandlerError> {
        Ok(match event_type_of(event)? {
            EventType::CreateUserGsm => {
                let manager: UserSecretManager = event.decode_payload()?;
                self.client.create_secret_manager(&manager, log).await
            }
            EventType::DeleteUserGsm => self.client.delete_secret_manager(&event.owner, log).await,
            _ => return Err(unsupported(event)),
        })
    }
}

pub struct HelmWorker {
    client: Arc<dyn HelmClient>,
}

impl HelmWorker {
    pub fn new(client: Arc<dyn HelmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for HelmWorker {
    async fn handle(&self, event: &Event, log: &EventLogger) -> Result<Outcome, HandlerError> {
        let event_type = event_type_of(event)?;
        let release: HelmEventData = event.decode_payload()?;
        Ok(match event_type {
            EventType::HelmRolloutJupyter | EventType::HelmRolloutAirflow => {
                self.client.rollout(&release, log).await
            }
            EventType::HelmRollbackJupyter | EventType::HelmRollbackAirflow => {
                self.client.rollback(&release, log).await
            }
            EventType::HelmUninstallJupyter | EventType::HelmUninstallAirflow => {
                self.client.uninstall(&release, log).await
            }
            _ => return Err(unsupported(event)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EventStatus;
    use crate::store::MemoryEventStore;
    use std::sync::Mutex;
    use time::macros::datetime;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingTeams {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TeamClient for RecordingTeams {
        async fn create_team(&self, team: &Team, _log: &EventLogger) -> Outcome {
            self.calls.lock().unwrap().push(format!("create {}", team.slug));
            Outcome::Done
        }
        async fn update_team(&self, team: &Team, _log: &EventLogger) -> Outcome {
            self.calls.lock().unwrap().push(format!("update {}", team.slug));
            Outcome::Retry
        }
        async fn delete_team(&self, team_id: &str, _log: &EventLogger) -> Outcome {
            self.calls.lock().unwrap().push(format!("delete {team_id}"));
            Outcome::Fatal("not allowed".to_string())
        }
    }

    fn event(tag: &str, payload: serde_json::Value) -> Event {
        let at = datetime!(2024-05-01 12:00 UTC);
        Event {
            id: Uuid::now_v7(),
            event_type: tag.into(),
            owner: "team-a-1234".to_string(),
            payload,
            status: EventStatus::Processing,
            deadline: time::Duration::minutes(5),
            retry_count: 0,
            created_at: at,
            updated_at: at,
        }
    }

    fn logger(event: &Event) -> EventLogger {
        EventLogger::new(
            Arc::new(MemoryEventStore::new()),
            event.id,
            event.event_type.clone(),
            time::Duration::minutes(3),
        )
    }

    #[tokio::test]
    async fn test_team_worker_routes_by_action() {
        let client = Arc::new(RecordingTeams::default());
        let worker = TeamWorker::new(client.clone());
        let team = serde_json::json!({"id": "team-a-1234", "slug": "team-a", "owner": "a@example.com"});

        let create = event("create:team", team.clone());
        let update = event("update:team", team);
        let delete = event("delete:team", serde_json::Value::Null);

        assert_eq!(worker.handle(&create, &logger(&create)).await.unwrap(), Outcome::Done);
        assert_eq!(worker.handle(&update, &logger(&update)).await.unwrap(), Outcome::Retry);
        assert_eq!(
            worker.handle(&delete, &logger(&delete)).await.unwrap(),
            Outcome::Fatal("not allowed".to_string())
        );
        assert_eq!(
            *client.calls.lock().unwrap(),
            vec!["create team-a", "update team-a", "delete team-a-1234"]
        );
    }

    #[tokio::test]
    async fn test_worker_rejects_foreign_type() {
        let worker = TeamWorker::new(Arc::new(RecordingTeams::default()));
        let e = event("create:compute", serde_json::Value::Null);
        let err = worker.handle(&e, &logger(&e)).await.unwrap_err();
        assert!(matches!(err, HandlerError::Unsupported(tag) if tag == "create:compute"));
    }

    #[tokio::test]
    async fn test_helm_worker_needs_release_payload() {
        let worker = HelmWorker::new(Arc::new(crate::executors::DryRunExecutor));
        let e = event("rolloutJupyter:helm", serde_json::json!({"team_id": "team-a"}));
        let err = worker.handle(&e, &logger(&e)).await.unwrap_err();
        assert!(matches!(err, HandlerError::MalformedPayload(_)));

        let ok = event(
            "rolloutJupyter:helm",
            serde_json::json!({
                "team_id": "team-a-1234",
                "namespace": "team-a",
                "release_name": "jupyterhub",
                "chart": "jupyter"
            }),
        );
        assert_eq!(worker.handle(&ok, &logger(&ok)).await.unwrap(), Outcome::Done);
    }
}
