//! Payloads carried by events and consumed by the domain executors.
//!
//! Delete events carry no payload (`null`); the owner of the event
//! identifies what to remove.

use serde::{Deserialize, Serialize};

/// A team and its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub users: Vec<String>,
    pub owner: String,
    #[serde(default)]
    pub restrict_airflow_egress: bool,
}

/// User-configurable values for a team's JupyterHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JupyterValues {
    pub team_id: String,
    pub cpu_limit: String,
    pub cpu_guarantee: String,
    pub memory_limit: String,
    pub memory_guarantee: String,
    pub image_name: String,
    pub image_tag: String,
    pub cull_timeout: String,
}

/// User-configurable values for a team's Airflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirflowValues {
    pub team_id: String,
    pub dag_repo: String,
    pub dag_repo_branch: String,
    #[serde(default)]
    pub airflow_image: Option<String>,
    #[serde(default)]
    pub airflow_tag: Option<String>,
    #[serde(default)]
    pub restrict_egress: bool,
    #[serde(default)]
    pub api_access: bool,
}

/// A personal compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeInstance {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub disk_size_gb: Option<u32>,
}

/// A personal secret manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSecretManager {
    pub owner: String,
    pub name: String,
}

/// Which chart a helm operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Jupyter,
    Airflow,
}

/// Helm rollout / rollback / uninstall request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmEventData {
    pub team_id: String,
    pub namespace: String,
    pub release_name: String,
    pub chart: ChartKind,
    #[serde(default)]
    pub chart_version: Option<String>,
}
