//! Event type tags, pause classes and status enums.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Every event type the bundled workers understand.
///
/// Tags have the form `<action>:<resource>`. The resource part groups
/// related types for in-flight exclusion: `create:jupyter` and
/// `update:jupyter` for the same owner never run concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    CreateTeam,
    UpdateTeam,
    DeleteTeam,
    CreateJupyter,
    UpdateJupyter,
    DeleteJupyter,
    CreateAirflow,
    UpdateAirflow,
    DeleteAirflow,
    CreateCompute,
    ResizeCompute,
    DeleteCompute,
    CreateUserGsm,
    DeleteUserGsm,
    HelmRolloutJupyter,
    HelmRollbackJupyter,
    HelmUninstallJupyter,
    HelmRolloutAirflow,
    HelmRollbackAirflow,
    HelmUninstallAirflow,
}

impl EventType {
    pub const ALL: [EventType; 20] = [
        EventType::CreateTeam,
        EventType::UpdateTeam,
        EventType::DeleteTeam,
        EventType::CreateJupyter,
        EventType::UpdateJupyter,
        EventType::DeleteJupyter,
        EventType::CreateAirflow,
        EventType::UpdateAirflow,
        EventType::DeleteAirflow,
        EventType::CreateCompute,
        EventType::ResizeCompute,
        EventType::DeleteCompute,
        EventType::CreateUserGsm,
        EventType::DeleteUserGsm,
        EventType::HelmRolloutJupyter,
        EventType::HelmRollbackJupyter,
        EventType::HelmUninstallJupyter,
        EventType::HelmRolloutAirflow,
        EventType::HelmRollbackAirflow,
        EventType::HelmUninstallAirflow,
    ];

    /// The tag stored in the `events.type` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::CreateTeam => "create:team",
            EventType::UpdateTeam => "update:team",
            EventType::DeleteTeam => "delete:team",
            EventType::CreateJupyter => "create:jupyter",
            EventType::UpdateJupyter => "update:jupyter",
            EventType::DeleteJupyter => "delete:jupyter",
            EventType::CreateAirflow => "create:airflow",
            EventType::UpdateAirflow => "update:airflow",
            EventType::DeleteAirflow => "delete:airflow",
            EventType::CreateCompute => "create:compute",
            EventType::ResizeCompute => "resize:compute",
            EventType::DeleteCompute => "delete:compute",
            EventType::CreateUserGsm => "create:usergsm",
            EventType::DeleteUserGsm => "delete:usergsm",
            EventType::HelmRolloutJupyter => "rolloutJupyter:helm",
            EventType::HelmRollbackJupyter => "rollbackJupyter:helm",
            EventType::HelmUninstallJupyter => "uninstallJupyter:helm",
            EventType::HelmRolloutAirflow => "rolloutAirflow:helm",
            EventType::HelmRollbackAirflow => "rollbackAirflow:helm",
            EventType::HelmUninstallAirflow => "uninstallAirflow:helm",
        }
    }

    /// The resource part of the tag.
    pub fn resource(self) -> &'static str {
        resource_of(self.as_str())
    }

    /// The pause class this type belongs to.
    pub const fn class(self) -> EventClass {
        match self {
            EventType::CreateTeam | EventType::UpdateTeam | EventType::DeleteTeam => {
                EventClass::Team
            }
            EventType::CreateJupyter
            | EventType::UpdateJupyter
            | EventType::DeleteJupyter
            | EventType::HelmRolloutJupyter
            | EventType::HelmRollbackJupyter
            | EventType::HelmUninstallJupyter => EventClass::Jupyter,
            EventType::CreateAirflow
            | EventType::UpdateAirflow
            | EventType::DeleteAirflow
            | EventType::HelmRolloutAirflow
            | EventType::HelmRollbackAirflow
            | EventType::HelmUninstallAirflow => EventClass::Airflow,
            EventType::CreateCompute | EventType::ResizeCompute | EventType::DeleteCompute => {
                EventClass::Compute
            }
            EventType::CreateUserGsm | EventType::DeleteUserGsm => EventClass::UserSecret,
        }
    }

    /// Deadline used when an event of this type is registered without an
    /// explicit one. Chart installs get longer windows than plain API calls.
    pub fn default_deadline(self) -> time::Duration {
        match self {
            EventType::CreateAirflow | EventType::HelmRolloutAirflow => {
                time::Duration::minutes(30)
            }
            EventType::UpdateAirflow => time::Duration::minutes(15),
            EventType::HelmRolloutJupyter
            | EventType::HelmUninstallJupyter
            | EventType::HelmUninstallAirflow => time::Duration::minutes(10),
            _ => time::Duration::minutes(5),
        }
    }
}

/// Returns the resource part of an `<action>:<resource>` tag.
///
/// Tags without a colon are their own resource.
pub fn resource_of(tag: &str) -> &str {
    match tag.split_once(':') {
        Some((_, resource)) => resource,
        None => tag,
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A group of event types that can be paused together, e.g. to stop all
/// airflow automation during a maintenance window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventClass {
    Team,
    Jupyter,
    Airflow,
    Compute,
    UserSecret,
}

impl EventClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventClass::Team => "team",
            EventClass::Jupyter => "jupyter",
            EventClass::Airflow => "airflow",
            EventClass::Compute => "compute",
            EventClass::UserSecret => "usersecret",
        }
    }
}

impl std::fmt::Display for EventClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown event class: {0}")]
pub struct UnknownEventClass(pub String);

impl FromStr for EventClass {
    type Err = UnknownEventClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team" => Ok(EventClass::Team),
            "jupyter" => Ok(EventClass::Jupyter),
            "airflow" => Ok(EventClass::Airflow),
            "compute" => Ok(EventClass::Compute),
            "usersecret" => Ok(EventClass::UserSecret),
            other => Err(UnknownEventClass(other.to_string())),
        }
    }
}

/// Event status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `knorten-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    New,
    Processing,
    Pending,
    Completed,
    Failed,
}

/// Event log severity for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Info,
    Error,
    Fatal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_parse_back() {
        for event_type in EventType::ALL {
            assert_eq!(event_type.as_str().parse::<EventType>().unwrap(), event_type);
        }
        assert!("create:spaceship".parse::<EventType>().is_err());
    }

    #[test]
    fn test_resource_grouping() {
        assert_eq!(EventType::CreateJupyter.resource(), "jupyter");
        assert_eq!(EventType::UpdateJupyter.resource(), "jupyter");
        assert_eq!(EventType::HelmRolloutAirflow.resource(), "helm");
        assert_eq!(resource_of("no-colon"), "no-colon");
    }

    #[test]
    fn test_helm_types_follow_their_chart_class() {
        assert_eq!(EventType::HelmRollbackAirflow.class(), EventClass::Airflow);
        assert_eq!(EventType::HelmUninstallJupyter.class(), EventClass::Jupyter);
        assert_eq!(EventType::DeleteUserGsm.class(), EventClass::UserSecret);
    }

    #[test]
    fn test_default_deadlines() {
        assert_eq!(
            EventType::CreateAirflow.default_deadline(),
            time::Duration::minutes(30)
        );
        assert_eq!(
            EventType::UpdateAirflow.default_deadline(),
            time::Duration::minutes(15)
        );
        assert_eq!(
            EventType::CreateTeam.default_deadline(),
            time::Duration::minutes(5)
        );
    }

    #[test]
    fn test_serde_uses_tags() {
        let json = serde_json::to_string(&EventType::ResizeCompute).unwrap();
        assert_eq!(json, "\"resize:compute\"");
        let class: EventClass = serde_json::from_str("\"usersecret\"").unwrap();
        assert_eq!(class, EventClass::UserSecret);
    }
}
