//! Provider-facing data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stack::StackStatus;

/// Fully resolved configuration of one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredStack {
    /// Stack name.
    pub name: String,
    /// Template reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Role assumed by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Template parameters.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Stack tags.
    #[serde(default)]
    pub tags: Map<String, Value>,
    /// Notification targets.
    #[serde(default)]
    pub notifications: Vec<Value>,
    /// Free-form user data.
    #[serde(default)]
    pub user_data: Value,
}

/// What the provider reports about a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    /// Stack name.
    pub name: String,
    /// Provider status string, e.g. `CREATE_COMPLETE`.
    pub status: String,
    /// Hash of the deployed configuration, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    /// Last change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StackDescription {
    /// Simplified status.
    #[must_use]
    pub fn simplified(&self) -> StackStatus {
        StackStatus::from_provider_status(&self.status)
    }
}

/// Persisted record of a stack managed by the local provisioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRecord {
    /// Provider status string.
    pub status: String,
    /// SHA-256 of the deployed configuration.
    pub config_hash: String,
    /// The deployed configuration.
    pub config: DesiredStack,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl StackRecord {
    /// Creates a record for a freshly created stack.
    #[must_use]
    pub fn created(config: DesiredStack, config_hash: String) -> Self {
        let now = Utc::now();
        Self {
            status: String::from("CREATE_COMPLETE"),
            config_hash,
            config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the configuration after an update.
    pub fn update(&mut self, config: DesiredStack, config_hash: String) {
        self.status = String::from("UPDATE_COMPLETE");
        self.config = config;
        self.config_hash = config_hash;
        self.updated_at = Utc::now();
    }

    /// Describes the record.
    #[must_use]
    pub fn describe(&self) -> StackDescription {
        StackDescription {
            name: self.config.name.clone(),
            status: self.status.clone(),
            config_hash: Some(self.config_hash.clone()),
            updated_at: Some(self.updated_at),
        }
    }
}
