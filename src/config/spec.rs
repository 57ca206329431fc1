//! Configuration types for the project file.
//!
//! These structs map to `stackweave.yaml`. Stack property values are kept as
//! raw YAML so resolver tags survive deserialization; the loader turns them
//! into resolvable values.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;

use crate::stack::Disposition;

/// The root of a project file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectFile {
    /// Project-level settings.
    pub project: ProjectConfig,
    /// Stack declarations.
    #[serde(default)]
    pub stacks: Vec<StackConfig>,
}

/// Project-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Project name.
    pub name: String,
    /// Worker limit per batch. Absent, zero or negative means unbounded.
    #[serde(default)]
    pub max_concurrency: Option<i64>,
    /// Directory for the local provisioner's records and the lock file,
    /// relative to the project file.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

/// One stack as written in the project file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackConfig {
    /// Unique stack name.
    pub name: String,
    /// Names of stacks this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// What `launch` does with the stack.
    #[serde(default)]
    pub disposition: Disposition,
    /// Template reference.
    #[serde(default)]
    pub template: YamlValue,
    /// Role assumed by the provider.
    #[serde(default)]
    pub role: YamlValue,
    /// Template parameters.
    #[serde(default)]
    pub parameters: YamlValue,
    /// Stack tags.
    #[serde(default)]
    pub tags: YamlValue,
    /// Notification targets.
    #[serde(default)]
    pub notifications: YamlValue,
    /// Free-form user data.
    #[serde(default)]
    pub user_data: YamlValue,
    /// Hooks keyed by hook point, e.g. `before_create`.
    #[serde(default)]
    pub hooks: BTreeMap<String, Vec<YamlValue>>,
}

impl ProjectConfig {
    /// State directory, defaulting to `.stackweave`.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::provider::STATE_DIR))
    }
}
