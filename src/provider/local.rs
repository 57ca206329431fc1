//! Local file-based provisioner.
//!
//! Keeps one JSON record per stack under `<state_dir>/stacks/`. Useful for
//! dry runs, tests and single-machine setups where "deploying" a stack means
//! recording its resolved configuration.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::ProviderError;

use super::hash::ConfigHasher;
use super::provisioner::Provisioner;
use super::types::{DesiredStack, StackDescription, StackRecord};

/// Default state directory name.
pub const STATE_DIR: &str = ".stackweave";

/// Directory holding stack records.
const STACKS_DIR: &str = "stacks";

/// File-backed provisioner.
#[derive(Debug, Clone)]
pub struct LocalProvisioner {
    base_dir: PathBuf,
    stacks_dir: PathBuf,
    hasher: ConfigHasher,
}

impl LocalProvisioner {
    /// Creates a provisioner storing records under `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let stacks_dir = base_dir.join(STACKS_DIR);
        Self {
            base_dir,
            stacks_dir,
            hasher: ConfigHasher::new(),
        }
    }

    /// State directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.stacks_dir.join(format!("{name}.json"))
    }

    async fn ensure_dir(&self) -> Result<(), ProviderError> {
        if !self.stacks_dir.exists() {
            debug!("Creating state directory: {}", self.stacks_dir.display());
            fs::create_dir_all(&self.stacks_dir)
                .await
                .map_err(|e| ProviderError::Corrupted {
                    message: format!("Failed to create state directory: {e}"),
                })?;
        }
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<StackRecord, ProviderError> {
        let path = self.record_path(name);
        if !path.exists() {
            return Err(ProviderError::NotFound {
                stack: name.to_string(),
            });
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| ProviderError::Corrupted {
                message: format!("Failed to read {}: {e}", path.display()),
            })?;

        serde_json::from_str(&content).map_err(|e| ProviderError::Corrupted {
            message: format!("Failed to parse {}: {e}", path.display()),
        })
    }

    async fn save(&self, record: &StackRecord) -> Result<(), ProviderError> {
        self.ensure_dir().await?;

        let name = &record.config.name;
        let path = self.record_path(name);
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| ProviderError::serialization(format!("Failed to serialize {name}: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        let io_err = |e: std::io::Error| ProviderError::request(name.clone(), e.to_string());

        let mut file = fs::File::create(&temp_path).await.map_err(io_err)?;
        file.write_all(content.as_bytes()).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        fs::rename(&temp_path, &path).await.map_err(io_err)?;

        debug!("Saved record for {name}");
        Ok(())
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    async fn create(&self, stack: &DesiredStack) -> Result<String, ProviderError> {
        if self.record_path(&stack.name).exists() {
            return Err(ProviderError::request(
                stack.name.clone(),
                "stack already exists",
            ));
        }

        let hash = self.hasher.hash_stack(stack)?;
        info!(
            "Creating stack {} (config {})",
            stack.name,
            self.hasher.short_hash(&hash)
        );
        let record = StackRecord::created(stack.clone(), hash);
        self.save(&record).await?;
        Ok(record.status)
    }

    async fn update(&self, stack: &DesiredStack) -> Result<String, ProviderError> {
        let mut record = self.load(&stack.name).await?;
        let hash = self.hasher.hash_stack(stack)?;

        if ConfigHasher::hashes_match(&record.config_hash, &hash) {
            info!("Stack {} is unchanged", stack.name);
            return Ok(String::from("UPDATE_COMPLETE"));
        }

        info!(
            "Updating stack {} ({} -> {})",
            stack.name,
            self.hasher.short_hash(&record.config_hash),
            self.hasher.short_hash(&hash)
        );
        record.update(stack.clone(), hash);
        self.save(&record).await?;
        Ok(record.status)
    }

    async fn delete(&self, name: &str) -> Result<String, ProviderError> {
        let path = self.record_path(name);
        if !path.exists() {
            return Err(ProviderError::NotFound {
                stack: name.to_string(),
            });
        }

        info!("Deleting stack {name}");
        fs::remove_file(&path)
            .await
            .map_err(|e| ProviderError::request(name, e.to_string()))?;
        Ok(String::from("DELETE_COMPLETE"))
    }

    async fn describe(&self, name: &str) -> Result<StackDescription, ProviderError> {
        Ok(self.load(name).await?.describe())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
