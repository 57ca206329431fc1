//! Project file parser.
//!
//! Loads `stackweave.yaml` from disk, applies environment overrides and
//! loads a neighbouring `.env` file.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result, StackweaveError};

use super::spec::ProjectFile;

/// Environment variable overriding `project.max_concurrency`.
pub const ENV_MAX_CONCURRENCY: &str = "STACKWEAVE_MAX_CONCURRENCY";

/// Environment variable overriding `project.state_dir`.
pub const ENV_STATE_DIR: &str = "STACKWEAVE_STATE_DIR";

/// Parser for project files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory of the project file; `.env` is looked up here.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory used to find `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a project file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ProjectFile> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(StackweaveError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StackweaveError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a project file from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ProjectFile> {
        debug!("Parsing YAML configuration");

        let file: ProjectFile = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            StackweaveError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed project {} with {} stacks",
            file.project.name,
            file.stacks.len()
        );
        Ok(file)
    }

    /// Loads `.env`, then the project file, then applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or if an
    /// override is malformed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ProjectFile> {
        self.load_dotenv()?;
        let mut file = self.load_file(path)?;
        Self::apply_env_overrides(&mut file, |name| std::env::var(name).ok())?;
        Ok(file)
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `STACKWEAVE_MAX_CONCURRENCY` is not an
    /// integer.
    pub fn apply_env_overrides(
        file: &mut ProjectFile,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(raw) = lookup(ENV_MAX_CONCURRENCY) {
            debug!("Overriding project.max_concurrency from environment");
            let limit = raw.trim().parse::<i64>().map_err(|e| {
                ConfigError::validation(
                    format!("{ENV_MAX_CONCURRENCY} must be an integer: {e}"),
                    "project.max_concurrency",
                )
            })?;
            file.project.max_concurrency = Some(limit);
        }

        if let Some(dir) = lookup(ENV_STATE_DIR) {
            debug!("Overriding project.state_dir from environment");
            file.project.state_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StackweaveError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Project file names, in lookup order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["stackweave.yaml", "stackweave.yml"];

/// Finds the project file in `start_dir` or one of its parents.
///
/// # Errors
///
/// Returns `FileNotFound` if no project file exists up to the root.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(StackweaveError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
