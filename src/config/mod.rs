//! Configuration for stackweave projects.
//!
//! This module handles everything between the project file and a bound
//! [`StackSet`](crate::stack::StackSet):
//! - Parsing `stackweave.yaml` with environment overrides
//! - Validation of names, dependencies and hook points
//! - Instantiating resolver and hook tags from the plugin registries

mod loader;
mod parser;
mod spec;
mod validator;

pub use loader::ConfigLoader;
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_MAX_CONCURRENCY, ENV_STATE_DIR, find_config_file,
};
pub use spec::{ProjectConfig, ProjectFile, StackConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
