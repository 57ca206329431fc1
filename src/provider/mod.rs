//! Provisioning backends.
//!
//! The [`Provisioner`] trait is the boundary to whatever actually creates
//! stacks. [`LocalProvisioner`] is the file-backed implementation shipped
//! with the CLI.

mod hash;
mod local;
mod lock;
mod provisioner;
mod types;
mod wait;

pub use hash::ConfigHasher;
pub use local::{LocalProvisioner, STATE_DIR};
pub use lock::{LOCK_EXPIRY_SECS, LockFile, LockInfo, generate_holder_id};
#[cfg(test)]
pub use provisioner::MockProvisioner;
pub use provisioner::Provisioner;
pub use types::{DesiredStack, StackDescription, StackRecord};
pub use wait::{WaitPolicy, wait_for_terminal};
