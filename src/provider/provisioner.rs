//! Provisioner trait definition.

use async_trait::async_trait;

use crate::error::ProviderError;

use super::types::{DesiredStack, StackDescription};

/// Backend that creates, updates, deletes and describes stacks.
///
/// Calls return the provider status string reported once the request was
/// accepted. A missing target is always reported as
/// [`ProviderError::NotFound`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Creates a stack.
    async fn create(&self, stack: &DesiredStack) -> Result<String, ProviderError>;

    /// Updates an existing stack.
    async fn update(&self, stack: &DesiredStack) -> Result<String, ProviderError>;

    /// Deletes a stack.
    async fn delete(&self, name: &str) -> Result<String, ProviderError>;

    /// Describes a stack.
    async fn describe(&self, name: &str) -> Result<StackDescription, ProviderError>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
