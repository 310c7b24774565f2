//! Generative model collaborator
//!
//! The pipeline never owns a model client. Callers pass any implementation
//! of [`GenerativeModel`] by reference on every call, so invocations stay
//! independent and tests can substitute a scripted model.

use crate::error::ModelError;
use async_trait::async_trait;
use std::sync::Arc;

/// Text-in, text-out generative backend
///
/// Implementations map every provider failure (timeout, quota, rejected
/// request) to a [`ModelError`]; the services surface it as
/// `ExternalCallFailed`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Send one instruction and return the raw answer text
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

#[async_trait]
impl<M> GenerativeModel for Arc<M>
where
    M: GenerativeModel + ?Sized,
{
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).generate(prompt).await
    }
}
