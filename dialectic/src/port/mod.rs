//! The text-generation capability boundary.
//!
//! The core depends only on [`TextGenerationPort`]. Whether the port wraps
//! a loaded local model, a remote endpoint or a test double is the
//! caller's concern, as are its concurrency limits and any caching.

pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::GenerationProfile;
use crate::error::GenerationError;

pub use retry::{RetryPolicy, RetryingPort};

/// Turns a prompt into text.
///
/// Identical `(prompt, profile)` pairs need not produce identical text.
/// Implementations should report failures as errors rather than returning
/// empty text.
#[async_trait]
pub trait TextGenerationPort: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        profile: &GenerationProfile,
    ) -> Result<String, GenerationError>;
}

#[async_trait]
impl<P> TextGenerationPort for Arc<P>
where
    P: TextGenerationPort + ?Sized,
{
    async fn generate(
        &self,
        prompt: &str,
        profile: &GenerationProfile,
    ) -> Result<String, GenerationError> {
        (**self).generate(prompt, profile).await
    }
}
