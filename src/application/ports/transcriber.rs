//! Transcription port interface

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::retry::UpstreamFailure;
use crate::domain::transcription::AudioData;

/// Port for the upstream speech-to-text service.
///
/// One call is one attempt: implementations must not retry internally.
/// Failures are reported as a normalized [`UpstreamFailure`] so the retry
/// layer can classify them without knowing the HTTP client in use.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Upload audio and return the text field of the response, if any.
    ///
    /// `Ok(None)` means the service answered successfully without text.
    async fn transcribe(&self, audio: &AudioData) -> Result<Option<String>, UpstreamFailure>;
}

#[async_trait]
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    async fn transcribe(&self, audio: &AudioData) -> Result<Option<String>, UpstreamFailure> {
        (**self).transcribe(audio).await
    }
}
