//! Transcription job entity

use std::fmt;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::audio_data::AudioData;

/// Unique job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One transcription request awaiting or undergoing processing.
///
/// The completion channel lives with the queue entry, not here, so a job
/// can be lent to the orchestrator without exposing who is waiting on it.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    payload: AudioData,
    created_at: Instant,
}

impl Job {
    /// Create a job with a fresh id
    pub fn new(payload: impl Into<AudioData>) -> Self {
        Self {
            id: JobId::new(),
            payload: payload.into(),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &AudioData {
        &self.payload
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the job was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
