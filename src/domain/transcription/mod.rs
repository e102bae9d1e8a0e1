//! Transcription domain module

mod audio_data;
mod job;
mod payload;

pub use audio_data::{AudioData, AudioMimeType};
pub use job::{Job, JobId};
pub use payload::normalize;
