//! Transcription adapters

mod openai;

pub use openai::OpenAiTranscriber;
