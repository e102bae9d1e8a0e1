//! Infrastructure layer - Adapter implementations
//!
//! Concrete implementations of the port interfaces: the OpenAI
//! transcription API and the XDG config file.

pub mod config;
pub mod transcription;

pub use config::XdgConfigStore;
pub use transcription::OpenAiTranscriber;
