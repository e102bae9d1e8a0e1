//! whisper-relay - serialized audio transcription relay
//!
//! Accepts audio from many concurrent producers, funnels it through a
//! single-flight FIFO queue, and sends each job to an OpenAI-compatible
//! transcription API with per-error-class retry and backoff.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Error classification, retry policies, jobs, payload decoding, config
//! - **Application**: The request queue, the retry orchestrator, and port traits
//! - **Infrastructure**: Adapter implementations (OpenAI HTTP API, XDG config file)
//! - **CLI**: Argument parsing, the TCP relay server, logging and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
