//! leadline-core - Core library for Leadline
//!
//! This crate contains the shared models, offline-first database layer,
//! sync engine, call-recording pipeline and job scheduler used by all
//! Leadline frontends.

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod remote;
pub mod scheduler;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{CallLog, CallRecording, Lead, LeadNote, LeadStatus, RecordingStatus, SyncStatus};
