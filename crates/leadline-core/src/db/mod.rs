//! Local store for Leadline
//!
//! Durable, indexed tables for leads, notes, statuses, call logs, and call
//! recordings, plus a change feed that publishes row-change events after
//! every committed mutation.

mod call_repository;
mod changes;
mod connection;
mod lead_repository;
mod migrations;
mod note_repository;
mod status_repository;

pub use call_repository::CallRepository;
pub use changes::{ChangeEvent, ChangeFeed, ChangeKind, Entity};
pub use connection::Database;
pub use lead_repository::LeadRepository;
pub use note_repository::NoteRepository;
pub use status_repository::StatusRepository;
