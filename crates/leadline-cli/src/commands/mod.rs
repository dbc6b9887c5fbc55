pub mod auth_cmd;
pub mod calls;
pub mod common;
pub mod leads;
pub mod notes;
pub mod recordings;
pub mod sync_cmd;
