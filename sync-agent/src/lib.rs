//! Building blocks of the `sync-agent` binary.

pub mod config;
pub mod secrets;
pub mod sync;
