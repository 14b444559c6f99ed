//! Durable storage for Raidforge.
//!
//! The engine holds no authoritative state of its own: sessions, waves,
//! participants, drops and bids all live behind [`RaidStore`], and every
//! uniqueness rule (one active raid per community, one join per player,
//! one bid per player per drop, one settlement per drop) is enforced here
//! as an atomic check-and-write.
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryStore`]: tables behind a mutex, for tests and throwaway runs.
//! - [`JsonFileStore`]: the same tables, written through to a JSON file on
//!   every change so a restarted process picks up where it left off.

mod error;
mod file;
mod memory;
mod store;

pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::{MemoryStore, Snapshot};
pub use store::{RaidStore, StatusChange};
