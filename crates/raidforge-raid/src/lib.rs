//! Raid lifecycle, wave combat and loot auctions for Raidforge.
//!
//! A community opens a raid, players enroll during a fixed window, and if
//! enough of them showed up the raid fights its waves round by round. A
//! cleared raid drops loot that participants bid on; the loot sweep settles
//! each drop once its window closes.
//!
//! Each live raid runs as an isolated Tokio task (actor model). All
//! authoritative state lives in a [`RaidStore`](raidforge_store::RaidStore),
//! so the background sweeps and a restarted process work from the store
//! alone.
//!
//! # Key types
//!
//! - [`RaidEngine`] — create sessions, join, bid, query, run sweeps
//! - [`Collaborators`] — the store, profile, catalog, messenger and clock
//!   the engine runs against
//! - [`RaidConfig`] — timing and balance settings
//! - [`RaidError`] — rejections and failures

mod collaborators;
mod combat;
mod config;
mod context;
mod engine;
mod error;
pub mod in_memory;
mod loot;
mod registry;
mod session;
mod sweeps;
mod waves;

pub use collaborators::{EnemyCatalog, EnemyDef, ItemCatalog, ItemDef, Messenger, ProfileStore};
pub use config::RaidConfig;
pub use context::Collaborators;
pub use engine::{BackgroundSweeps, RaidEngine, SessionView};
pub use error::{CatalogError, MessagingError, ProfileError, RaidError};
pub use in_memory::{AnnouncementReceiver, ChannelMessenger, InMemoryProfiles, Profile, StaticCatalog};
pub use loot::LootOutcome;
pub use session::Enrollment;
