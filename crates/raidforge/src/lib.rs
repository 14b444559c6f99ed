//! # Raidforge
//!
//! Guild raid encounters for community chat bots.
//!
//! A community opens a raid, players enroll during a fixed window, the
//! raid fights its waves round by round, and a cleared raid drops loot that
//! participants bid on with need/greed/pass rolls. Raidforge runs all of
//! that on Tokio and keeps every record in a durable store, so a restarted
//! bot picks up its raids where it left them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use raidforge::prelude::*;
//!
//! // Plug in your profile store, catalogs and chat gateway, then:
//! // let service = RaidService::builder()
//! //     .config(load_config("raidforge.json")?)
//! //     .profiles(profiles)
//! //     .enemies(catalog.clone())
//! //     .items(catalog)
//! //     .messenger(gateway)
//! //     .start()
//! //     .await?;
//! // service.engine().create_session(community, Difficulty::Normal, 10).await?;
//! ```

mod config;
mod error;
mod service;

pub use config::{ServiceConfig, init_tracing, load_config};
pub use error::RaidforgeError;
pub use service::{RaidService, RaidServiceBuilder};

pub use raidforge_protocol as protocol;
pub use raidforge_raid as raid;
pub use raidforge_store as store;
pub use raidforge_tick as tick;

/// Everything a bot needs to run raids.
pub mod prelude {
    pub use raidforge_protocol::{
        Announcement, Bid, BidCategory, CommunityId, Contribution, Difficulty,
        DropId, FailureReason, ItemId, LootDrop, Participant, PlayerId,
        RaidSession, RaidStatus, Rarity, SessionId, Timestamp, Wave,
    };
    pub use raidforge_raid::{
        ChannelMessenger, EnemyCatalog, EnemyDef, Enrollment, InMemoryProfiles,
        ItemCatalog, ItemDef, Messenger, ProfileStore, RaidConfig, RaidEngine,
        RaidError, SessionView, StaticCatalog,
    };
    pub use raidforge_store::{JsonFileStore, MemoryStore, RaidStore};

    pub use crate::{
        RaidService, RaidServiceBuilder, RaidforgeError, ServiceConfig,
        init_tracing, load_config,
    };
}
