//! The systems a raid leans on but does not own.
//!
//! Player profiles, the enemy and item catalogs and the chat gateway all
//! live outside the engine. Each one is a trait here so a deployment can
//! plug in its database or bot framework, and tests can plug in the
//! in-memory versions from [`in_memory`](crate::in_memory).
//!
//! The traits are synchronous. Implementations backed by a remote service
//! should keep a local cache or hand off to a blocking pool.

use raidforge_protocol::{
    Announcement, CommunityId, DropId, EnemyId, ItemId, PlayerId, Rarity,
    SessionId,
};

use crate::{CatalogError, MessagingError, ProfileError};

/// An enemy definition from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyDef {
    pub id: EnemyId,
    pub name: String,
    pub level: u32,
    /// Health of a single enemy before wave scaling.
    pub health: u64,
}

/// An item definition from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDef {
    pub id: ItemId,
    pub name: String,
    pub level_required: u32,
    pub rarity: Rarity,
}

/// Reads and credits player profiles.
///
/// Credits carry a key and must be idempotent on it. The engine retries a
/// credit whenever it cannot tell whether the last attempt landed, so a
/// repeated key has to succeed without crediting again.
pub trait ProfileStore: Send + Sync + 'static {
    fn level(&self, player: PlayerId) -> Result<u32, ProfileError>;

    /// Base attack plus whatever equipment adds.
    fn effective_attack(&self, player: PlayerId) -> Result<u64, ProfileError>;

    /// Adds one unit of `item` to the player's inventory, at most once per
    /// `drop`.
    fn grant_item(&self, player: PlayerId, item: ItemId, drop: DropId) -> Result<(), ProfileError>;

    /// Adds `amount` experience, at most once per `(session, player)`.
    fn award_experience(
        &self,
        player: PlayerId,
        amount: u64,
        session: SessionId,
    ) -> Result<(), ProfileError>;
}

pub trait EnemyCatalog: Send + Sync + 'static {
    /// Every enemy whose level is in `min_level..=max_level`.
    fn enemies_in_band(&self, min_level: u32, max_level: u32) -> Result<Vec<EnemyDef>, CatalogError>;
}

pub trait ItemCatalog: Send + Sync + 'static {
    /// Every item whose level requirement is at most `max_level`.
    fn items_up_to_level(&self, max_level: u32) -> Result<Vec<ItemDef>, CatalogError>;
}

/// Delivers announcements to a community.
///
/// Fire-and-forget: the engine logs a failed delivery and carries on.
pub trait Messenger: Send + Sync + 'static {
    fn announce(
        &self,
        community: CommunityId,
        announcement: Announcement,
    ) -> Result<(), MessagingError>;
}
