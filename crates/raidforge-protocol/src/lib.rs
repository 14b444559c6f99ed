//! Shared vocabulary for Raidforge.
//!
//! - **Types** ([`SessionId`], [`Difficulty`], [`RaidStatus`], ...) —
//!   identifiers and lifecycle enums.
//! - **Records** ([`RaidSession`], [`Wave`], [`Participant`], [`LootDrop`],
//!   [`Bid`]) — what the durable store keeps.
//! - **Announcements** ([`Announcement`]) — what the engine tells the
//!   messaging gateway.
//! - **Codec** ([`Codec`], [`JsonCodec`]) — how records become bytes.
//!
//! ```text
//! raidforge-raid (engine) → raidforge-store (records) → raidforge-protocol
//! ```

mod announce;
mod codec;
mod error;
mod records;
mod types;

pub use announce::{Announcement, Contribution, DropSummary};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use records::{
    Bid, BidDraft, DropDraft, EnemyGroup, LootDrop, Participant, RaidSession,
    SessionDraft, Wave, WavePlan,
};
pub use types::{
    BidCategory, CommunityId, Difficulty, DropId, EnemyId, FailureReason,
    ItemId, PlayerId, RaidStatus, Rarity, SessionId, Timestamp,
    UnknownDifficulty,
};
