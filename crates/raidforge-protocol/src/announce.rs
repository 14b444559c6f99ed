//! Outbound announcements handed to the messaging gateway.
//!
//! The engine never waits on delivery. Whatever renders these (a chat
//! embed, a log line, a websocket push) lives outside this workspace.

use serde::{Deserialize, Serialize};

use crate::{
    BidCategory, Difficulty, DropId, FailureReason, ItemId, PlayerId,
    SessionId, Timestamp,
};

/// One participant's share of the total damage, for the results board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub player: PlayerId,
    pub damage: u64,
    /// Percentage of the raid's total damage, `0.0..=100.0`.
    pub share_pct: f64,
    pub experience: u64,
}

/// A drop as listed in the loot announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSummary {
    pub drop_id: DropId,
    pub item_id: ItemId,
    pub item_name: String,
}

/// Every message the raid engine publishes.
///
/// Serialized with an external `"type"` tag so consumers can switch on it:
/// `{"type":"wave_started","session":3,...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Announcement {
    /// A session was created and is accepting players.
    SessionOpened {
        session: SessionId,
        difficulty: Difficulty,
        min_level: u32,
        waves: u32,
        max_participants: usize,
        enrollment_closes_at: Timestamp,
    },

    /// A player was accepted into the session.
    ParticipantJoined {
        session: SessionId,
        player: PlayerId,
        participants: usize,
        max_participants: usize,
    },

    /// The session ended without completing.
    SessionFailed {
        session: SessionId,
        reason: FailureReason,
        participants: usize,
    },

    /// Enrollment closed with enough players; combat begins.
    CombatStarted {
        session: SessionId,
        participants: usize,
    },

    WaveStarted {
        session: SessionId,
        wave: u32,
        is_boss: bool,
        total_health: u64,
    },

    /// Periodic progress report during a long wave.
    RoundProgress {
        session: SessionId,
        wave: u32,
        round: u32,
        damage: u64,
        remaining_health: u64,
        total_health: u64,
    },

    WaveCleared {
        session: SessionId,
        wave: u32,
        rounds: u32,
    },

    /// All waves cleared. Contributions are sorted by damage, highest first.
    SessionCompleted {
        session: SessionId,
        contributions: Vec<Contribution>,
    },

    /// Drops are open for bidding until `closes_at`.
    LootOpened {
        session: SessionId,
        drops: Vec<DropSummary>,
        closes_at: Timestamp,
    },

    LootAwarded {
        session: SessionId,
        drop_id: DropId,
        item_name: String,
        winner: PlayerId,
        category: BidCategory,
        roll: u32,
    },

    /// Nobody rolled `Need` or `Greed`; the item is gone.
    LootWasted {
        session: SessionId,
        drop_id: DropId,
        item_name: String,
    },
}

impl Announcement {
    /// The session this announcement is about.
    pub fn session(&self) -> SessionId {
        match self {
            Self::SessionOpened { session, .. }
            | Self::ParticipantJoined { session, .. }
            | Self::SessionFailed { session, .. }
            | Self::CombatStarted { session, .. }
            | Self::WaveStarted { session, .. }
            | Self::RoundProgress { session, .. }
            | Self::WaveCleared { session, .. }
            | Self::SessionCompleted { session, .. }
            | Self::LootOpened { session, .. }
            | Self::LootAwarded { session, .. }
            | Self::LootWasted { session, .. } => *session,
        }
    }

    /// Short snake_case name of the variant, for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionOpened { .. } => "session_opened",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::SessionFailed { .. } => "session_failed",
            Self::CombatStarted { .. } => "combat_started",
            Self::WaveStarted { .. } => "wave_started",
            Self::RoundProgress { .. } => "round_progress",
            Self::WaveCleared { .. } => "wave_cleared",
            Self::SessionCompleted { .. } => "session_completed",
            Self::LootOpened { .. } => "loot_opened",
            Self::LootAwarded { .. } => "loot_awarded",
            Self::LootWasted { .. } => "loot_wasted",
        }
    }
}
