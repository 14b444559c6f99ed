//! Persistent raid records.
//!
//! These are the rows the durable store keeps. Records never point at each
//! other directly: a participant names its session by [`SessionId`], a bid
//! names its drop by [`DropId`], and lookups go through the store.

use serde::{Deserialize, Serialize};

use crate::{
    BidCategory, CommunityId, Difficulty, DropId, EnemyId, FailureReason,
    ItemId, PlayerId, RaidStatus, SessionId, Timestamp,
};

// ---------------------------------------------------------------------------
// RaidSession
// ---------------------------------------------------------------------------

/// One raid encounter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidSession {
    pub id: SessionId,
    pub community: CommunityId,
    pub difficulty: Difficulty,
    /// Players below this level are turned away at enrollment.
    pub min_level: u32,
    pub wave_count: u32,
    /// 1-based index of the wave being fought (or last fought).
    pub current_wave: u32,
    pub status: RaidStatus,
    /// Set only when `status` is [`RaidStatus::Failed`].
    pub failure: Option<FailureReason>,
    pub created_at: Timestamp,
    pub enrollment_deadline: Timestamp,
    /// Past this instant an in-progress session is reclaimed by the
    /// expiry sweep.
    pub hard_deadline: Timestamp,
    pub completed_at: Option<Timestamp>,
    /// Every participant of a completed session has been credited their
    /// experience.
    #[serde(default)]
    pub rewards_granted: bool,
    pub min_participants: usize,
    pub max_participants: usize,
}

/// Everything the store needs to create a session. The store assigns the
/// id and the wave records' session reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub community: CommunityId,
    pub difficulty: Difficulty,
    pub min_level: u32,
    pub created_at: Timestamp,
    pub enrollment_deadline: Timestamp,
    pub hard_deadline: Timestamp,
    pub min_participants: usize,
    pub max_participants: usize,
    pub waves: Vec<WavePlan>,
}

// ---------------------------------------------------------------------------
// Waves
// ---------------------------------------------------------------------------

/// A group of identical enemies within a wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyGroup {
    pub enemy_id: EnemyId,
    pub name: String,
    pub count: u32,
}

/// A pre-computed wave, before it is attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavePlan {
    pub enemies: Vec<EnemyGroup>,
    pub total_health: u64,
    pub is_boss: bool,
}

/// One discrete combat encounter within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wave {
    pub session_id: SessionId,
    /// 1-based sequence number within the session.
    pub number: u32,
    pub enemies: Vec<EnemyGroup>,
    pub total_health: u64,
    /// Never increases; floored at zero.
    pub remaining_health: u64,
    pub is_boss: bool,
    pub completed: bool,
}

impl Wave {
    /// Remaining health as a fraction of the pool, `0.0..=1.0`.
    pub fn health_fraction(&self) -> f64 {
        if self.total_health == 0 {
            return 0.0;
        }
        self.remaining_health as f64 / self.total_health as f64
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// A player enrolled in a session. Unique per (session, player).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: SessionId,
    pub player: PlayerId,
    pub damage_dealt: u64,
    pub alive: bool,
    pub joined_at: Timestamp,
}

impl Participant {
    /// A fresh participant: no damage yet, alive.
    pub fn enrolled(
        session_id: SessionId,
        player: PlayerId,
        joined_at: Timestamp,
    ) -> Self {
        Self {
            session_id,
            player,
            damage_dealt: 0,
            alive: true,
            joined_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Loot
// ---------------------------------------------------------------------------

/// An item dropped by a completed raid, open for bids until its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDrop {
    pub id: DropId,
    pub session_id: SessionId,
    pub item_id: ItemId,
    pub item_name: String,
    pub bid_deadline: Timestamp,
    /// Assigned at most once, when the drop is settled with a winner.
    pub winner: Option<PlayerId>,
    /// When the resolution ran. A settled drop without a winner was wasted.
    pub settled_at: Option<Timestamp>,
}

impl LootDrop {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

/// A drop before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropDraft {
    pub item_id: ItemId,
    pub item_name: String,
    pub bid_deadline: Timestamp,
}

/// A player's bid on a drop. Unique per (drop, player).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub drop_id: DropId,
    pub player: PlayerId,
    pub category: BidCategory,
    /// Present for `Need` and `Greed`, absent for `Pass`.
    pub roll: Option<u32>,
    pub placed_at: Timestamp,
    /// Store-assigned, strictly increasing across all bids. Lower means
    /// earlier.
    pub seq: u64,
}

/// A bid before the store assigns its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidDraft {
    pub drop_id: DropId,
    pub player: PlayerId,
    pub category: BidCategory,
    pub roll: Option<u32>,
    pub placed_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_enrolled_defaults() {
        let p = Participant::enrolled(SessionId(1), PlayerId(2), Timestamp(5));
        assert_eq!(p.damage_dealt, 0);
        assert!(p.alive);
        assert_eq!(p.joined_at, Timestamp(5));
    }

    #[test]
    fn test_wave_health_fraction() {
        let mut wave = Wave {
            session_id: SessionId(1),
            number: 1,
            enemies: Vec::new(),
            total_health: 200,
            remaining_health: 50,
            is_boss: false,
            completed: false,
        };
        assert_eq!(wave.health_fraction(), 0.25);
        wave.total_health = 0;
        assert_eq!(wave.health_fraction(), 0.0);
    }
}
