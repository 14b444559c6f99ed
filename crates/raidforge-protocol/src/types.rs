//! Identity types, timestamps, and the lifecycle enums shared by every
//! Raidforge crate.
//!
//! Everything in here is plain data: serializable, cheap to copy, and free
//! of behavior beyond small lookup tables (difficulty multipliers, drop
//! counts) and state-machine checks.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Declares a `u64` newtype identifier with a short display prefix.
///
/// All identifiers serialize as the bare integer (`#[serde(transparent)]`),
/// so `SessionId(7)` is just `7` in JSON but prints as `S-7` in logs.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(
    /// A community (guild) that hosts raids. At most one raid may be
    /// active per community.
    CommunityId,
    "C"
);

id_type!(
    /// A player identity, as known to the profile store.
    PlayerId,
    "P"
);

id_type!(
    /// One raid encounter instance. Assigned by the store on creation.
    SessionId,
    "S"
);

id_type!(
    /// One loot drop produced by a completed raid.
    DropId,
    "D"
);

id_type!(
    /// An item definition in the item catalog.
    ItemId,
    "I"
);

id_type!(
    /// An enemy definition in the enemy catalog.
    EnemyId,
    "E"
);

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Milliseconds since the UNIX epoch.
///
/// Stored records carry wall-clock timestamps so that a restarted process
/// can compare deadlines against its own clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
    Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Builds a timestamp from whole milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// The raw millisecond value.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// `self + d`, saturating at `u64::MAX`.
    pub fn saturating_add(self, d: Duration) -> Self {
        let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// `self - d`, saturating at zero.
    pub fn saturating_sub(self, d: Duration) -> Self {
        let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_sub(millis))
    }

    /// Time remaining from `self` until `later`, or zero if `later` has
    /// already passed.
    pub fn duration_until(self, later: Timestamp) -> Duration {
        Duration::from_millis(later.0.saturating_sub(self.0))
    }

    /// Returns `true` once `self` is at or past `deadline`.
    pub fn has_reached(self, deadline: Timestamp) -> bool {
        self >= deadline
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Raid difficulty tier. Scales wave health and the number of loot drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Nightmare,
}

impl Difficulty {
    /// Every tier, easiest first.
    pub const ALL: [Difficulty; 4] =
        [Self::Easy, Self::Normal, Self::Hard, Self::Nightmare];

    /// Multiplier applied to enemy counts and wave health pools.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Easy => 0.7,
            Self::Normal => 1.0,
            Self::Hard => 1.5,
            Self::Nightmare => 2.5,
        }
    }

    /// Number of loot drops generated when a raid of this tier completes.
    pub fn drop_count(self) -> usize {
        match self {
            Self::Easy => 2,
            Self::Normal => 3,
            Self::Hard => 4,
            Self::Nightmare => 6,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
            Self::Nightmare => "nightmare",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown difficulty name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown difficulty {0:?} (expected easy, normal, hard, or nightmare)")]
pub struct UnknownDifficulty(pub String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    /// Case-insensitive: `"Hard"` and `"hard"` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == lowered)
            .ok_or_else(|| UnknownDifficulty(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RaidStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a raid session.
///
/// ```text
/// Enrolling ──→ InProgress ──→ Completed
///     │             │
///     └──→ Failed ←─┘
/// ```
///
/// `Completed` and `Failed` are terminal. A community may hold at most one
/// session in a non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidStatus {
    Enrolling,
    InProgress,
    Completed,
    Failed,
}

impl RaidStatus {
    /// Returns `true` while players may still join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Enrolling)
    }

    /// Returns `true` for `Enrolling` and `InProgress`.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Enrolling | Self::InProgress)
    }

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Returns `true` if moving from `self` to `target` is a legal
    /// lifecycle step.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Enrolling, Self::InProgress)
                | (Self::Enrolling, Self::Failed)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }
}

impl fmt::Display for RaidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enrolling => write!(f, "Enrolling"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Why a session ended in [`RaidStatus::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Enrollment closed with fewer participants than the session minimum.
    InsufficientParticipants,
    /// No participant was alive at the start of a combat round.
    Wipe,
    /// The expiry sweep found the session past its hard deadline.
    Expired,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientParticipants => write!(f, "insufficient participants"),
            Self::Wipe => write!(f, "wipe"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loot enums
// ---------------------------------------------------------------------------

/// Loot bid category. `Need` always outranks `Greed`; `Pass` never wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidCategory {
    Need,
    Greed,
    Pass,
}

impl BidCategory {
    /// Whether bids of this category carry a roll value.
    pub fn rolls(self) -> bool {
        !matches!(self, Self::Pass)
    }
}

impl fmt::Display for BidCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Need => write!(f, "need"),
            Self::Greed => write!(f, "greed"),
            Self::Pass => write!(f, "pass"),
        }
    }
}

/// Item rarity, ordered from least to most valuable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_prefixes() {
        assert_eq!(SessionId(7).to_string(), "S-7");
        assert_eq!(PlayerId(42).to_string(), "P-42");
        assert_eq!(CommunityId(1).to_string(), "C-1");
        assert_eq!(DropId(3).to_string(), "D-3");
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_millis(1_000);
        let later = t.saturating_add(Duration::from_secs(60));
        assert_eq!(later.as_millis(), 61_000);
        assert_eq!(t.duration_until(later), Duration::from_secs(60));
        assert_eq!(later.duration_until(t), Duration::ZERO);
        assert!(later.has_reached(later));
        assert!(!t.has_reached(later));
    }

    #[test]
    fn test_difficulty_tables() {
        assert_eq!(Difficulty::Easy.multiplier(), 0.7);
        assert_eq!(Difficulty::Normal.multiplier(), 1.0);
        assert_eq!(Difficulty::Hard.multiplier(), 1.5);
        assert_eq!(Difficulty::Nightmare.multiplier(), 2.5);

        let drops: Vec<usize> =
            Difficulty::ALL.iter().map(|d| d.drop_count()).collect();
        assert_eq!(drops, vec![2, 3, 4, 6]);
    }

    #[test]
    fn test_difficulty_parse_is_case_insensitive() {
        assert_eq!("Nightmare".parse::<Difficulty>(), Ok(Difficulty::Nightmare));
        assert_eq!(" easy ".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("heroic".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        use RaidStatus::*;
        assert!(Enrolling.can_transition_to(InProgress));
        assert!(Enrolling.can_transition_to(Failed));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(!Enrolling.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(InProgress));
    }

    #[test]
    fn test_status_activity() {
        assert!(RaidStatus::Enrolling.is_active());
        assert!(RaidStatus::InProgress.is_active());
        assert!(RaidStatus::Completed.is_terminal());
        assert!(RaidStatus::Failed.is_terminal());
        assert!(RaidStatus::Enrolling.is_joinable());
        assert!(!RaidStatus::InProgress.is_joinable());
    }

    #[test]
    fn test_bid_category_rolls() {
        assert!(BidCategory::Need.rolls());
        assert!(BidCategory::Greed.rolls());
        assert!(!BidCategory::Pass.rolls());
    }

    #[test]
    fn test_rarity_ordering() {
        assert!(Rarity::Mythic > Rarity::Legendary);
        assert!(Rarity::Common < Rarity::Uncommon);
    }
}
