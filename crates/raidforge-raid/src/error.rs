//! Error types for the raid engine.

use raidforge_protocol::{CommunityId, DropId, PlayerId, SessionId};
use raidforge_store::StoreError;

/// The profile collaborator could not answer.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("player {0} has no profile")]
    UnknownPlayer(PlayerId),

    #[error("profile backend failed: {0}")]
    Backend(String),
}

/// An enemy or item catalog could not answer.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog backend failed: {0}")]
    Backend(String),
}

/// An announcement could not be handed to the gateway.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// Nobody is listening any more.
    #[error("announcement channel closed")]
    Closed,

    #[error("messaging backend failed: {0}")]
    Backend(String),
}

/// Errors returned by [`RaidEngine`](crate::RaidEngine) operations.
///
/// Rejections (see [`is_rejection`](Self::is_rejection)) mean the request
/// was refused and nothing was written. The rest are infrastructure
/// failures.
#[derive(Debug, thiserror::Error)]
pub enum RaidError {
    // -- Rejections -------------------------------------------------------
    /// The community already has an enrolling or in-progress raid.
    #[error("community {community} already has active session {session}")]
    AlreadyActive {
        community: CommunityId,
        session: SessionId,
    },

    /// Not enough enemy kinds in the level band to build the waves.
    #[error("enemy catalog has {found} kinds in band, need {required}")]
    InsufficientCatalog { found: usize, required: usize },

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {0} is not accepting players")]
    NotEnrolling(SessionId),

    #[error("player {0} already joined session {1}")]
    AlreadyJoined(PlayerId, SessionId),

    #[error("player {player} is level {level}, session requires {required}")]
    BelowMinimumLevel {
        player: PlayerId,
        level: u32,
        required: u32,
    },

    #[error("session {0} is full")]
    Full(SessionId),

    #[error("drop {0} not found")]
    DropNotFound(DropId),

    #[error("player {0} did not take part in session {1}")]
    NotParticipant(PlayerId, SessionId),

    #[error("player {0} already bid on drop {1}")]
    AlreadyBid(PlayerId, DropId),

    /// The drop was already awarded or wasted.
    #[error("drop {0} is already resolved")]
    DropResolved(DropId),

    /// The drop's bid window has closed; it is waiting for the loot sweep.
    #[error("bidding on drop {0} has closed")]
    BiddingClosed(DropId),

    // -- Failures ---------------------------------------------------------
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(StoreError),

    /// The session actor's command channel is closed.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}

impl RaidError {
    /// Returns `true` for refusals that leave stored state untouched.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::AlreadyActive { .. }
                | Self::InsufficientCatalog { .. }
                | Self::SessionNotFound(_)
                | Self::NotEnrolling(_)
                | Self::AlreadyJoined(..)
                | Self::BelowMinimumLevel { .. }
                | Self::Full(_)
                | Self::DropNotFound(_)
                | Self::NotParticipant(..)
                | Self::AlreadyBid(..)
                | Self::DropResolved(_)
                | Self::BiddingClosed(_)
        )
    }
}

/// Store constraint violations surface as the matching rejection.
impl From<StoreError> for RaidError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CommunityBusy { community, active } => Self::AlreadyActive {
                community,
                session: active,
            },
            StoreError::DuplicateParticipant(session, player) => {
                Self::AlreadyJoined(player, session)
            }
            StoreError::DuplicateBid(drop, player) => Self::AlreadyBid(player, drop),
            StoreError::DropSettled(drop) => Self::DropResolved(drop),
            StoreError::SessionNotFound(session) => Self::SessionNotFound(session),
            StoreError::DropNotFound(drop) => Self::DropNotFound(drop),
            other => Self::Store(other),
        }
    }
}
