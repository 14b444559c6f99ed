//! Error types for the store layer.

use raidforge_protocol::{
    CommunityId, DropId, PlayerId, ProtocolError, RaidStatus, SessionId,
};

/// Errors returned by [`RaidStore`](crate::RaidStore) implementations.
///
/// The uniqueness variants (`CommunityBusy`, `DuplicateParticipant`,
/// `DuplicateBid`, `DropSettled`, `StatusConflict`) mean the write was
/// refused and nothing changed. Callers turn them into rejections.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("drop {0} not found")]
    DropNotFound(DropId),

    #[error("wave {1} of session {0} not found")]
    WaveNotFound(SessionId, u32),

    #[error("player {1} is not a participant of session {0}")]
    ParticipantNotFound(SessionId, PlayerId),

    /// The community already has an enrolling or in-progress session.
    #[error("community {community} already has active session {active}")]
    CommunityBusy {
        community: CommunityId,
        active: SessionId,
    },

    #[error("player {1} already joined session {0}")]
    DuplicateParticipant(SessionId, PlayerId),

    #[error("player {1} already bid on drop {0}")]
    DuplicateBid(DropId, PlayerId),

    /// The drop's resolution already ran.
    #[error("drop {0} is already settled")]
    DropSettled(DropId),

    /// Compare-and-set on the session status lost: someone else moved it.
    #[error("session {session} is {actual}, expected {expected}")]
    StatusConflict {
        session: SessionId,
        expected: RaidStatus,
        actual: RaidStatus,
    },

    /// The requested change is not a legal lifecycle step.
    #[error("session {session} cannot move from {from} to {to}")]
    IllegalTransition {
        session: SessionId,
        from: RaidStatus,
        to: RaidStatus,
    },

    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] ProtocolError),
}
