//! The [`RaidStore`] trait: every read and write the engine makes.
//!
//! Each method is one atomic unit. Implementations must make the
//! check-and-insert methods (`create_session`, `insert_participant`,
//! `insert_bid`, `settle_drop`, `transition`, `complete_session`)
//! race-free on their own, so
//! the engine can lean on them as uniqueness constraints instead of
//! holding locks across calls.

use raidforge_protocol::{
    Bid, BidDraft, CommunityId, DropDraft, DropId, FailureReason, LootDrop,
    Participant, PlayerId, RaidSession, RaidStatus, SessionDraft, SessionId,
    Timestamp, Wave,
};

use crate::StoreError;

/// A status change applied with [`RaidStore::transition`].
///
/// Completion is not one of them: a session only completes together with
/// its loot, through [`RaidStore::complete_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Enrollment closed with enough players.
    Start,
    /// The session ended early.
    Fail(FailureReason),
}

impl StatusChange {
    /// The status this change moves a session into.
    pub fn target(self) -> RaidStatus {
        match self {
            Self::Start => RaidStatus::InProgress,
            Self::Fail(_) => RaidStatus::Failed,
        }
    }
}

/// Durable storage for raid records.
///
/// `Send + Sync + 'static` because one store is shared by every session
/// actor, the sweeps, and inbound requests.
pub trait RaidStore: Send + Sync + 'static {
    // -- Sessions ---------------------------------------------------------

    /// Inserts a session with its waves and binds it as the community's
    /// active session, all or nothing.
    ///
    /// # Errors
    /// [`StoreError::CommunityBusy`] if the community is already bound.
    fn create_session(&self, draft: SessionDraft) -> Result<RaidSession, StoreError>;

    fn session(&self, id: SessionId) -> Result<RaidSession, StoreError>;

    /// The session currently bound to `community`, if any.
    fn active_session(&self, community: CommunityId) -> Result<Option<SessionId>, StoreError>;

    /// All sessions in `status`, ordered by id.
    fn sessions_with_status(&self, status: RaidStatus) -> Result<Vec<RaidSession>, StoreError>;

    /// Compare-and-set on the session status. Does not touch the community
    /// binding; follow a terminal change with [`release`](Self::release).
    ///
    /// # Errors
    /// - [`StoreError::IllegalTransition`] if `expected → change` is not a
    ///   lifecycle step
    /// - [`StoreError::StatusConflict`] if the session is not in `expected`
    fn transition(
        &self,
        id: SessionId,
        expected: RaidStatus,
        change: StatusChange,
    ) -> Result<RaidSession, StoreError>;

    /// Moves an in-progress session to completed and inserts its drops,
    /// all or nothing. Like [`transition`](Self::transition) it leaves the
    /// community binding alone.
    ///
    /// # Errors
    /// [`StoreError::StatusConflict`] if the session is not in progress.
    fn complete_session(
        &self,
        id: SessionId,
        at: Timestamp,
        drops: Vec<DropDraft>,
    ) -> Result<(RaidSession, Vec<LootDrop>), StoreError>;

    /// Records that every participant's experience has been credited.
    fn mark_rewards_granted(&self, id: SessionId) -> Result<(), StoreError>;

    /// Completed sessions whose experience has not been fully credited.
    fn sessions_awaiting_rewards(&self) -> Result<Vec<RaidSession>, StoreError>;

    /// Removes finished sessions whose hard deadline is at or before
    /// `cutoff`, along with their waves, participants, drops and bids.
    ///
    /// A session is finished once it failed, or once it completed with its
    /// rewards granted and every drop settled. Sessions still bound to a
    /// community are kept. Returns how many were removed.
    fn prune_finished(&self, cutoff: Timestamp) -> Result<usize, StoreError>;

    /// Drops the community binding if it still points at `session`.
    /// Returns whether a binding was removed. Idempotent.
    fn release(&self, community: CommunityId, session: SessionId) -> Result<bool, StoreError>;

    fn set_current_wave(&self, id: SessionId, wave: u32) -> Result<(), StoreError>;

    // -- Waves ------------------------------------------------------------

    /// The session's waves, ordered by number.
    fn waves(&self, session: SessionId) -> Result<Vec<Wave>, StoreError>;

    /// Commits one combat round: adds each participant's damage to their
    /// total and subtracts the sum from the wave (floored at zero). Every
    /// participant is checked before anything is written.
    fn apply_round(
        &self,
        session: SessionId,
        wave: u32,
        damage: &[(PlayerId, u64)],
    ) -> Result<Wave, StoreError>;

    fn complete_wave(&self, session: SessionId, wave: u32) -> Result<Wave, StoreError>;

    // -- Participants -----------------------------------------------------

    /// # Errors
    /// [`StoreError::DuplicateParticipant`] if the player already joined.
    fn insert_participant(&self, participant: Participant) -> Result<(), StoreError>;

    fn participant(
        &self,
        session: SessionId,
        player: PlayerId,
    ) -> Result<Option<Participant>, StoreError>;

    /// Participants in join order.
    fn participants(&self, session: SessionId) -> Result<Vec<Participant>, StoreError>;

    fn set_alive(&self, session: SessionId, player: PlayerId, alive: bool) -> Result<(), StoreError>;

    // -- Loot -------------------------------------------------------------

    fn insert_drops(
        &self,
        session: SessionId,
        drafts: Vec<DropDraft>,
    ) -> Result<Vec<LootDrop>, StoreError>;

    fn loot_drop(&self, id: DropId) -> Result<LootDrop, StoreError>;

    /// The session's drops, ordered by id.
    fn drops(&self, session: SessionId) -> Result<Vec<LootDrop>, StoreError>;

    /// Unsettled drops whose bid deadline is at or before `now`, ordered by
    /// deadline then id.
    fn unsettled_drops_due(&self, now: Timestamp) -> Result<Vec<LootDrop>, StoreError>;

    /// Records a bid and assigns its sequence number.
    ///
    /// # Errors
    /// - [`StoreError::DropSettled`] if the drop was already resolved
    /// - [`StoreError::DuplicateBid`] if the player already bid on it
    fn insert_bid(&self, draft: BidDraft) -> Result<Bid, StoreError>;

    /// Bids on a drop, ordered by sequence number.
    fn bids(&self, drop: DropId) -> Result<Vec<Bid>, StoreError>;

    /// Settles a drop exactly once, with or without a winner.
    ///
    /// # Errors
    /// [`StoreError::DropSettled`] if it was already settled.
    fn settle_drop(
        &self,
        drop: DropId,
        winner: Option<PlayerId>,
        at: Timestamp,
    ) -> Result<LootDrop, StoreError>;
}
