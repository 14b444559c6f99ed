//! In-memory [`RaidStore`] backed by one mutex over all tables.
//!
//! One lock for everything keeps every trait method atomic without any
//! lock ordering to get wrong. Contention is low: writes are a handful per
//! combat round.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use raidforge_protocol::{
    Bid, BidDraft, CommunityId, DropDraft, DropId, LootDrop, Participant,
    PlayerId, ProtocolError, RaidSession, RaidStatus, SessionDraft, SessionId,
    Timestamp, Wave,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RaidStore, StatusChange, StoreError};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A point-in-time copy of every table, in a serde-friendly shape.
///
/// This is what [`JsonFileStore`](crate::JsonFileStore) writes to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub next_session: u64,
    pub next_drop: u64,
    pub next_bid_seq: u64,
    pub sessions: Vec<RaidSession>,
    /// `(community, session)` bindings. A binding can briefly outlive its
    /// session's active status; see [`RaidStore::release`].
    pub bindings: Vec<(CommunityId, SessionId)>,
    pub waves: Vec<Wave>,
    pub participants: Vec<Participant>,
    pub drops: Vec<LootDrop>,
    pub bids: Vec<Bid>,
}

impl Snapshot {
    pub const VERSION: u32 = 1;
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    next_session: u64,
    next_drop: u64,
    next_bid_seq: u64,
    sessions: BTreeMap<SessionId, RaidSession>,
    bindings: HashMap<CommunityId, SessionId>,
    /// Ordered by wave number.
    waves: HashMap<SessionId, Vec<Wave>>,
    /// Ordered by join time.
    participants: HashMap<SessionId, Vec<Participant>>,
    drops: BTreeMap<DropId, LootDrop>,
    /// Ordered by sequence number.
    bids: HashMap<DropId, Vec<Bid>>,
}

impl Tables {
    fn session_mut(&mut self, id: SessionId) -> Result<&mut RaidSession, StoreError> {
        self.sessions.get_mut(&id).ok_or(StoreError::SessionNotFound(id))
    }

    fn wave_mut(&mut self, session: SessionId, number: u32) -> Result<&mut Wave, StoreError> {
        self.waves
            .get_mut(&session)
            .and_then(|waves| waves.iter_mut().find(|w| w.number == number))
            .ok_or(StoreError::WaveNotFound(session, number))
    }

    /// Assigns ids to `drafts` and inserts them. The session must exist.
    fn push_drops(&mut self, session: SessionId, drafts: Vec<DropDraft>) -> Vec<LootDrop> {
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = DropId(self.next_drop);
            self.next_drop += 1;
            let drop = LootDrop {
                id,
                session_id: session,
                item_id: draft.item_id,
                item_name: draft.item_name,
                bid_deadline: draft.bid_deadline,
                winner: None,
                settled_at: None,
            };
            self.drops.insert(id, drop.clone());
            created.push(drop);
        }
        created
    }

    fn snapshot(&self) -> Snapshot {
        let mut bindings: Vec<_> = self.bindings.iter().map(|(c, s)| (*c, *s)).collect();
        bindings.sort();

        Snapshot {
            version: Snapshot::VERSION,
            next_session: self.next_session,
            next_drop: self.next_drop,
            next_bid_seq: self.next_bid_seq,
            sessions: self.sessions.values().cloned().collect(),
            bindings,
            waves: self
                .sessions
                .keys()
                .filter_map(|id| self.waves.get(id))
                .flatten()
                .cloned()
                .collect(),
            participants: self
                .sessions
                .keys()
                .filter_map(|id| self.participants.get(id))
                .flatten()
                .cloned()
                .collect(),
            drops: self.drops.values().cloned().collect(),
            bids: self
                .drops
                .keys()
                .filter_map(|id| self.bids.get(id))
                .flatten()
                .cloned()
                .collect(),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        if snapshot.version != Snapshot::VERSION {
            return Err(invalid(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut tables = Tables {
            next_session: snapshot.next_session,
            next_drop: snapshot.next_drop,
            next_bid_seq: snapshot.next_bid_seq,
            ..Tables::default()
        };

        for session in snapshot.sessions {
            if session.id.0 >= tables.next_session {
                return Err(invalid(format!("session {} is past the id counter", session.id)));
            }
            tables.sessions.insert(session.id, session);
        }
        for (community, session) in snapshot.bindings {
            match tables.sessions.get(&session) {
                Some(s) if s.community == community => {
                    tables.bindings.insert(community, session);
                }
                _ => return Err(invalid(format!("binding {community} -> {session} is dangling"))),
            }
        }
        for wave in snapshot.waves {
            if !tables.sessions.contains_key(&wave.session_id) {
                return Err(invalid(format!("wave of unknown session {}", wave.session_id)));
            }
            tables.waves.entry(wave.session_id).or_default().push(wave);
        }
        for waves in tables.waves.values_mut() {
            waves.sort_by_key(|w| w.number);
        }
        for p in snapshot.participants {
            if !tables.sessions.contains_key(&p.session_id) {
                return Err(invalid(format!("participant of unknown session {}", p.session_id)));
            }
            tables.participants.entry(p.session_id).or_default().push(p);
        }
        for drop in snapshot.drops {
            if drop.id.0 >= tables.next_drop {
                return Err(invalid(format!("drop {} is past the id counter", drop.id)));
            }
            tables.drops.insert(drop.id, drop);
        }
        for bid in snapshot.bids {
            if !tables.drops.contains_key(&bid.drop_id) {
                return Err(invalid(format!("bid on unknown drop {}", bid.drop_id)));
            }
            if bid.seq >= tables.next_bid_seq {
                return Err(invalid(format!("bid seq {} is past the counter", bid.seq)));
            }
            tables.bids.entry(bid.drop_id).or_default().push(bid);
        }
        for bids in tables.bids.values_mut() {
            bids.sort_by_key(|b| b.seq);
        }

        Ok(tables)
    }
}

fn invalid(msg: String) -> StoreError {
    StoreError::Codec(ProtocolError::InvalidRecord(msg))
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A [`RaidStore`] that lives entirely in memory.
///
/// Good for tests and for single-process deployments that don't need to
/// survive a restart. Wrap it in [`JsonFileStore`](crate::JsonFileStore)
/// when they do.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a snapshot, checking cross-table references.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        Ok(Self {
            tables: Mutex::new(Tables::from_snapshot(snapshot)?),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tables().snapshot()
    }

    /// Replaces every table with the contents of `snapshot`.
    pub fn restore(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let tables = Tables::from_snapshot(snapshot)?;
        *self.tables() = tables;
        Ok(())
    }

    // A panic while holding the lock can only come from a bug in this file,
    // and every method leaves the tables consistent before it can panic.
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RaidStore for MemoryStore {
    fn create_session(&self, draft: SessionDraft) -> Result<RaidSession, StoreError> {
        let mut t = self.tables();

        if let Some(&active) = t.bindings.get(&draft.community) {
            return Err(StoreError::CommunityBusy {
                community: draft.community,
                active,
            });
        }

        let id = SessionId(t.next_session);
        t.next_session += 1;

        let session = RaidSession {
            id,
            community: draft.community,
            difficulty: draft.difficulty,
            min_level: draft.min_level,
            wave_count: u32::try_from(draft.waves.len()).unwrap_or(u32::MAX),
            current_wave: 0,
            status: RaidStatus::Enrolling,
            failure: None,
            created_at: draft.created_at,
            enrollment_deadline: draft.enrollment_deadline,
            hard_deadline: draft.hard_deadline,
            completed_at: None,
            rewards_granted: false,
            min_participants: draft.min_participants,
            max_participants: draft.max_participants,
        };

        let waves = draft
            .waves
            .into_iter()
            .zip(1u32..)
            .map(|(plan, number)| Wave {
                session_id: id,
                number,
                enemies: plan.enemies,
                total_health: plan.total_health,
                remaining_health: plan.total_health,
                is_boss: plan.is_boss,
                completed: false,
            })
            .collect();

        t.sessions.insert(id, session.clone());
        t.waves.insert(id, waves);
        t.participants.insert(id, Vec::new());
        t.bindings.insert(session.community, id);

        debug!(session_id = %id, community = %session.community, "session stored");
        Ok(session)
    }

    fn session(&self, id: SessionId) -> Result<RaidSession, StoreError> {
        self.tables()
            .sessions
            .get(&id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(id))
    }

    fn active_session(&self, community: CommunityId) -> Result<Option<SessionId>, StoreError> {
        Ok(self.tables().bindings.get(&community).copied())
    }

    fn sessions_with_status(&self, status: RaidStatus) -> Result<Vec<RaidSession>, StoreError> {
        Ok(self
            .tables()
            .sessions
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    fn transition(
        &self,
        id: SessionId,
        expected: RaidStatus,
        change: StatusChange,
    ) -> Result<RaidSession, StoreError> {
        let target = change.target();
        if !expected.can_transition_to(target) {
            return Err(StoreError::IllegalTransition {
                session: id,
                from: expected,
                to: target,
            });
        }

        let mut t = self.tables();
        let session = t.session_mut(id)?;
        if session.status != expected {
            return Err(StoreError::StatusConflict {
                session: id,
                expected,
                actual: session.status,
            });
        }

        session.status = target;
        if let StatusChange::Fail(reason) = change {
            session.failure = Some(reason);
        }
        let session = session.clone();

        debug!(session_id = %id, from = %expected, to = %target, "session transitioned");
        Ok(session)
    }

    fn complete_session(
        &self,
        id: SessionId,
        at: Timestamp,
        drops: Vec<DropDraft>,
    ) -> Result<(RaidSession, Vec<LootDrop>), StoreError> {
        let mut t = self.tables();
        let session = t.session_mut(id)?;
        if session.status != RaidStatus::InProgress {
            return Err(StoreError::StatusConflict {
                session: id,
                expected: RaidStatus::InProgress,
                actual: session.status,
            });
        }

        session.status = RaidStatus::Completed;
        session.completed_at = Some(at);
        let session = session.clone();
        let drops = t.push_drops(id, drops);

        debug!(session_id = %id, drops = drops.len(), "session completed");
        Ok((session, drops))
    }

    fn mark_rewards_granted(&self, id: SessionId) -> Result<(), StoreError> {
        self.tables().session_mut(id)?.rewards_granted = true;
        Ok(())
    }

    fn sessions_awaiting_rewards(&self) -> Result<Vec<RaidSession>, StoreError> {
        Ok(self
            .tables()
            .sessions
            .values()
            .filter(|s| s.status == RaidStatus::Completed && !s.rewards_granted)
            .cloned()
            .collect())
    }

    fn prune_finished(&self, cutoff: Timestamp) -> Result<usize, StoreError> {
        let mut t = self.tables();
        let doomed: Vec<SessionId> = t
            .sessions
            .values()
            .filter(|s| cutoff.has_reached(s.hard_deadline))
            .filter(|s| t.bindings.get(&s.community) != Some(&s.id))
            .filter(|s| match s.status {
                RaidStatus::Failed => true,
                RaidStatus::Completed => {
                    s.rewards_granted
                        && t.drops.values().all(|d| d.session_id != s.id || d.is_settled())
                }
                RaidStatus::Enrolling | RaidStatus::InProgress => false,
            })
            .map(|s| s.id)
            .collect();

        for id in &doomed {
            t.sessions.remove(id);
            t.waves.remove(id);
            t.participants.remove(id);
            let drops: Vec<DropId> = t
                .drops
                .values()
                .filter(|d| d.session_id == *id)
                .map(|d| d.id)
                .collect();
            for drop in drops {
                t.drops.remove(&drop);
                t.bids.remove(&drop);
            }
        }

        if !doomed.is_empty() {
            debug!(sessions = doomed.len(), %cutoff, "finished sessions pruned");
        }
        Ok(doomed.len())
    }

    fn release(&self, community: CommunityId, session: SessionId) -> Result<bool, StoreError> {
        let mut t = self.tables();
        if t.bindings.get(&community) == Some(&session) {
            t.bindings.remove(&community);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn set_current_wave(&self, id: SessionId, wave: u32) -> Result<(), StoreError> {
        self.tables().session_mut(id)?.current_wave = wave;
        Ok(())
    }

    fn waves(&self, session: SessionId) -> Result<Vec<Wave>, StoreError> {
        let t = self.tables();
        if !t.sessions.contains_key(&session) {
            return Err(StoreError::SessionNotFound(session));
        }
        Ok(t.waves.get(&session).cloned().unwrap_or_default())
    }

    fn apply_round(
        &self,
        session: SessionId,
        wave: u32,
        damage: &[(PlayerId, u64)],
    ) -> Result<Wave, StoreError> {
        let mut t = self.tables();

        // Validate everything first so a bad entry writes nothing.
        t.wave_mut(session, wave)?;
        let roster = t
            .participants
            .get(&session)
            .ok_or(StoreError::SessionNotFound(session))?;
        for (player, _) in damage {
            if !roster.iter().any(|p| p.player == *player) {
                return Err(StoreError::ParticipantNotFound(session, *player));
            }
        }

        let mut total = 0u64;
        if let Some(roster) = t.participants.get_mut(&session) {
            for (player, amount) in damage {
                if let Some(p) = roster.iter_mut().find(|p| p.player == *player) {
                    p.damage_dealt = p.damage_dealt.saturating_add(*amount);
                }
                total = total.saturating_add(*amount);
            }
        }

        let wave = t.wave_mut(session, wave)?;
        wave.remaining_health = wave.remaining_health.saturating_sub(total);
        Ok(wave.clone())
    }

    fn complete_wave(&self, session: SessionId, wave: u32) -> Result<Wave, StoreError> {
        let mut t = self.tables();
        let wave = t.wave_mut(session, wave)?;
        wave.completed = true;
        Ok(wave.clone())
    }

    fn insert_participant(&self, participant: Participant) -> Result<(), StoreError> {
        let mut t = self.tables();
        let session = participant.session_id;
        if !t.sessions.contains_key(&session) {
            return Err(StoreError::SessionNotFound(session));
        }

        let roster = t.participants.entry(session).or_default();
        if roster.iter().any(|p| p.player == participant.player) {
            return Err(StoreError::DuplicateParticipant(session, participant.player));
        }
        roster.push(participant);
        Ok(())
    }

    fn participant(
        &self,
        session: SessionId,
        player: PlayerId,
    ) -> Result<Option<Participant>, StoreError> {
        Ok(self
            .tables()
            .participants
            .get(&session)
            .and_then(|roster| roster.iter().find(|p| p.player == player))
            .cloned())
    }

    fn participants(&self, session: SessionId) -> Result<Vec<Participant>, StoreError> {
        let t = self.tables();
        if !t.sessions.contains_key(&session) {
            return Err(StoreError::SessionNotFound(session));
        }
        Ok(t.participants.get(&session).cloned().unwrap_or_default())
    }

    fn set_alive(&self, session: SessionId, player: PlayerId, alive: bool) -> Result<(), StoreError> {
        let mut t = self.tables();
        let participant = t
            .participants
            .get_mut(&session)
            .and_then(|roster| roster.iter_mut().find(|p| p.player == player))
            .ok_or(StoreError::ParticipantNotFound(session, player))?;
        participant.alive = alive;
        Ok(())
    }

    fn insert_drops(
        &self,
        session: SessionId,
        drafts: Vec<DropDraft>,
    ) -> Result<Vec<LootDrop>, StoreError> {
        let mut t = self.tables();
        if !t.sessions.contains_key(&session) {
            return Err(StoreError::SessionNotFound(session));
        }
        Ok(t.push_drops(session, drafts))
    }

    fn loot_drop(&self, id: DropId) -> Result<LootDrop, StoreError> {
        self.tables()
            .drops
            .get(&id)
            .cloned()
            .ok_or(StoreError::DropNotFound(id))
    }

    fn drops(&self, session: SessionId) -> Result<Vec<LootDrop>, StoreError> {
        Ok(self
            .tables()
            .drops
            .values()
            .filter(|d| d.session_id == session)
            .cloned()
            .collect())
    }

    fn unsettled_drops_due(&self, now: Timestamp) -> Result<Vec<LootDrop>, StoreError> {
        let mut due: Vec<_> = self
            .tables()
            .drops
            .values()
            .filter(|d| !d.is_settled() && now.has_reached(d.bid_deadline))
            .cloned()
            .collect();
        due.sort_by_key(|d| (d.bid_deadline, d.id));
        Ok(due)
    }

    fn insert_bid(&self, draft: BidDraft) -> Result<Bid, StoreError> {
        let mut t = self.tables();
        let drop = t
            .drops
            .get(&draft.drop_id)
            .ok_or(StoreError::DropNotFound(draft.drop_id))?;
        if drop.is_settled() {
            return Err(StoreError::DropSettled(draft.drop_id));
        }
        if t
            .bids
            .get(&draft.drop_id)
            .is_some_and(|bids| bids.iter().any(|b| b.player == draft.player))
        {
            return Err(StoreError::DuplicateBid(draft.drop_id, draft.player));
        }

        let seq = t.next_bid_seq;
        t.next_bid_seq += 1;
        let bid = Bid {
            drop_id: draft.drop_id,
            player: draft.player,
            category: draft.category,
            roll: draft.roll,
            placed_at: draft.placed_at,
            seq,
        };
        t.bids.entry(bid.drop_id).or_default().push(bid.clone());
        Ok(bid)
    }

    fn bids(&self, drop: DropId) -> Result<Vec<Bid>, StoreError> {
        let t = self.tables();
        if !t.drops.contains_key(&drop) {
            return Err(StoreError::DropNotFound(drop));
        }
        Ok(t.bids.get(&drop).cloned().unwrap_or_default())
    }

    fn settle_drop(
        &self,
        drop: DropId,
        winner: Option<PlayerId>,
        at: Timestamp,
    ) -> Result<LootDrop, StoreError> {
        let mut t = self.tables();
        let record = t.drops.get_mut(&drop).ok_or(StoreError::DropNotFound(drop))?;
        if record.is_settled() {
            return Err(StoreError::DropSettled(drop));
        }
        record.winner = winner;
        record.settled_at = Some(at);
        Ok(record.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
