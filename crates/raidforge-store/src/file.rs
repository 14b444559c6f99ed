//! A [`RaidStore`] that writes every change through to a JSON file.
//!
//! Reads are served from memory. Each write runs against the in-memory
//! tables, then the whole snapshot is written to a temporary file, synced,
//! and renamed over the real one. If the disk write fails the in-memory
//! change is rolled back, so memory and disk never disagree.
//!
//! The snapshot holds every record, so the engine prunes finished sessions
//! with [`RaidStore::prune_finished`] to keep it from growing.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use raidforge_protocol::{
    Bid, BidDraft, Codec, CommunityId, DropDraft, DropId, JsonCodec, LootDrop,
    Participant, PlayerId, RaidSession, RaidStatus, SessionDraft, SessionId,
    Timestamp, Wave,
};
use tracing::{info, warn};

use crate::{MemoryStore, RaidStore, Snapshot, StatusChange, StoreError};

pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    /// Serializes writers so snapshots hit the disk in mutation order.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens the store at `path`, loading it if the file exists. A missing
    /// file starts an empty store; nothing is written until the first
    /// change.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let inner = match fs::read(&path) {
            Ok(bytes) => {
                let snapshot: Snapshot = JsonCodec.decode(&bytes)?;
                let store = MemoryStore::from_snapshot(snapshot)?;
                info!(path = %path.display(), "raid store loaded");
                store
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "raid store file missing, starting empty");
                MemoryStore::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        let bytes = JsonCodec.encode(&self.inner.snapshot())?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn write<T>(
        &self,
        op: impl FnOnce(&MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.write_when(op, |_| true)
    }

    /// Runs `op` and persists only if `changed` says it wrote something.
    fn write_when<T>(
        &self,
        op: impl FnOnce(&MemoryStore) -> Result<T, StoreError>,
        changed: impl FnOnce(&T) -> bool,
    ) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let before = self.inner.snapshot();
        let out = op(&self.inner)?;
        if !changed(&out) {
            return Ok(out);
        }
        if let Err(e) = self.persist() {
            warn!(path = %self.path.display(), error = %e, "store write failed, rolling back");
            self.inner.restore(before)?;
            return Err(e);
        }
        Ok(out)
    }
}

impl RaidStore for JsonFileStore {
    fn create_session(&self, draft: SessionDraft) -> Result<RaidSession, StoreError> {
        self.write(|s| s.create_session(draft))
    }

    fn session(&self, id: SessionId) -> Result<RaidSession, StoreError> {
        self.inner.session(id)
    }

    fn active_session(&self, community: CommunityId) -> Result<Option<SessionId>, StoreError> {
        self.inner.active_session(community)
    }

    fn sessions_with_status(&self, status: RaidStatus) -> Result<Vec<RaidSession>, StoreError> {
        self.inner.sessions_with_status(status)
    }

    fn transition(
        &self,
        id: SessionId,
        expected: RaidStatus,
        change: StatusChange,
    ) -> Result<RaidSession, StoreError> {
        self.write(|s| s.transition(id, expected, change))
    }

    fn complete_session(
        &self,
        id: SessionId,
        at: Timestamp,
        drops: Vec<DropDraft>,
    ) -> Result<(RaidSession, Vec<LootDrop>), StoreError> {
        self.write(|s| s.complete_session(id, at, drops))
    }

    fn mark_rewards_granted(&self, id: SessionId) -> Result<(), StoreError> {
        self.write(|s| s.mark_rewards_granted(id))
    }

    fn sessions_awaiting_rewards(&self) -> Result<Vec<RaidSession>, StoreError> {
        self.inner.sessions_awaiting_rewards()
    }

    fn prune_finished(&self, cutoff: Timestamp) -> Result<usize, StoreError> {
        self.write_when(|s| s.prune_finished(cutoff), |&pruned| pruned > 0)
    }

    fn release(&self, community: CommunityId, session: SessionId) -> Result<bool, StoreError> {
        self.write_when(|s| s.release(community, session), |&released| released)
    }

    fn set_current_wave(&self, id: SessionId, wave: u32) -> Result<(), StoreError> {
        self.write(|s| s.set_current_wave(id, wave))
    }

    fn waves(&self, session: SessionId) -> Result<Vec<Wave>, StoreError> {
        self.inner.waves(session)
    }

    fn apply_round(
        &self,
        session: SessionId,
        wave: u32,
        damage: &[(PlayerId, u64)],
    ) -> Result<Wave, StoreError> {
        self.write(|s| s.apply_round(session, wave, damage))
    }

    fn complete_wave(&self, session: SessionId, wave: u32) -> Result<Wave, StoreError> {
        self.write(|s| s.complete_wave(session, wave))
    }

    fn insert_participant(&self, participant: Participant) -> Result<(), StoreError> {
        self.write(|s| s.insert_participant(participant))
    }

    fn participant(
        &self,
        session: SessionId,
        player: PlayerId,
    ) -> Result<Option<Participant>, StoreError> {
        self.inner.participant(session, player)
    }

    fn participants(&self, session: SessionId) -> Result<Vec<Participant>, StoreError> {
        self.inner.participants(session)
    }

    fn set_alive(&self, session: SessionId, player: PlayerId, alive: bool) -> Result<(), StoreError> {
        self.write(|s| s.set_alive(session, player, alive))
    }

    fn insert_drops(
        &self,
        session: SessionId,
        drafts: Vec<DropDraft>,
    ) -> Result<Vec<LootDrop>, StoreError> {
        self.write(|s| s.insert_drops(session, drafts))
    }

    fn loot_drop(&self, id: DropId) -> Result<LootDrop, StoreError> {
        self.inner.loot_drop(id)
    }

    fn drops(&self, session: SessionId) -> Result<Vec<LootDrop>, StoreError> {
        self.inner.drops(session)
    }

    fn unsettled_drops_due(&self, now: Timestamp) -> Result<Vec<LootDrop>, StoreError> {
        self.inner.unsettled_drops_due(now)
    }

    fn insert_bid(&self, draft: BidDraft) -> Result<Bid, StoreError> {
        self.write(|s| s.insert_bid(draft))
    }

    fn bids(&self, drop: DropId) -> Result<Vec<Bid>, StoreError> {
        self.inner.bids(drop)
    }

    fn settle_drop(
        &self,
        drop: DropId,
        winner: Option<PlayerId>,
        at: Timestamp,
    ) -> Result<LootDrop, StoreError> {
        self.write(|s| s.settle_drop(drop, winner, at))
    }
}

#[cfg(test)]
mod tests {
    use raidforge_protocol::{Difficulty, WavePlan};

    use super::*;

    fn draft(community: u64) -> SessionDraft {
        SessionDraft {
            community: CommunityId(community),
            difficulty: Difficulty::Hard,
            min_level: 20,
            created_at: Timestamp(0),
            enrollment_deadline: Timestamp(120_000),
            hard_deadline: Timestamp(1_800_000),
            min_participants: 3,
            max_participants: 10,
            waves: vec![WavePlan {
                enemies: Vec::new(),
                total_health: 300,
                is_boss: true,
            }],
        }
    }

    #[test]
    fn test_reopen_sees_previous_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raids.json");

        let id = {
            let store = JsonFileStore::open(&path).unwrap();
            let id = store.create_session(draft(1)).unwrap().id;
            store
                .insert_participant(Participant::enrolled(id, PlayerId(4), Timestamp(3)))
                .unwrap();
            id
        };

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.session(id).unwrap().difficulty, Difficulty::Hard);
        assert_eq!(store.participants(id).unwrap().len(), 1);
        assert_eq!(store.active_session(CommunityId(1)).unwrap(), Some(id));
        assert!(matches!(
            store.create_session(draft(1)),
            Err(StoreError::CommunityBusy { .. })
        ));
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("absent.json")).unwrap();
        assert!(store.sessions_with_status(RaidStatus::Enrolling).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_failed_write_rolls_back_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("raids.json");
        let store = JsonFileStore::open(&path).unwrap();

        assert!(matches!(store.create_session(draft(1)), Err(StoreError::Io(_))));
        assert_eq!(store.active_session(CommunityId(1)).unwrap(), None);
        assert!(store.sessions_with_status(RaidStatus::Enrolling).unwrap().is_empty());
    }

    #[test]
    fn test_completion_and_prune_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raids.json");
        let store = JsonFileStore::open(&path).unwrap();
        let id = store.create_session(draft(1)).unwrap().id;
        store.transition(id, RaidStatus::Enrolling, StatusChange::Start).unwrap();
        let drop = DropDraft {
            item_id: raidforge_protocol::ItemId(3),
            item_name: "Frost Edge".into(),
            bid_deadline: Timestamp(200_000),
        };
        let (_, drops) = store.complete_session(id, Timestamp(140_000), vec![drop]).unwrap();
        assert!(store.release(CommunityId(1), id).unwrap());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.session(id).unwrap().status, RaidStatus::Completed);
        assert_eq!(reopened.drops(id).unwrap(), drops);

        store.settle_drop(drops[0].id, None, Timestamp(200_000)).unwrap();
        store.mark_rewards_granted(id).unwrap();
        assert_eq!(store.prune_finished(Timestamp(1_800_000)).unwrap(), 1);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(matches!(reopened.session(id), Err(StoreError::SessionNotFound(_))));
        assert!(!dir.path().join("raids.json.tmp").exists());
    }

    #[test]
    fn test_no_op_prune_skips_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raids.json");
        let store = JsonFileStore::open(&path).unwrap();

        assert_eq!(store.prune_finished(Timestamp(0)).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raids.json");
        fs::write(&path, b"{ nope").unwrap();

        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Codec(_))));
    }
}
