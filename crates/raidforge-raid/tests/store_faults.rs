//! Raids against collaborators that fail at the worst moment: an item
//! catalog that is down when a raid completes, and a store that loses a
//! settlement write after the winner was already credited.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use raidforge_protocol::{
    Bid, BidCategory, BidDraft, CommunityId, Difficulty, DropDraft, DropId,
    EnemyId, FailureReason, ItemId, LootDrop, Participant, PlayerId,
    RaidSession, RaidStatus, Rarity, SessionDraft, SessionId, Timestamp, Wave,
};
use raidforge_raid::{
    CatalogError, ChannelMessenger, Collaborators, EnemyDef, InMemoryProfiles,
    ItemCatalog, ItemDef, RaidConfig, RaidEngine, StaticCatalog,
};
use raidforge_store::{MemoryStore, RaidStore, StatusChange, StoreError};
use raidforge_tick::TokioClock;

// =========================================================================
// Faulty collaborators
// =========================================================================

/// Item catalog that fails its next `failures` lookups.
struct FlakyItems {
    inner: StaticCatalog,
    failures: AtomicUsize,
}

impl ItemCatalog for FlakyItems {
    fn items_up_to_level(&self, max_level: u32) -> Result<Vec<ItemDef>, CatalogError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(CatalogError::Backend("item service unreachable".into()));
        }
        self.inner.items_up_to_level(max_level)
    }
}

/// Memory store whose next `settle_drop` fails with an io error once armed.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_next_settle: AtomicBool,
}

impl RaidStore for FlakyStore {
    fn create_session(&self, draft: SessionDraft) -> Result<RaidSession, StoreError> {
        self.inner.create_session(draft)
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
        self.inner.transition(id, expected, change)
    }

    fn complete_session(
        &self,
        id: SessionId,
        at: Timestamp,
        drops: Vec<DropDraft>,
    ) -> Result<(RaidSession, Vec<LootDrop>), StoreError> {
        self.inner.complete_session(id, at, drops)
    }

    fn mark_rewards_granted(&self, id: SessionId) -> Result<(), StoreError> {
        self.inner.mark_rewards_granted(id)
    }

    fn sessions_awaiting_rewards(&self) -> Result<Vec<RaidSession>, StoreError> {
        self.inner.sessions_awaiting_rewards()
    }

    fn prune_finished(&self, cutoff: Timestamp) -> Result<usize, StoreError> {
        self.inner.prune_finished(cutoff)
    }

    fn release(&self, community: CommunityId, session: SessionId) -> Result<bool, StoreError> {
        self.inner.release(community, session)
    }

    fn set_current_wave(&self, id: SessionId, wave: u32) -> Result<(), StoreError> {
        self.inner.set_current_wave(id, wave)
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
        self.inner.apply_round(session, wave, damage)
    }

    fn complete_wave(&self, session: SessionId, wave: u32) -> Result<Wave, StoreError> {
        self.inner.complete_wave(session, wave)
    }

    fn insert_participant(&self, participant: Participant) -> Result<(), StoreError> {
        self.inner.insert_participant(participant)
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
        self.inner.set_alive(session, player, alive)
    }

    fn insert_drops(
        &self,
        session: SessionId,
        drafts: Vec<DropDraft>,
    ) -> Result<Vec<LootDrop>, StoreError> {
        self.inner.insert_drops(session, drafts)
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
        self.inner.insert_bid(draft)
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
        if self.fail_next_settle.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.settle_drop(drop, winner, at)
    }
}

// =========================================================================
// Harness
// =========================================================================

const GUILD: CommunityId = CommunityId(3);
const T0: Timestamp = Timestamp::from_millis(1_700_000_000_000);

fn catalog() -> StaticCatalog {
    let enemies = [("Ghoul", 5, 40), ("Wraith", 6, 60), ("Bone Golem", 8, 120), ("Lich King", 10, 200)]
        .into_iter()
        .zip(1..)
        .map(|((name, level, health), id)| EnemyDef {
            id: EnemyId(id),
            name: name.into(),
            level,
            health,
        })
        .collect();
    let items = [
        ("Rusty Blade", Rarity::Common),
        ("Ghoulhide Boots", Rarity::Uncommon),
        ("Wraithcloak", Rarity::Rare),
        ("Crown of the Lich", Rarity::Epic),
    ]
    .into_iter()
    .zip(1..)
    .map(|((name, rarity), id)| ItemDef {
        id: ItemId(id),
        name: name.into(),
        level_required: 5,
        rarity,
    })
    .collect();
    StaticCatalog::new(enemies, items)
}

struct Harness {
    engine: RaidEngine,
    store: Arc<FlakyStore>,
    items: Arc<FlakyItems>,
    profiles: Arc<InMemoryProfiles>,
}

fn harness(item_failures: usize) -> Harness {
    let store = Arc::new(FlakyStore::default());
    let profiles = Arc::new(InMemoryProfiles::new());
    for player in 1..=3 {
        profiles.insert(PlayerId(player), 10, 50);
    }
    let items = Arc::new(FlakyItems {
        inner: catalog(),
        failures: AtomicUsize::new(item_failures),
    });
    let (messenger, _announcements) = ChannelMessenger::new();

    let engine = RaidEngine::new(
        RaidConfig::default(),
        Collaborators {
            store: store.clone(),
            profiles: profiles.clone(),
            enemies: Arc::new(catalog()),
            items: items.clone(),
            messenger: Arc::new(messenger),
            clock: Arc::new(TokioClock::starting_at(T0)),
        },
    );

    Harness {
        engine,
        store,
        items,
        profiles,
    }
}

async fn start_raid(h: &Harness) -> SessionId {
    let session = h.engine.create_session(GUILD, Difficulty::Normal, 5).await.unwrap();
    for player in 1..=3 {
        h.engine.join(session.id, PlayerId(player)).await.unwrap();
    }
    session.id
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..3600 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("condition never held");
}

// =========================================================================
// Completion
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_catalog_outage_delays_completion_until_loot_is_written() {
    let h = harness(2);
    let id = start_raid(&h).await;

    wait_until(|| h.engine.status(id).unwrap().session.status == RaidStatus::Completed).await;

    let view = h.engine.status(id).unwrap();
    assert_eq!(h.items.failures.load(Ordering::SeqCst), 0);
    assert_eq!(view.drops.len(), 3);
    let closes = view.session.completed_at.unwrap().saturating_add(Duration::from_secs(60));
    assert!(view.drops.iter().all(|d| d.bid_deadline == closes));
    assert_eq!(h.engine.active_session(GUILD).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_catalog_down_until_deadline_fails_raid_cleanly() {
    let h = harness(usize::MAX);
    let id = start_raid(&h).await;

    // Every wave falls, but completion cannot write its loot.
    wait_until(|| h.engine.status(id).unwrap().waves.iter().all(|w| w.completed)).await;
    assert_eq!(h.engine.status(id).unwrap().session.status, RaidStatus::InProgress);

    wait_until(|| h.engine.sweep_expired().unwrap() == 1).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let view = h.engine.status(id).unwrap();
    assert_eq!(view.session.status, RaidStatus::Failed);
    assert_eq!(view.session.failure, Some(FailureReason::Expired));
    assert!(view.drops.is_empty());
    assert_eq!(view.session.completed_at, None);
    assert_eq!(h.engine.live_sessions().await, 0);
    assert_eq!(h.engine.active_session(GUILD).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_recover_completes_raid_stuck_on_catalog() {
    let h = harness(usize::MAX);
    let id = start_raid(&h).await;
    wait_until(|| h.engine.status(id).unwrap().waves.iter().all(|w| w.completed)).await;

    h.engine.shutdown().await;
    h.items.failures.store(0, Ordering::SeqCst);
    assert_eq!(h.engine.recover().await.unwrap(), 1);

    wait_until(|| h.engine.status(id).unwrap().session.status == RaidStatus::Completed).await;
    assert_eq!(h.engine.status(id).unwrap().drops.len(), 3);
}

// =========================================================================
// Settlement
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_lost_settlement_never_credits_twice() {
    let h = harness(0);
    let id = start_raid(&h).await;
    wait_until(|| h.engine.status(id).unwrap().session.status == RaidStatus::Completed).await;

    let drops = h.engine.status(id).unwrap().drops;
    let first = drops[0].clone();
    h.engine.bid(first.id, PlayerId(1), BidCategory::Need).await.unwrap();

    h.store.fail_next_settle.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(61)).await;

    // The first drop was credited but its settlement was lost.
    assert_eq!(h.engine.sweep_loot().await.unwrap(), 2);
    assert!(!h.store.loot_drop(first.id).unwrap().is_settled());

    assert_eq!(h.engine.sweep_loot().await.unwrap(), 1);
    assert_eq!(h.store.loot_drop(first.id).unwrap().winner, Some(PlayerId(1)));

    let inventory = h.profiles.profile(PlayerId(1)).unwrap().inventory;
    assert_eq!(inventory.get(&first.item_id), Some(&1));
    assert_eq!(inventory.values().sum::<u32>(), 1);
}
