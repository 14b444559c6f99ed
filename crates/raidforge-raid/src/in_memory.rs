//! In-memory collaborators for tests, demos and single-process bots.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use raidforge_protocol::{
    Announcement, CommunityId, DropId, ItemId, PlayerId, SessionId,
};
use tokio::sync::mpsc;

use crate::{
    CatalogError, EnemyCatalog, EnemyDef, ItemCatalog, ItemDef, MessagingError,
    Messenger, ProfileError, ProfileStore,
};

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A player's profile as kept by [`InMemoryProfiles`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub level: u32,
    pub attack: u64,
    pub experience: u64,
    /// Item id to quantity held.
    pub inventory: HashMap<ItemId, u32>,
}

/// Profiles held in a map.
///
/// Remembers which drops and sessions it has already credited, so repeated
/// credits are no-ops. [`fail_grants`](Self::fail_grants) and
/// [`fail_awards`](Self::fail_awards) make credits fail until switched
/// back, for exercising the retry paths.
#[derive(Debug, Default)]
pub struct InMemoryProfiles {
    inner: Mutex<Ledger>,
    fail_grants: AtomicBool,
    fail_awards: AtomicBool,
}

#[derive(Debug, Default)]
struct Ledger {
    profiles: HashMap<PlayerId, Profile>,
    granted: HashSet<DropId>,
    awarded: HashSet<(SessionId, PlayerId)>,
}

impl Ledger {
    fn profile_mut(&mut self, player: PlayerId) -> Result<&mut Profile, ProfileError> {
        self.profiles
            .get_mut(&player)
            .ok_or(ProfileError::UnknownPlayer(player))
    }
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a player's profile.
    pub fn insert(&self, player: PlayerId, level: u32, attack: u64) {
        self.lock().profiles.insert(
            player,
            Profile {
                level,
                attack,
                ..Profile::default()
            },
        );
    }

    pub fn profile(&self, player: PlayerId) -> Option<Profile> {
        self.lock().profiles.get(&player).cloned()
    }

    pub fn fail_grants(&self, fail: bool) {
        self.fail_grants.store(fail, Ordering::SeqCst);
    }

    pub fn fail_awards(&self, fail: bool) {
        self.fail_awards.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProfileStore for InMemoryProfiles {
    fn level(&self, player: PlayerId) -> Result<u32, ProfileError> {
        Ok(self.lock().profile_mut(player)?.level)
    }

    fn effective_attack(&self, player: PlayerId) -> Result<u64, ProfileError> {
        Ok(self.lock().profile_mut(player)?.attack)
    }

    fn grant_item(&self, player: PlayerId, item: ItemId, drop: DropId) -> Result<(), ProfileError> {
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(ProfileError::Backend("inventory unavailable".into()));
        }
        let mut ledger = self.lock();
        if ledger.granted.contains(&drop) {
            return Ok(());
        }
        *ledger.profile_mut(player)?.inventory.entry(item).or_default() += 1;
        ledger.granted.insert(drop);
        Ok(())
    }

    fn award_experience(
        &self,
        player: PlayerId,
        amount: u64,
        session: SessionId,
    ) -> Result<(), ProfileError> {
        if self.fail_awards.load(Ordering::SeqCst) {
            return Err(ProfileError::Backend("experience ledger unavailable".into()));
        }
        let mut ledger = self.lock();
        if ledger.awarded.contains(&(session, player)) {
            return Ok(());
        }
        let profile = ledger.profile_mut(player)?;
        profile.experience = profile.experience.saturating_add(amount);
        ledger.awarded.insert((session, player));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A fixed list of enemies and items.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    enemies: Vec<EnemyDef>,
    items: Vec<ItemDef>,
}

impl StaticCatalog {
    pub fn new(enemies: Vec<EnemyDef>, items: Vec<ItemDef>) -> Self {
        Self { enemies, items }
    }
}

impl EnemyCatalog for StaticCatalog {
    fn enemies_in_band(&self, min_level: u32, max_level: u32) -> Result<Vec<EnemyDef>, CatalogError> {
        Ok(self
            .enemies
            .iter()
            .filter(|e| (min_level..=max_level).contains(&e.level))
            .cloned()
            .collect())
    }
}

impl ItemCatalog for StaticCatalog {
    fn items_up_to_level(&self, max_level: u32) -> Result<Vec<ItemDef>, CatalogError> {
        Ok(self
            .items
            .iter()
            .filter(|i| i.level_required <= max_level)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Messenger
// ---------------------------------------------------------------------------

/// Receiving end of a [`ChannelMessenger`].
pub type AnnouncementReceiver = mpsc::UnboundedReceiver<(CommunityId, Announcement)>;

/// Forwards announcements into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelMessenger {
    sender: mpsc::UnboundedSender<(CommunityId, Announcement)>,
}

impl ChannelMessenger {
    pub fn new() -> (Self, AnnouncementReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Messenger for ChannelMessenger {
    fn announce(
        &self,
        community: CommunityId,
        announcement: Announcement,
    ) -> Result<(), MessagingError> {
        self.sender
            .send((community, announcement))
            .map_err(|_| MessagingError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use raidforge_protocol::{EnemyId, Rarity};

    use super::*;

    #[test]
    fn test_profiles_grant_and_experience() {
        let profiles = InMemoryProfiles::new();
        profiles.insert(PlayerId(1), 12, 40);

        profiles.grant_item(PlayerId(1), ItemId(5), DropId(1)).unwrap();
        profiles.grant_item(PlayerId(1), ItemId(5), DropId(2)).unwrap();
        profiles.award_experience(PlayerId(1), 300, SessionId(1)).unwrap();

        let p = profiles.profile(PlayerId(1)).unwrap();
        assert_eq!(p.inventory[&ItemId(5)], 2);
        assert_eq!(p.experience, 300);
        assert!(matches!(
            profiles.level(PlayerId(2)),
            Err(ProfileError::UnknownPlayer(PlayerId(2)))
        ));
    }

    #[test]
    fn test_repeated_keys_credit_once() {
        let profiles = InMemoryProfiles::new();
        profiles.insert(PlayerId(1), 12, 40);

        profiles.grant_item(PlayerId(1), ItemId(5), DropId(8)).unwrap();
        profiles.grant_item(PlayerId(1), ItemId(5), DropId(8)).unwrap();
        profiles.award_experience(PlayerId(1), 300, SessionId(3)).unwrap();
        profiles.award_experience(PlayerId(1), 300, SessionId(3)).unwrap();
        profiles.award_experience(PlayerId(1), 50, SessionId(4)).unwrap();

        let p = profiles.profile(PlayerId(1)).unwrap();
        assert_eq!(p.inventory[&ItemId(5)], 1);
        assert_eq!(p.experience, 350);
    }

    #[test]
    fn test_unknown_player_is_not_marked_credited() {
        let profiles = InMemoryProfiles::new();
        assert!(profiles.grant_item(PlayerId(1), ItemId(5), DropId(8)).is_err());

        profiles.insert(PlayerId(1), 12, 40);
        profiles.grant_item(PlayerId(1), ItemId(5), DropId(8)).unwrap();
        assert_eq!(profiles.profile(PlayerId(1)).unwrap().inventory[&ItemId(5)], 1);
    }

    #[test]
    fn test_failing_credits_leave_profile_alone() {
        let profiles = InMemoryProfiles::new();
        profiles.insert(PlayerId(1), 12, 40);
        profiles.fail_grants(true);
        profiles.fail_awards(true);

        assert!(profiles.grant_item(PlayerId(1), ItemId(5), DropId(1)).is_err());
        assert!(profiles.award_experience(PlayerId(1), 10, SessionId(1)).is_err());
        let p = profiles.profile(PlayerId(1)).unwrap();
        assert!(p.inventory.is_empty());
        assert_eq!(p.experience, 0);
    }

    #[test]
    fn test_catalog_filters_by_level() {
        let enemy = |id, level| EnemyDef {
            id: EnemyId(id),
            name: format!("enemy {id}"),
            level,
            health: 10,
        };
        let catalog = StaticCatalog::new(
            vec![enemy(1, 4), enemy(2, 5), enemy(3, 10), enemy(4, 11)],
            vec![ItemDef {
                id: ItemId(1),
                name: "Cap".into(),
                level_required: 16,
                rarity: Rarity::Common,
            }],
        );

        let band: Vec<_> = catalog.enemies_in_band(5, 10).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(band, [EnemyId(2), EnemyId(3)]);
        assert!(catalog.items_up_to_level(15).unwrap().is_empty());
    }

    #[test]
    fn test_channel_messenger_reports_closed() {
        let (messenger, receiver) = ChannelMessenger::new();
        drop(receiver);
        let msg = Announcement::CombatStarted {
            session: SessionId(1),
            participants: 3,
        };
        assert!(matches!(
            messenger.announce(CommunityId(1), msg),
            Err(MessagingError::Closed)
        ));
    }
}
