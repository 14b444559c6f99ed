//! Shared state handed to every session actor and sweep.

use std::sync::Arc;

use raidforge_protocol::{Announcement, CommunityId};
use raidforge_store::RaidStore;
use raidforge_tick::Clock;
use tokio::sync::Mutex;
use tracing::warn;

use crate::{EnemyCatalog, ItemCatalog, Messenger, ProfileStore, RaidConfig};

/// Everything the engine needs to run a raid.
///
/// ```ignore
/// let engine = RaidEngine::new(config, Collaborators {
///     store: Arc::new(MemoryStore::new()),
///     profiles: Arc::new(InMemoryProfiles::new()),
///     enemies: catalog.clone(),
///     items: catalog,
///     messenger: Arc::new(messenger),
///     clock: Arc::new(TokioClock::new()),
/// });
/// ```
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RaidStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub enemies: Arc<dyn EnemyCatalog>,
    pub items: Arc<dyn ItemCatalog>,
    pub messenger: Arc<dyn Messenger>,
    pub clock: Arc<dyn Clock>,
}

pub(crate) struct RaidContext {
    pub store: Arc<dyn RaidStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub enemies: Arc<dyn EnemyCatalog>,
    pub items: Arc<dyn ItemCatalog>,
    pub messenger: Arc<dyn Messenger>,
    pub clock: Arc<dyn Clock>,
    pub config: RaidConfig,
    /// Held for a whole loot resolution pass so two passes never credit the
    /// same drop.
    pub loot_gate: Mutex<()>,
}

impl RaidContext {
    pub fn new(config: RaidConfig, parts: Collaborators) -> Self {
        Self {
            store: parts.store,
            profiles: parts.profiles,
            enemies: parts.enemies,
            items: parts.items,
            messenger: parts.messenger,
            clock: parts.clock,
            config: config.validated(),
            loot_gate: Mutex::new(()),
        }
    }

    /// Hands an announcement to the messenger. Failures are logged and
    /// otherwise ignored.
    pub fn announce(&self, community: CommunityId, announcement: Announcement) {
        let session = announcement.session();
        let kind = announcement.kind();
        if let Err(e) = self.messenger.announce(community, announcement) {
            warn!(session_id = %session, %community, kind, error = %e, "announcement dropped");
        }
    }
}
