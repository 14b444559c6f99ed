//! `RaidService` builder and lifecycle.
//!
//! This is the entry point for running Raidforge inside a bot. It ties
//! together the store, the collaborators and the raid engine, picks up any
//! raids a previous process left behind, and runs the background sweeps
//! until shut down.

use std::sync::Arc;

use raidforge_raid::{
    BackgroundSweeps, Collaborators, EnemyCatalog, ItemCatalog, Messenger,
    ProfileStore, RaidEngine,
};
use raidforge_store::{JsonFileStore, MemoryStore, RaidStore};
use raidforge_tick::{Clock, TokioClock};
use tracing::{info, warn};

use crate::{RaidforgeError, ServiceConfig};

/// Builder for configuring and starting a [`RaidService`].
///
/// # Example
///
/// ```rust,ignore
/// use raidforge::prelude::*;
///
/// let service = RaidService::builder()
///     .config(load_config("raidforge.json")?)
///     .profiles(profiles)
///     .enemies(catalog.clone())
///     .items(catalog)
///     .messenger(Arc::new(gateway))
///     .start()
///     .await?;
/// ```
#[derive(Default)]
pub struct RaidServiceBuilder {
    config: ServiceConfig,
    store: Option<Arc<dyn RaidStore>>,
    profiles: Option<Arc<dyn ProfileStore>>,
    enemies: Option<Arc<dyn EnemyCatalog>>,
    items: Option<Arc<dyn ItemCatalog>>,
    messenger: Option<Arc<dyn Messenger>>,
    clock: Option<Arc<dyn Clock>>,
}

impl RaidServiceBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `store` instead of the one named by the config's `store_path`.
    pub fn store(mut self, store: Arc<dyn RaidStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn profiles(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn enemies(mut self, enemies: Arc<dyn EnemyCatalog>) -> Self {
        self.enemies = Some(enemies);
        self
    }

    pub fn items(mut self, items: Arc<dyn ItemCatalog>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Overrides the wall clock. Defaults to [`TokioClock::new`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the engine, recovers unfinished raids, and starts the sweeps.
    ///
    /// Without an explicit store, opens the JSON store at the config's
    /// `store_path`, or keeps everything in memory if there is none.
    pub async fn start(self) -> Result<RaidService, RaidforgeError> {
        let store: Arc<dyn RaidStore> = match (self.store, &self.config.store_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(JsonFileStore::open(path)?),
            (None, None) => {
                warn!("no store_path configured, raids will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let parts = Collaborators {
            store,
            profiles: self.profiles.ok_or(RaidforgeError::Missing("profile store"))?,
            enemies: self.enemies.ok_or(RaidforgeError::Missing("enemy catalog"))?,
            items: self.items.ok_or(RaidforgeError::Missing("item catalog"))?,
            messenger: self.messenger.ok_or(RaidforgeError::Missing("messenger"))?,
            clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock::new())),
        };

        let engine = RaidEngine::new(self.config.raid, parts);
        let recovered = engine.recover().await?;
        let sweeps = engine.start_sweeps();
        info!(recovered, "raidforge service started");

        Ok(RaidService { engine, sweeps })
    }
}

/// A running Raidforge service.
///
/// Raid operations go through [`engine()`](Self::engine). Call
/// [`shutdown()`](Self::shutdown) to stop the sweeps and every session
/// actor; stored raids resume on the next start.
pub struct RaidService {
    engine: RaidEngine,
    sweeps: BackgroundSweeps,
}

impl RaidService {
    /// Creates a new builder.
    pub fn builder() -> RaidServiceBuilder {
        RaidServiceBuilder::new()
    }

    pub fn engine(&self) -> &RaidEngine {
        &self.engine
    }

    /// Stops the sweeps, then the session actors.
    pub async fn shutdown(self) {
        let (expiry, loot) = self.sweeps.cancel().await;
        info!(
            expiry_passes = expiry.total_passes,
            loot_passes = loot.total_passes,
            "sweeps stopped"
        );
        self.engine.shutdown().await;
    }
}
