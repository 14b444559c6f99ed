//! The engine: public entry point for every raid operation.
//!
//! [`RaidEngine`] tracks one actor per live session and routes joins to it.
//! Everything else (bids, status queries, sweeps) goes straight to the
//! store, so those operations work the same whether or not the session's
//! actor is running.

use std::collections::HashMap;
use std::sync::Arc;

use raidforge_protocol::{
    Bid, BidCategory, CommunityId, Difficulty, DropId, LootDrop, Participant,
    PlayerId, RaidSession, RaidStatus, SessionId, Wave,
};
use raidforge_tick::{SweepConfig, SweepHandle, SweepMetrics, spawn_sweep};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::context::{Collaborators, RaidContext};
use crate::session::{SessionHandle, spawn_session};
use crate::{Enrollment, RaidConfig, RaidError, loot, registry, sweeps};

/// A read-only view of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session: RaidSession,
    pub waves: Vec<Wave>,
    /// Highest damage first.
    pub participants: Vec<Participant>,
    pub drops: Vec<LootDrop>,
}

struct LiveSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// The raid engine. Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct RaidEngine {
    ctx: Arc<RaidContext>,
    live: Arc<Mutex<HashMap<SessionId, LiveSession>>>,
}

impl RaidEngine {
    /// Builds an engine. The config is validated here.
    pub fn new(config: RaidConfig, parts: Collaborators) -> Self {
        Self {
            ctx: Arc::new(RaidContext::new(config, parts)),
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The validated config in effect.
    pub fn config(&self) -> &RaidConfig {
        &self.ctx.config
    }

    // -- Sessions ---------------------------------------------------------

    /// Opens a raid for `community` and starts its enrollment window.
    pub async fn create_session(
        &self,
        community: CommunityId,
        difficulty: Difficulty,
        min_level: u32,
    ) -> Result<RaidSession, RaidError> {
        let mut live = self.live.lock().await;
        live.retain(|_, s| !s.task.is_finished());

        let session = registry::open(&self.ctx, community, difficulty, min_level)?;
        let (handle, task) = spawn_session(Arc::clone(&self.ctx), &session);
        live.insert(session.id, LiveSession { handle, task });
        Ok(session)
    }

    /// Enrolls `player` in `session`.
    pub async fn join(&self, session: SessionId, player: PlayerId) -> Result<Enrollment, RaidError> {
        let handle = self.live.lock().await.get(&session).map(|s| s.handle.clone());

        match handle {
            Some(handle) => match handle.join(player).await {
                Err(RaidError::Unavailable(_)) => Err(self.not_enrolling(session)?),
                result => result,
            },
            None => Err(self.not_enrolling(session)?),
        }
    }

    /// The rejection for a session without a running actor.
    fn not_enrolling(&self, session: SessionId) -> Result<RaidError, RaidError> {
        self.ctx.store.session(session)?;
        Ok(RaidError::NotEnrolling(session))
    }

    /// Everything stored about `session`.
    pub fn status(&self, session: SessionId) -> Result<SessionView, RaidError> {
        let store = &self.ctx.store;
        let record = store.session(session)?;
        let mut participants = store.participants(session)?;
        // Stable sort keeps join order among equal damage.
        participants.sort_by(|a, b| b.damage_dealt.cmp(&a.damage_dealt));

        Ok(SessionView {
            session: record,
            waves: store.waves(session)?,
            participants,
            drops: store.drops(session)?,
        })
    }

    /// The community's enrolling or in-progress session, if any.
    pub fn active_session(&self, community: CommunityId) -> Result<Option<SessionId>, RaidError> {
        let Some(id) = self.ctx.store.active_session(community)? else {
            return Ok(None);
        };
        let session = self.ctx.store.session(id)?;
        Ok(session.status.is_active().then_some(id))
    }

    // -- Loot -------------------------------------------------------------

    /// Bids on one drop.
    pub async fn bid(
        &self,
        drop: DropId,
        player: PlayerId,
        category: BidCategory,
    ) -> Result<Bid, RaidError> {
        let _gate = self.ctx.loot_gate.lock().await;
        loot::place_bid(&self.ctx, drop, player, category)
    }

    /// Bids `category` on every open drop of `session` the player has not
    /// bid on yet.
    pub async fn bid_all(
        &self,
        session: SessionId,
        player: PlayerId,
        category: BidCategory,
    ) -> Result<Vec<Bid>, RaidError> {
        let _gate = self.ctx.loot_gate.lock().await;
        loot::place_bids(&self.ctx, session, player, category)
    }

    // -- Sweeps -----------------------------------------------------------

    /// Runs one expiry pass. Returns how many sessions were failed.
    pub fn sweep_expired(&self) -> Result<usize, RaidError> {
        sweeps::expire_overdue(&self.ctx)
    }

    /// Prunes finished sessions past the retention period. Returns how many
    /// were removed; their records are gone from [`status`](Self::status).
    pub fn prune_history(&self) -> Result<usize, RaidError> {
        sweeps::prune_history(&self.ctx)
    }

    /// Runs one loot pass. Returns how many drops were settled. Completed
    /// sessions still owed experience are retried in the same pass.
    pub async fn sweep_loot(&self) -> Result<usize, RaidError> {
        sweeps::resolve_due_loot(&self.ctx).await
    }

    /// Starts both sweeps on their configured intervals. The expiry sweep
    /// also prunes old history.
    pub fn start_sweeps(&self) -> BackgroundSweeps {
        let engine = self.clone();
        let expiry = spawn_sweep(
            "expiry",
            SweepConfig::every(self.ctx.config.expiry_sweep_interval),
            move || {
                let engine = engine.clone();
                async move {
                    if let Err(e) = engine.sweep_expired() {
                        error!(error = %e, "expiry sweep failed");
                    }
                    if let Err(e) = engine.prune_history() {
                        error!(error = %e, "history prune failed");
                    }
                }
            },
        );

        let engine = self.clone();
        let loot = spawn_sweep(
            "loot",
            SweepConfig::every(self.ctx.config.loot_sweep_interval),
            move || {
                let engine = engine.clone();
                async move {
                    if let Err(e) = engine.sweep_loot().await {
                        error!(error = %e, "loot sweep failed");
                    }
                }
            },
        );

        BackgroundSweeps { expiry, loot }
    }

    // -- Lifecycle --------------------------------------------------------

    /// Respawns actors for every enrolling or in-progress session in the
    /// store that has none. Returns how many were respawned.
    pub async fn recover(&self) -> Result<usize, RaidError> {
        let mut live = self.live.lock().await;
        live.retain(|_, s| !s.task.is_finished());

        let mut sessions = self.ctx.store.sessions_with_status(RaidStatus::Enrolling)?;
        sessions.extend(self.ctx.store.sessions_with_status(RaidStatus::InProgress)?);

        let mut recovered = 0;
        for session in sessions {
            if live.contains_key(&session.id) {
                continue;
            }
            info!(
                session_id = %session.id,
                community = %session.community,
                status = %session.status,
                "recovering session"
            );
            let (handle, task) = spawn_session(Arc::clone(&self.ctx), &session);
            live.insert(session.id, LiveSession { handle, task });
            recovered += 1;
        }
        Ok(recovered)
    }

    /// Number of session actors still running.
    pub async fn live_sessions(&self) -> usize {
        self.live.lock().await.values().filter(|s| !s.task.is_finished()).count()
    }

    /// Stops every session actor and waits for them. Stored state is left
    /// as it is, ready for [`recover`](Self::recover).
    pub async fn shutdown(&self) {
        let drained: Vec<(SessionId, LiveSession)> = self.live.lock().await.drain().collect();
        let count = drained.len();

        for (_, session) in &drained {
            // A finished actor has already closed its channel.
            let _ = session.handle.shutdown().await;
        }
        for (session_id, session) in drained {
            if let Err(e) = session.task.await {
                error!(%session_id, error = %e, "session task ended abnormally");
            }
        }
        info!(sessions = count, "engine shut down");
    }
}

/// The two running background sweeps.
pub struct BackgroundSweeps {
    expiry: SweepHandle,
    loot: SweepHandle,
}

impl BackgroundSweeps {
    /// Whether either sweep loop has exited.
    pub fn is_finished(&self) -> bool {
        self.expiry.is_finished() || self.loot.is_finished()
    }

    /// Stops both sweeps. Returns their metrics, expiry first.
    pub async fn cancel(self) -> (SweepMetrics, SweepMetrics) {
        let expiry = self.expiry.cancel().await;
        let loot = self.loot.cancel().await;
        (expiry, loot)
    }
}
