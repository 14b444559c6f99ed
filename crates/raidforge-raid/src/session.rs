//! Session actor: one Tokio task per live raid.
//!
//! The actor owns the raid's timeline: it waits out the enrollment window,
//! decides whether the raid starts, then fights the waves round by round.
//! Join requests reach it through an mpsc channel with a oneshot reply, and
//! every sleep in the timeline keeps answering them, so joins are handled
//! one at a time and never race the enrollment deadline.
//!
//! The actor keeps no state of its own beyond ids. Each step re-reads the
//! store, which is what lets the expiry sweep stop a raid from outside and
//! lets a restarted process pick a raid back up.

use std::sync::Arc;
use std::time::Duration;

use raidforge_protocol::{
    Announcement, CommunityId, FailureReason, LootDrop, Participant, PlayerId,
    RaidSession, RaidStatus, SessionId, Timestamp, Wave,
};
use raidforge_store::{StatusChange, StoreError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::context::RaidContext;
use crate::{RaidError, combat, loot, registry};

/// Commands sent to a session actor.
pub(crate) enum SessionCommand {
    Join {
        player: PlayerId,
        reply: oneshot::Sender<Result<Enrollment, RaidError>>,
    },

    /// Stop the actor, leaving stored state as it is.
    Shutdown,
}

/// An accepted join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enrollment {
    pub session: SessionId,
    pub player: PlayerId,
    /// Participants after this join.
    pub participants: usize,
    pub max_participants: usize,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Asks the actor to enroll `player`.
    pub async fn join(&self, player: PlayerId) -> Result<Enrollment, RaidError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Join {
                player,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RaidError::Unavailable(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| RaidError::Unavailable(self.session_id))?
    }

    pub async fn shutdown(&self) -> Result<(), RaidError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| RaidError::Unavailable(self.session_id))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Why the timeline stopped early.
enum Halt {
    /// Told to stop. The raid stays where it is in the store.
    Shutdown,
    /// The raid reached a terminal state, here or elsewhere.
    Ended,
    Failed(RaidError),
}

impl From<RaidError> for Halt {
    fn from(e: RaidError) -> Self {
        Self::Failed(e)
    }
}

impl From<StoreError> for Halt {
    fn from(e: StoreError) -> Self {
        Self::Failed(e.into())
    }
}

struct SessionActor {
    session_id: SessionId,
    community: CommunityId,
    ctx: Arc<RaidContext>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    async fn run(mut self) {
        info!(session_id = %self.session_id, community = %self.community, "session actor started");

        match self.drive().await {
            Ok(()) | Err(Halt::Ended) => {}
            Err(Halt::Shutdown) => {
                info!(session_id = %self.session_id, "session actor shut down");
            }
            Err(Halt::Failed(e)) => {
                // An unfinished raid is failed by the expiry sweep once its
                // budget runs out.
                error!(session_id = %self.session_id, error = %e, "session flow aborted");
            }
        }

        info!(session_id = %self.session_id, "session actor stopped");
    }

    async fn drive(&mut self) -> Result<(), Halt> {
        let session = self.ctx.store.session(self.session_id)?;
        match session.status {
            RaidStatus::Enrolling => {
                self.sleep_until(session.enrollment_deadline).await?;
                self.close_enrollment()?;
            }
            RaidStatus::InProgress => {
                info!(
                    session_id = %self.session_id,
                    wave = session.current_wave,
                    "resuming combat"
                );
            }
            RaidStatus::Completed | RaidStatus::Failed => return Err(Halt::Ended),
        }

        self.fight().await?;
        self.complete().await
    }

    // -- Enrollment -------------------------------------------------------

    /// Enrollment checks, in order: still enrolling, not already in, level
    /// high enough, room left.
    fn handle_join(&self, player: PlayerId) -> Result<Enrollment, RaidError> {
        let store = &self.ctx.store;
        let session = store.session(self.session_id)?;
        if !session.status.is_joinable() || self.ctx.clock.now().has_reached(session.enrollment_deadline) {
            return Err(RaidError::NotEnrolling(self.session_id));
        }
        if store.participant(self.session_id, player)?.is_some() {
            return Err(RaidError::AlreadyJoined(player, self.session_id));
        }
        let level = self.ctx.profiles.level(player)?;
        if level < session.min_level {
            return Err(RaidError::BelowMinimumLevel {
                player,
                level,
                required: session.min_level,
            });
        }
        let count = store.participants(self.session_id)?.len();
        if count >= session.max_participants {
            return Err(RaidError::Full(self.session_id));
        }

        let now = self.ctx.clock.now();
        store.insert_participant(Participant::enrolled(self.session_id, player, now))?;
        let participants = count + 1;

        info!(
            session_id = %self.session_id,
            %player,
            level,
            participants,
            "player joined"
        );
        self.ctx.announce(
            self.community,
            Announcement::ParticipantJoined {
                session: self.session_id,
                player,
                participants,
                max_participants: session.max_participants,
            },
        );

        Ok(Enrollment {
            session: self.session_id,
            player,
            participants,
            max_participants: session.max_participants,
        })
    }

    /// Starts combat or fails the raid for lack of players.
    fn close_enrollment(&self) -> Result<(), Halt> {
        let session = self.ctx.store.session(self.session_id)?;
        let participants = self.ctx.store.participants(self.session_id)?.len();

        if participants < session.min_participants {
            let change = StatusChange::Fail(FailureReason::InsufficientParticipants);
            if registry::finish(&self.ctx, &session, RaidStatus::Enrolling, change)?.is_some() {
                info!(
                    session_id = %self.session_id,
                    participants,
                    required = session.min_participants,
                    "not enough players, session failed"
                );
                self.ctx.announce(
                    self.community,
                    Announcement::SessionFailed {
                        session: self.session_id,
                        reason: FailureReason::InsufficientParticipants,
                        participants,
                    },
                );
            }
            return Err(Halt::Ended);
        }

        if registry::finish(&self.ctx, &session, RaidStatus::Enrolling, StatusChange::Start)?
            .is_none()
        {
            return Err(Halt::Ended);
        }
        info!(session_id = %self.session_id, participants, "enrollment closed, combat started");
        self.ctx.announce(
            self.community,
            Announcement::CombatStarted {
                session: self.session_id,
                participants,
            },
        );
        Ok(())
    }

    // -- Combat -----------------------------------------------------------

    async fn fight(&mut self) -> Result<(), Halt> {
        let waves: Vec<Wave> = self
            .ctx
            .store
            .waves(self.session_id)?
            .into_iter()
            .filter(|w| !w.completed)
            .collect();

        let last = waves.len();
        for (i, wave) in waves.into_iter().enumerate() {
            self.fight_wave(wave).await?;
            if i + 1 < last {
                self.sleep(self.ctx.config.wave_interval).await?;
            }
        }
        Ok(())
    }

    async fn fight_wave(&mut self, wave: Wave) -> Result<(), Halt> {
        self.ensure_in_progress()?;
        self.ctx.store.set_current_wave(self.session_id, wave.number)?;
        info!(
            session_id = %self.session_id,
            wave = wave.number,
            is_boss = wave.is_boss,
            health = wave.remaining_health,
            "wave started"
        );
        self.ctx.announce(
            self.community,
            Announcement::WaveStarted {
                session: self.session_id,
                wave: wave.number,
                is_boss: wave.is_boss,
                total_health: wave.total_health,
            },
        );

        let mut remaining = wave.remaining_health;
        let mut round = 0u32;
        while remaining > 0 {
            let session = self.ensure_in_progress()?;

            let alive: Vec<PlayerId> = self
                .ctx
                .store
                .participants(self.session_id)?
                .into_iter()
                .filter(|p| p.alive)
                .map(|p| p.player)
                .collect();
            if alive.is_empty() {
                return self.wipe(&session);
            }

            match combat::round_damage(self.ctx.profiles.as_ref(), &alive, &self.ctx.config) {
                Ok(damage) => {
                    round += 1;
                    let updated = self.ctx.store.apply_round(self.session_id, wave.number, &damage)?;
                    let dealt: u64 = damage.iter().map(|(_, d)| d).sum();
                    remaining = updated.remaining_health;
                    debug!(
                        session_id = %self.session_id,
                        wave = wave.number,
                        round,
                        dealt,
                        remaining,
                        "round resolved"
                    );

                    if remaining > 0 && round % self.ctx.config.progress_every_rounds == 0 {
                        self.ctx.announce(
                            self.community,
                            Announcement::RoundProgress {
                                session: self.session_id,
                                wave: wave.number,
                                round,
                                damage: dealt,
                                remaining_health: remaining,
                                total_health: updated.total_health,
                            },
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        session_id = %self.session_id,
                        wave = wave.number,
                        error = %e,
                        "profile lookup failed, round skipped"
                    );
                }
            }

            if remaining > 0 {
                self.sleep(self.ctx.config.round_interval).await?;
            }
        }

        self.ctx.store.complete_wave(self.session_id, wave.number)?;
        info!(session_id = %self.session_id, wave = wave.number, rounds = round, "wave cleared");
        self.ctx.announce(
            self.community,
            Announcement::WaveCleared {
                session: self.session_id,
                wave: wave.number,
                rounds: round,
            },
        );
        Ok(())
    }

    /// Stops the timeline if someone else (the expiry sweep) ended the raid.
    fn ensure_in_progress(&self) -> Result<RaidSession, Halt> {
        let session = self.ctx.store.session(self.session_id)?;
        if session.status != RaidStatus::InProgress {
            info!(
                session_id = %self.session_id,
                status = %session.status,
                "session no longer in progress, stopping"
            );
            return Err(Halt::Ended);
        }
        Ok(session)
    }

    fn wipe(&self, session: &RaidSession) -> Result<(), Halt> {
        let change = StatusChange::Fail(FailureReason::Wipe);
        if registry::finish(&self.ctx, session, RaidStatus::InProgress, change)?.is_some() {
            let participants = self.ctx.store.participants(self.session_id)?.len();
            info!(session_id = %self.session_id, wave = session.current_wave, "raid wiped");
            self.ctx.announce(
                self.community,
                Announcement::SessionFailed {
                    session: self.session_id,
                    reason: FailureReason::Wipe,
                    participants,
                },
            );
        }
        Err(Halt::Ended)
    }

    // -- Completion -------------------------------------------------------

    /// Completes the raid together with its loot. A failed attempt writes
    /// nothing and is retried every round interval until it lands or the
    /// expiry sweep ends the raid.
    async fn complete(&mut self) -> Result<(), Halt> {
        let (session, drops) = loop {
            let session = self.ensure_in_progress()?;
            match self.try_complete(&session) {
                Ok(Some(done)) => break done,
                Ok(None) => return Err(Halt::Ended),
                Err(e) => {
                    warn!(
                        session_id = %self.session_id,
                        error = %e,
                        "completion failed, retrying"
                    );
                    self.sleep(self.ctx.config.round_interval).await?;
                }
            }
        };

        let board = combat::session_board(&self.ctx, &session)?;
        info!(
            session_id = %self.session_id,
            participants = board.len(),
            drops = drops.len(),
            "session completed"
        );
        self.ctx.announce(
            self.community,
            Announcement::SessionCompleted {
                session: self.session_id,
                contributions: board.clone(),
            },
        );
        loot::announce_loot(&self.ctx, &session, &drops);

        if let Err(e) = combat::grant_experience(&self.ctx, self.session_id, &board) {
            warn!(session_id = %self.session_id, error = %e, "experience not granted, will retry");
        }
        Ok(())
    }

    fn try_complete(
        &self,
        session: &RaidSession,
    ) -> Result<Option<(RaidSession, Vec<LootDrop>)>, RaidError> {
        let at = self.ctx.clock.now();
        let drops = loot::plan_drops(&self.ctx, session, at)?;
        registry::complete(&self.ctx, session, at, drops)
    }

    // -- Waiting ----------------------------------------------------------

    async fn sleep_until(&mut self, deadline: Timestamp) -> Result<(), Halt> {
        let wait = self.ctx.clock.until(deadline);
        self.sleep(wait).await
    }

    /// Sleeps for `duration` while answering commands.
    async fn sleep(&mut self, duration: Duration) -> Result<(), Halt> {
        let timer = time::sleep(duration);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => return Ok(()),
                cmd = self.receiver.recv() => match cmd {
                    Some(SessionCommand::Join { player, reply }) => {
                        let _ = reply.send(self.handle_join(player));
                    }
                    Some(SessionCommand::Shutdown) | None => return Err(Halt::Shutdown),
                },
            }
        }
    }
}

/// Spawns the actor for `session` and returns a handle plus its task.
pub(crate) fn spawn_session(
    ctx: Arc<RaidContext>,
    session: &RaidSession,
) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(ctx.config.command_channel_size);

    let actor = SessionActor {
        session_id: session.id,
        community: session.community,
        ctx,
        receiver: rx,
    };
    let task = tokio::spawn(actor.run());

    (
        SessionHandle {
            session_id: session.id,
            sender: tx,
        },
        task,
    )
}
