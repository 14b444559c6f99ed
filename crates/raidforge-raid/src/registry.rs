//! Session registry: opening sessions and tying off finished ones.
//!
//! The "one active raid per community" rule lives in the store as a
//! binding from community to session. Opening a session inserts the
//! binding atomically with the session itself; finishing one flips the
//! status with a compare-and-set and then drops the binding.

use raidforge_protocol::{
    Announcement, CommunityId, Difficulty, DropDraft, LootDrop, RaidSession,
    RaidStatus, SessionDraft, SessionId, Timestamp,
};
use raidforge_store::{StatusChange, StoreError};
use tracing::{debug, info, warn};

use crate::RaidError;
use crate::context::RaidContext;
use crate::waves::compose_waves;

/// Creates a session, plans its waves and binds it to `community`.
pub(crate) fn open(
    ctx: &RaidContext,
    community: CommunityId,
    difficulty: Difficulty,
    min_level: u32,
) -> Result<RaidSession, RaidError> {
    let config = &ctx.config;

    if let Some(active) = ctx.store.active_session(community)? {
        reclaim_stale_binding(ctx, community, active)?;
    }

    let max_level = min_level.saturating_add(config.level_band);
    let enemies = ctx.enemies.enemies_in_band(min_level, max_level)?;
    if enemies.len() < config.min_enemy_kinds {
        return Err(RaidError::InsufficientCatalog {
            found: enemies.len(),
            required: config.min_enemy_kinds,
        });
    }

    let waves = compose_waves(&enemies, difficulty, config.wave_count, &mut rand::rng());
    let now = ctx.clock.now();
    let draft = SessionDraft {
        community,
        difficulty,
        min_level,
        created_at: now,
        enrollment_deadline: now.saturating_add(config.enrollment_window),
        hard_deadline: now.saturating_add(config.session_time_budget),
        min_participants: config.min_participants,
        max_participants: config.max_participants,
        waves,
    };

    let session = ctx.store.create_session(draft)?;
    info!(
        session_id = %session.id,
        %community,
        %difficulty,
        min_level,
        waves = session.wave_count,
        "session opened"
    );

    ctx.announce(
        community,
        Announcement::SessionOpened {
            session: session.id,
            difficulty,
            min_level,
            waves: session.wave_count,
            max_participants: session.max_participants,
            enrollment_closes_at: session.enrollment_deadline,
        },
    );
    Ok(session)
}

/// A binding whose session is already terminal was left behind by a crash
/// between the status change and the release. Clear it; refuse otherwise.
fn reclaim_stale_binding(
    ctx: &RaidContext,
    community: CommunityId,
    active: SessionId,
) -> Result<(), RaidError> {
    let status = match ctx.store.session(active) {
        Ok(s) => Some(s.status),
        Err(StoreError::SessionNotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    match status {
        Some(status) if status.is_active() => Err(RaidError::AlreadyActive {
            community,
            session: active,
        }),
        _ => {
            warn!(session_id = %active, %community, "releasing stale community binding");
            ctx.store.release(community, active)?;
            Ok(())
        }
    }
}

/// Drops the community binding for `session` if it still holds it.
pub(crate) fn release(ctx: &RaidContext, session: &RaidSession) -> Result<(), RaidError> {
    if ctx.store.release(session.community, session.id)? {
        debug!(session_id = %session.id, community = %session.community, "community released");
    }
    Ok(())
}

/// Moves `session` out of `expected` and, for terminal changes, releases
/// its community.
///
/// Returns `None` if another flow moved the session first; that flow owns
/// the follow-up.
pub(crate) fn finish(
    ctx: &RaidContext,
    session: &RaidSession,
    expected: RaidStatus,
    change: StatusChange,
) -> Result<Option<RaidSession>, RaidError> {
    let updated = match ctx.store.transition(session.id, expected, change) {
        Ok(updated) => updated,
        Err(StoreError::StatusConflict { actual, .. }) => {
            debug!(
                session_id = %session.id,
                %expected,
                %actual,
                "session already moved on"
            );
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if updated.status.is_terminal() {
        release(ctx, &updated)?;
    }
    Ok(Some(updated))
}

/// Completes an in-progress session together with its drops, then releases
/// its community.
///
/// Returns `None` if another flow (the expiry sweep) ended it first.
pub(crate) fn complete(
    ctx: &RaidContext,
    session: &RaidSession,
    at: Timestamp,
    drops: Vec<DropDraft>,
) -> Result<Option<(RaidSession, Vec<LootDrop>)>, RaidError> {
    let (updated, drops) = match ctx.store.complete_session(session.id, at, drops) {
        Ok(done) => done,
        Err(StoreError::StatusConflict { actual, .. }) => {
            debug!(session_id = %session.id, %actual, "session ended before completing");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    // A binding left behind here is reclaimed by the next `open`.
    if let Err(e) = release(ctx, &updated) {
        warn!(session_id = %session.id, error = %e, "community release failed");
    }
    Ok(Some((updated, drops)))
}
