//! The two background sweeps. Both read everything they need from the
//! store and are safe to run any number of times.

use raidforge_protocol::{Announcement, FailureReason, RaidStatus};
use raidforge_store::StatusChange;
use tracing::{debug, error, info, warn};

use crate::context::RaidContext;
use crate::{RaidError, combat, loot, registry};

/// Fails every in-progress session past its hard deadline. Returns how
/// many were expired by this pass.
pub(crate) fn expire_overdue(ctx: &RaidContext) -> Result<usize, RaidError> {
    let now = ctx.clock.now();
    let mut expired = 0;

    for session in ctx.store.sessions_with_status(RaidStatus::InProgress)? {
        if !now.has_reached(session.hard_deadline) {
            continue;
        }

        let change = StatusChange::Fail(FailureReason::Expired);
        match registry::finish(ctx, &session, RaidStatus::InProgress, change) {
            Ok(Some(_)) => {
                let participants = ctx.store.participants(session.id)?.len();
                info!(
                    session_id = %session.id,
                    community = %session.community,
                    participants,
                    "session expired"
                );
                ctx.announce(
                    session.community,
                    Announcement::SessionFailed {
                        session: session.id,
                        reason: FailureReason::Expired,
                        participants,
                    },
                );
                expired += 1;
            }
            Ok(None) => {}
            Err(e) => error!(session_id = %session.id, error = %e, "failed to expire session"),
        }
    }
    Ok(expired)
}

/// Removes finished sessions whose hard deadline passed more than the
/// retention period ago. Returns how many were removed.
pub(crate) fn prune_history(ctx: &RaidContext) -> Result<usize, RaidError> {
    let cutoff = ctx.clock.now().saturating_sub(ctx.config.history_retention);
    let pruned = ctx.store.prune_finished(cutoff)?;
    if pruned > 0 {
        info!(pruned, %cutoff, "finished sessions pruned");
    }
    Ok(pruned)
}

/// Settles every drop whose bid window has closed, then retries experience
/// for completed sessions that are still owed it. Returns how many drops
/// were settled by this pass.
///
/// Passes are serialized by the loot gate. A drop whose award fails is
/// left for the next pass.
pub(crate) async fn resolve_due_loot(ctx: &RaidContext) -> Result<usize, RaidError> {
    let _gate = ctx.loot_gate.lock().await;
    retry_rewards(ctx)?;

    let due = ctx.store.unsettled_drops_due(ctx.clock.now())?;
    let mut settled = 0;

    for drop in &due {
        match loot::resolve_drop(ctx, drop) {
            Ok(outcome) => {
                debug!(drop_id = %drop.id, ?outcome, "drop settled");
                settled += 1;
            }
            Err(RaidError::DropResolved(_)) => {}
            Err(e) => warn!(
                session_id = %drop.session_id,
                drop_id = %drop.id,
                error = %e,
                "drop resolution failed, will retry"
            ),
        }
    }
    Ok(settled)
}

fn retry_rewards(ctx: &RaidContext) -> Result<(), RaidError> {
    for session in ctx.store.sessions_awaiting_rewards()? {
        let granted = combat::session_board(ctx, &session)
            .and_then(|board| combat::grant_experience(ctx, session.id, &board));
        match granted {
            Ok(true) => info!(session_id = %session.id, "pending experience granted"),
            Ok(false) => {}
            Err(e) => warn!(session_id = %session.id, error = %e, "experience retry failed"),
        }
    }
    Ok(())
}
