//! Damage rolls and post-raid rewards.

use raidforge_protocol::{Contribution, Participant, PlayerId, RaidSession, SessionId};
use rand::Rng;
use tracing::{debug, warn};

use crate::context::RaidContext;
use crate::{ProfileError, ProfileStore, RaidConfig, RaidError};

/// One player's damage for one round: `max(floor, attack + v)` with `v`
/// uniform in the configured variance range.
pub(crate) fn roll_damage<R: Rng + ?Sized>(attack: u64, config: &RaidConfig, rng: &mut R) -> u64 {
    let variance = rng.random_range(config.damage_variance_min..=config.damage_variance_max);
    let attack = i64::try_from(attack).unwrap_or(i64::MAX);
    let floor = i64::try_from(config.min_round_damage).unwrap_or(i64::MAX);
    // Never negative: `floor` is built from a u64.
    attack.saturating_add(variance).max(floor) as u64
}

/// Rolls a round for every player in `alive`.
///
/// All attacks are looked up before anything is rolled, so a profile
/// failure yields no partial round.
pub(crate) fn round_damage(
    profiles: &dyn ProfileStore,
    alive: &[PlayerId],
    config: &RaidConfig,
) -> Result<Vec<(PlayerId, u64)>, ProfileError> {
    let attacks = alive
        .iter()
        .map(|&player| profiles.effective_attack(player).map(|attack| (player, attack)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rng = rand::rng();
    Ok(attacks
        .into_iter()
        .map(|(player, attack)| (player, roll_damage(attack, config, &mut rng)))
        .collect())
}

/// Each participant's share of the total damage and the experience it
/// earns: `⌊min_level · per_level · damage / total⌋`, or nothing when no
/// damage was dealt. Sorted by damage, highest first; ties keep join order.
pub(crate) fn contributions(
    participants: &[Participant],
    min_level: u32,
    per_level: u64,
) -> Vec<Contribution> {
    let total: u128 = participants.iter().map(|p| u128::from(p.damage_dealt)).sum();
    let pool = u128::from(min_level) * u128::from(per_level);

    let mut out: Vec<Contribution> = participants
        .iter()
        .map(|p| {
            let (share_pct, experience) = if total == 0 {
                (0.0, 0)
            } else {
                let damage = u128::from(p.damage_dealt);
                (
                    p.damage_dealt as f64 * 100.0 / total as f64,
                    u64::try_from(pool * damage / total).unwrap_or(u64::MAX),
                )
            };
            Contribution {
                player: p.player,
                damage: p.damage_dealt,
                share_pct,
                experience,
            }
        })
        .collect();
    out.sort_by(|a, b| b.damage.cmp(&a.damage));
    out
}

/// The contribution board of `session` as stored right now.
pub(crate) fn session_board(
    ctx: &RaidContext,
    session: &RaidSession,
) -> Result<Vec<Contribution>, RaidError> {
    let participants = ctx.store.participants(session.id)?;
    Ok(contributions(&participants, session.min_level, ctx.config.experience_per_level))
}

/// Credits everyone on `board` with their experience for `session`.
///
/// Awards are keyed by session, so a participant already credited by an
/// earlier attempt is skipped by the profile store. The session is marked
/// rewarded only once every award has gone through, and the return value
/// says whether that happened. Until then the loot sweep calls this again.
pub(crate) fn grant_experience(
    ctx: &RaidContext,
    session: SessionId,
    board: &[Contribution],
) -> Result<bool, RaidError> {
    let mut failed = 0;
    for entry in board.iter().filter(|c| c.experience > 0) {
        if let Err(e) = ctx.profiles.award_experience(entry.player, entry.experience, session) {
            warn!(
                session_id = %session,
                player = %entry.player,
                error = %e,
                "experience award failed, will retry"
            );
            failed += 1;
        }
    }

    if failed > 0 {
        return Ok(false);
    }
    ctx.store.mark_rewards_granted(session)?;
    debug!(session_id = %session, participants = board.len(), "experience granted");
    Ok(true)
}
