//! Loot auctions: drop generation, bidding and resolution.
//!
//! A completed raid drops a handful of items. Participants bid `Need`,
//! `Greed` or `Pass` on each one until its deadline, and the loot sweep
//! settles every drop exactly once:
//!
//! 1. the highest `Need` roll wins, if anyone rolled `Need`;
//! 2. otherwise the highest `Greed` roll wins;
//! 3. otherwise the drop is wasted.
//!
//! Equal rolls go to whoever bid first.

use std::cmp::Reverse;

use raidforge_protocol::{
    Announcement, Bid, BidCategory, BidDraft, DropDraft, DropId, DropSummary,
    LootDrop, PlayerId, RaidSession, SessionId, Timestamp,
};
use raidforge_store::StoreError;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::context::RaidContext;
use crate::{ItemDef, RaidError};

/// How a drop was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LootOutcome {
    Awarded {
        winner: PlayerId,
        category: BidCategory,
        roll: u32,
    },
    Wasted,
}

// ---------------------------------------------------------------------------
// Pure rules
// ---------------------------------------------------------------------------

/// Picks `count` items: the rarest `2 · count` are kept, then `count` of
/// those are sampled without replacement.
pub(crate) fn choose_items<R: Rng + ?Sized>(
    mut items: Vec<ItemDef>,
    count: usize,
    rng: &mut R,
) -> Vec<ItemDef> {
    items.sort_by_key(|item| Reverse(item.rarity));
    items.truncate(count.saturating_mul(2));
    items
        .choose_multiple(rng, count.min(items.len()))
        .cloned()
        .collect()
}

/// The winning bid, if any. `Need` beats `Greed`, higher rolls beat lower
/// ones, and among equal rolls the earliest bid wins.
pub(crate) fn pick_winner(bids: &[Bid]) -> Option<&Bid> {
    [BidCategory::Need, BidCategory::Greed].into_iter().find_map(|category| {
        bids.iter()
            .filter(|b| b.category == category)
            .filter_map(|b| b.roll.map(|roll| (roll, b)))
            .max_by_key(|(roll, b)| (*roll, Reverse(b.seq)))
            .map(|(_, b)| b)
    })
}

// ---------------------------------------------------------------------------
// Drops
// ---------------------------------------------------------------------------

/// Picks the drops for `session`, which completes at `completed_at`.
///
/// Nothing is written: the drafts go to the store together with the
/// completion itself.
pub(crate) fn plan_drops(
    ctx: &RaidContext,
    session: &RaidSession,
    completed_at: Timestamp,
) -> Result<Vec<DropDraft>, RaidError> {
    let config = &ctx.config;
    let max_level = session.min_level.saturating_add(config.loot_level_allowance);
    let pool = ctx.items.items_up_to_level(max_level)?;
    let picked = choose_items(pool, session.difficulty.drop_count(), &mut rand::rng());

    if picked.is_empty() {
        warn!(session_id = %session.id, max_level, "no eligible items, nothing drops");
    }

    let closes_at = completed_at.saturating_add(config.bid_window);
    Ok(picked
        .into_iter()
        .map(|item| DropDraft {
            item_id: item.id,
            item_name: item.name,
            bid_deadline: closes_at,
        })
        .collect())
}

/// Tells the community bidding is open on `drops`.
pub(crate) fn announce_loot(ctx: &RaidContext, session: &RaidSession, drops: &[LootDrop]) {
    let Some(closes_at) = drops.first().map(|d| d.bid_deadline) else {
        return;
    };
    info!(session_id = %session.id, drops = drops.len(), %closes_at, "loot opened");

    ctx.announce(
        session.community,
        Announcement::LootOpened {
            session: session.id,
            drops: drops
                .iter()
                .map(|d| DropSummary {
                    drop_id: d.id,
                    item_id: d.item_id,
                    item_name: d.item_name.clone(),
                })
                .collect(),
            closes_at,
        },
    );
}

// ---------------------------------------------------------------------------
// Bidding
// ---------------------------------------------------------------------------

/// Places one bid. Checks, in order: the drop exists, is unsettled, is still
/// open, the player took part, and has not bid on it yet.
pub(crate) fn place_bid(
    ctx: &RaidContext,
    drop_id: DropId,
    player: PlayerId,
    category: BidCategory,
) -> Result<Bid, RaidError> {
    let drop = ctx.store.loot_drop(drop_id)?;
    if drop.is_settled() {
        return Err(RaidError::DropResolved(drop_id));
    }
    let now = ctx.clock.now();
    if now.has_reached(drop.bid_deadline) {
        return Err(RaidError::BiddingClosed(drop_id));
    }
    if ctx.store.participant(drop.session_id, player)?.is_none() {
        return Err(RaidError::NotParticipant(player, drop.session_id));
    }

    let roll = category
        .rolls()
        .then(|| rand::rng().random_range(1..=ctx.config.roll_max));
    let bid = ctx.store.insert_bid(BidDraft {
        drop_id,
        player,
        category,
        roll,
        placed_at: now,
    })?;

    debug!(
        session_id = %drop.session_id,
        drop_id = %drop_id,
        %player,
        %category,
        roll = ?bid.roll,
        "bid placed"
    );
    Ok(bid)
}

/// Bids `category` on every open drop of `session` the player has not bid
/// on yet. Returns the bids placed.
pub(crate) fn place_bids(
    ctx: &RaidContext,
    session: SessionId,
    player: PlayerId,
    category: BidCategory,
) -> Result<Vec<Bid>, RaidError> {
    ctx.store.session(session)?;
    if ctx.store.participant(session, player)?.is_none() {
        return Err(RaidError::NotParticipant(player, session));
    }

    let now = ctx.clock.now();
    let mut placed = Vec::new();
    for drop in ctx.store.drops(session)? {
        if drop.is_settled() || now.has_reached(drop.bid_deadline) {
            continue;
        }
        match place_bid(ctx, drop.id, player, category) {
            Ok(bid) => placed.push(bid),
            // Already bid, or the drop closed in the meantime.
            Err(
                RaidError::AlreadyBid(..)
                | RaidError::DropResolved(_)
                | RaidError::BiddingClosed(_),
            ) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(placed)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Settles one drop.
///
/// The winner's inventory is credited before the drop is marked settled,
/// keyed by the drop so a retry never credits twice. If either step fails
/// the drop stays open for the next sweep to retry. Callers must hold the
/// context's loot gate.
pub(crate) fn resolve_drop(ctx: &RaidContext, drop: &LootDrop) -> Result<LootOutcome, RaidError> {
    let bids = ctx.store.bids(drop.id)?;
    let session = ctx.store.session(drop.session_id)?;
    let now = ctx.clock.now();

    let outcome = match pick_winner(&bids) {
        Some(bid) => {
            let (winner, category, roll) = (bid.player, bid.category, bid.roll.unwrap_or(0));
            ctx.profiles.grant_item(winner, drop.item_id, drop.id)?;
            settle(ctx, drop.id, Some(winner), now)?;
            info!(
                session_id = %session.id,
                drop_id = %drop.id,
                item = %drop.item_name,
                %winner,
                %category,
                roll,
                "loot awarded"
            );
            ctx.announce(
                session.community,
                Announcement::LootAwarded {
                    session: session.id,
                    drop_id: drop.id,
                    item_name: drop.item_name.clone(),
                    winner,
                    category,
                    roll,
                },
            );
            LootOutcome::Awarded {
                winner,
                category,
                roll,
            }
        }
        None => {
            settle(ctx, drop.id, None, now)?;
            info!(session_id = %session.id, drop_id = %drop.id, item = %drop.item_name, "loot wasted");
            ctx.announce(
                session.community,
                Announcement::LootWasted {
                    session: session.id,
                    drop_id: drop.id,
                    item_name: drop.item_name.clone(),
                },
            );
            LootOutcome::Wasted
        }
    };
    Ok(outcome)
}

fn settle(
    ctx: &RaidContext,
    drop: DropId,
    winner: Option<PlayerId>,
    at: Timestamp,
) -> Result<(), RaidError> {
    match ctx.store.settle_drop(drop, winner, at) {
        Ok(_) => Ok(()),
        Err(StoreError::DropSettled(_)) => {
            warn!(drop_id = %drop, "drop was settled by someone else");
            Err(RaidError::DropResolved(drop))
        }
        Err(e) => Err(e.into()),
    }
}
