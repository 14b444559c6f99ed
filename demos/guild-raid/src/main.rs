//! A complete raid on a sped-up clock: four players enroll, fight three
//! waves, and roll on the loot. Announcements are printed as JSON lines,
//! the way a chat gateway would receive them.
//!
//! ```text
//! cargo run -p guild-raid [-- path/to/raidforge.json]
//! RUST_LOG=debug cargo run -p guild-raid
//! ```

use std::sync::Arc;
use std::time::Duration;

use raidforge::prelude::*;
use raidforge::protocol::EnemyId;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// World data
// ---------------------------------------------------------------------------

fn catalog() -> StaticCatalog {
    let enemies = vec![
        EnemyDef { id: EnemyId(1), name: "Crypt Rat".into(), level: 10, health: 30 },
        EnemyDef { id: EnemyId(2), name: "Ghoul".into(), level: 11, health: 45 },
        EnemyDef { id: EnemyId(3), name: "Wraith".into(), level: 13, health: 70 },
        EnemyDef { id: EnemyId(4), name: "Bone Golem".into(), level: 14, health: 110 },
        EnemyDef { id: EnemyId(5), name: "Lich King".into(), level: 15, health: 220 },
    ];
    let items = vec![
        ItemDef { id: ItemId(1), name: "Ghoulhide Boots".into(), level_required: 10, rarity: Rarity::Uncommon },
        ItemDef { id: ItemId(2), name: "Wraithcloak".into(), level_required: 12, rarity: Rarity::Rare },
        ItemDef { id: ItemId(3), name: "Golem Core".into(), level_required: 14, rarity: Rarity::Rare },
        ItemDef { id: ItemId(4), name: "Phylactery Shard".into(), level_required: 18, rarity: Rarity::Legendary },
        ItemDef { id: ItemId(5), name: "Crown of the Lich".into(), level_required: 20, rarity: Rarity::Epic },
        ItemDef { id: ItemId(6), name: "Rusty Blade".into(), level_required: 1, rarity: Rarity::Common },
    ];
    StaticCatalog::new(enemies, items)
}

/// Every timer shortened so the whole raid runs in a few seconds.
fn fast_config() -> ServiceConfig {
    ServiceConfig {
        raid: RaidConfig {
            enrollment_window: Duration::from_secs(2),
            round_interval: Duration::from_millis(150),
            wave_interval: Duration::from_millis(400),
            bid_window: Duration::from_secs(2),
            loot_sweep_interval: Duration::from_millis(500),
            expiry_sweep_interval: Duration::from_secs(1),
            ..RaidConfig::default()
        },
        ..ServiceConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), RaidforgeError> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(path)?,
        None => fast_config(),
    };
    init_tracing(&config.log_filter);

    let profiles = Arc::new(InMemoryProfiles::new());
    let guild = [(PlayerId(1), 14, 55), (PlayerId(2), 12, 48), (PlayerId(3), 16, 70), (PlayerId(4), 10, 35)];
    for (player, level, attack) in guild {
        profiles.insert(player, level, attack);
    }

    let catalog = Arc::new(catalog());
    let (messenger, mut announcements) = ChannelMessenger::new();
    let printer = tokio::spawn(async move {
        while let Some((community, msg)) = announcements.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => println!("[{community}] {json}"),
                Err(e) => warn!(error = %e, "cannot render announcement"),
            }
        }
    });

    let service = RaidService::builder()
        .config(config)
        .profiles(profiles.clone())
        .enemies(catalog.clone())
        .items(catalog)
        .messenger(Arc::new(messenger))
        .start()
        .await?;
    let engine = service.engine().clone();

    let community = CommunityId(1);
    let session = match engine.active_session(community)? {
        Some(id) => {
            info!(session_id = %id, "raid already running, following it");
            engine.status(id)?.session
        }
        None => engine.create_session(community, Difficulty::Normal, 10).await?,
    };

    for (player, ..) in guild {
        if let Err(e) = engine.join(session.id, player).await {
            warn!(%player, error = %e, "join refused");
        }
    }

    let outcome = loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let view = engine.status(session.id)?;
        if view.session.status.is_terminal() {
            break view;
        }
    };

    if outcome.session.status == RaidStatus::Completed {
        let categories = [BidCategory::Need, BidCategory::Greed, BidCategory::Greed, BidCategory::Pass];
        for ((player, ..), category) in guild.into_iter().zip(categories) {
            engine.bid_all(session.id, player, category).await?;
        }

        loop {
            tokio::time::sleep(Duration::from_millis(250)).await;
            if engine.status(session.id)?.drops.iter().all(LootDrop::is_settled) {
                break;
            }
        }
    }

    let view = engine.status(session.id)?;
    println!();
    println!("raid {} ended {}", view.session.id, view.session.status);
    for p in &view.participants {
        let profile = profiles.profile(p.player).unwrap_or_default();
        let items: u32 = profile.inventory.values().sum();
        println!(
            "  {:>8}  damage {:>6}  experience {:>5}  items {}",
            p.player.to_string(),
            p.damage_dealt,
            profile.experience,
            items
        );
    }
    for drop in &view.drops {
        match drop.winner {
            Some(winner) => println!("  {} -> {}", drop.item_name, winner),
            None => println!("  {} -> nobody", drop.item_name),
        }
    }

    service.shutdown().await;
    printer.abort();
    Ok(())
}
