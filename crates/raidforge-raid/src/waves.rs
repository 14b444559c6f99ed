//! Wave composition.
//!
//! Every wave of a session is planned up front from the enemies in the
//! level band, scaled by the difficulty multiplier `m`:
//!
//! | wave        | enemy                     | count            | health                    |
//! |-------------|---------------------------|------------------|---------------------------|
//! | first       | random, not the boss      | `max(1, ⌊5m⌋)`   | `⌊h · 5 · m⌋`             |
//! | middle      | random, not the boss      | `max(1, ⌊3m⌋)`   | `⌊h · 3 · m · 1.5⌋`       |
//! | last (boss) | highest level in the band | 1                | `⌊h · 10 · m⌋`            |
//!
//! A single-wave session is just the boss. Health never drops below 1.

use raidforge_protocol::{Difficulty, EnemyGroup, WavePlan};
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::EnemyDef;

const SWARM_SIZE: f64 = 5.0;
const ELITE_SIZE: f64 = 3.0;
const ELITE_TOUGHNESS: f64 = 1.5;
const BOSS_TOUGHNESS: f64 = 10.0;

/// Plans `wave_count` waves from `enemies`. Returns nothing if `enemies` is
/// empty.
pub(crate) fn compose_waves<R: Rng + ?Sized>(
    enemies: &[EnemyDef],
    difficulty: Difficulty,
    wave_count: u32,
    rng: &mut R,
) -> Vec<WavePlan> {
    let Some(boss) = enemies.iter().max_by_key(|e| (e.level, e.health)) else {
        return Vec::new();
    };
    let minions: Vec<&EnemyDef> = if enemies.len() > 1 {
        enemies.iter().filter(|e| e.id != boss.id).collect()
    } else {
        vec![boss]
    };
    let m = difficulty.multiplier();

    (1..=wave_count)
        .map(|number| {
            if number == wave_count {
                wave(boss, 1, boss.health as f64 * BOSS_TOUGHNESS * m, true)
            } else {
                // `minions` is never empty: it holds at least the boss.
                let enemy = minions.choose(&mut *rng).copied().unwrap_or(boss);
                if number == 1 {
                    let count = scaled_count(SWARM_SIZE, m);
                    wave(enemy, count, enemy.health as f64 * SWARM_SIZE * m, false)
                } else {
                    let count = scaled_count(ELITE_SIZE, m);
                    let health = enemy.health as f64 * ELITE_SIZE * m * ELITE_TOUGHNESS;
                    wave(enemy, count, health, false)
                }
            }
        })
        .collect()
}

fn scaled_count(base: f64, m: f64) -> u32 {
    ((base * m).floor() as u32).max(1)
}

fn wave(enemy: &EnemyDef, count: u32, health: f64, is_boss: bool) -> WavePlan {
    WavePlan {
        enemies: vec![EnemyGroup {
            enemy_id: enemy.id,
            name: enemy.name.clone(),
            count,
        }],
        total_health: (health.floor() as u64).max(1),
        is_boss,
    }
}
