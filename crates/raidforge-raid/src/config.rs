//! Raid tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// RaidConfig
// ---------------------------------------------------------------------------

/// Timing, sizing and balance settings for every raid the engine runs.
///
/// Missing fields deserialize to their defaults, so a config file only has
/// to name what it changes. Durations are written as seconds, fractions
/// allowed: `"round_interval": 0.5`. Always pass through [`validated`] before use;
/// [`RaidEngine::new`](crate::RaidEngine::new) does this for you.
///
/// [`validated`]: RaidConfig::validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaidConfig {
    /// How long a new session accepts joins.
    #[serde(with = "secs")]
    pub enrollment_window: Duration,

    /// Wall time from creation after which an unfinished session is
    /// reclaimed by the expiry sweep.
    #[serde(with = "secs")]
    pub session_time_budget: Duration,

    /// Fewest players needed when enrollment closes.
    pub min_participants: usize,

    /// Most players a session will accept.
    pub max_participants: usize,

    /// Waves per session. The first is a swarm, the last is the boss, the
    /// ones between are elites.
    pub wave_count: u32,

    /// Enemies are drawn from `[min_level, min_level + level_band]`.
    pub level_band: u32,

    /// Fewest enemy definitions the band must hold to open a session.
    pub min_enemy_kinds: usize,

    /// Loot is drawn from items requiring at most
    /// `min_level + loot_level_allowance`.
    pub loot_level_allowance: u32,

    /// Pause between combat rounds.
    #[serde(with = "secs")]
    pub round_interval: Duration,

    /// Pause between waves.
    #[serde(with = "secs")]
    pub wave_interval: Duration,

    /// Announce wave progress every this many rounds.
    pub progress_every_rounds: u32,

    /// Floor on a single player's damage in one round.
    pub min_round_damage: u64,

    /// Per-round damage variance, inclusive on both ends.
    pub damage_variance_min: i64,
    pub damage_variance_max: i64,

    /// How long drops stay open for bids after completion.
    #[serde(with = "secs")]
    pub bid_window: Duration,

    /// Need and greed rolls are drawn from `1..=roll_max`.
    pub roll_max: u32,

    /// Experience pool per point of the session's minimum level.
    pub experience_per_level: u64,

    #[serde(with = "secs")]
    pub expiry_sweep_interval: Duration,
    #[serde(with = "secs")]
    pub loot_sweep_interval: Duration,

    /// How long a finished session stays in the store after its hard
    /// deadline before the expiry sweep prunes it.
    #[serde(with = "secs")]
    pub history_retention: Duration,

    /// Bound on each session actor's command queue.
    pub command_channel_size: usize,
}

impl Default for RaidConfig {
    fn default() -> Self {
        Self {
            enrollment_window: Duration::from_secs(120),
            session_time_budget: Duration::from_secs(30 * 60),
            min_participants: 3,
            max_participants: 10,
            wave_count: 3,
            level_band: 5,
            min_enemy_kinds: 3,
            loot_level_allowance: 10,
            round_interval: Duration::from_secs(2),
            wave_interval: Duration::from_secs(5),
            progress_every_rounds: 3,
            min_round_damage: 10,
            damage_variance_min: -5,
            damage_variance_max: 15,
            bid_window: Duration::from_secs(60),
            roll_max: 100,
            experience_per_level: 50,
            expiry_sweep_interval: Duration::from_secs(30),
            loot_sweep_interval: Duration::from_secs(10),
            history_retention: Duration::from_secs(24 * 60 * 60),
            command_channel_size: 64,
        }
    }
}

impl RaidConfig {
    /// Clamps values that would break the engine, logging each change.
    pub fn validated(mut self) -> Self {
        if self.min_participants == 0 {
            warn!("min_participants is 0, clamping to 1");
            self.min_participants = 1;
        }
        if self.max_participants < self.min_participants {
            warn!(
                max = self.max_participants,
                min = self.min_participants,
                "max_participants below min_participants, raising"
            );
            self.max_participants = self.min_participants;
        }
        if self.wave_count == 0 {
            warn!("wave_count is 0, clamping to 1");
            self.wave_count = 1;
        }
        if self.min_enemy_kinds == 0 {
            warn!("min_enemy_kinds is 0, clamping to 1");
            self.min_enemy_kinds = 1;
        }
        if self.progress_every_rounds == 0 {
            warn!("progress_every_rounds is 0, clamping to 1");
            self.progress_every_rounds = 1;
        }
        if self.damage_variance_min > self.damage_variance_max {
            warn!(
                min = self.damage_variance_min,
                max = self.damage_variance_max,
                "damage variance range is inverted, swapping"
            );
            std::mem::swap(&mut self.damage_variance_min, &mut self.damage_variance_max);
        }
        if self.roll_max == 0 {
            warn!("roll_max is 0, clamping to 1");
            self.roll_max = 1;
        }
        if self.command_channel_size == 0 {
            warn!("command_channel_size is 0, clamping to 1");
            self.command_channel_size = 1;
        }
        self
    }
}

/// Serde for [`Duration`] as a number of seconds.
///
/// Whole seconds are written as integers, anything finer as a float.
mod secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if d.subsec_nanos() == 0 {
            serializer.serialize_u64(d.as_secs())
        } else {
            serializer.serialize_f64(d.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| D::Error::custom(format!("{secs} is not a valid number of seconds")))
    }
}
