use std::time::Duration;

use glam::Vec2;
use merge_six_system_combo as combo;
use merge_six_system_drag_targeting::{self as drag_targeting, BoardLayout};
use merge_six_system_lifecycle::{self as lifecycle, LoneTilePolicy};
use merge_six_system_merge as merge;
use merge_six_system_persistence as persistence;
use merge_six_system_wild_meter as wild_meter;
use merge_six_world::WorldConfig;
use serde::Deserialize;

/// Treatment of a board left with a single numbered tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoneTile {
    /// The board is stuck.
    #[default]
    Stuck,
    /// A rescue spawn is attempted first.
    Rescue,
}

/// Every tunable of a game session, loadable from TOML.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of tile columns.
    pub columns: u32,
    /// Number of tile rows.
    pub rows: u32,
    /// Seed feeding every random decision.
    pub seed: u64,
    /// Moves granted per board.
    pub moves_per_board: u32,
    /// Boards per level.
    pub boards_per_level: u32,
    /// Points awarded per remaining move when a board clears.
    pub clear_bonus_per_move: u64,
    /// Idle window after which the combo lapses, in milliseconds.
    pub combo_timeout_ms: u64,
    /// Wild meter charge added by an accumulating merge.
    pub wild_accumulate_charge: f64,
    /// Wild meter charge added by an explosion.
    pub wild_explosion_charge: f64,
    /// Backoff before retrying a failed wild spawn, in milliseconds.
    pub wild_retry_ms: u64,
    /// Fallback delay before evaluating a board without a visual signal, in milliseconds.
    pub visual_fallback_ms: u64,
    /// Duration of the end-of-board flow, in milliseconds.
    pub end_delay_ms: u64,
    /// Upper bound of tiles opened by a rescue spawn.
    pub rescue_max: u32,
    /// Treatment of a board left with a single numbered tile.
    pub lone_tile: LoneTile,
    /// Whether the first explosion of a session leaves a wild behind.
    pub first_explosion_wild: bool,
    /// Minimum overlap ratio for a drag target.
    pub target_threshold: f32,
    /// Strength of the magnetic assist.
    pub assist_pull: f32,
    /// Side length of a tile in world units.
    pub tile_size: f32,
    /// Gap between neighbouring tiles in world units.
    pub tile_gap: f32,
    /// Key under which the session is stored.
    pub storage_key: String,
    /// Maximum age of a loadable snapshot, in hours.
    pub max_snapshot_age_hours: u64,
    /// Whether merges are saved as soon as they settle.
    pub autosave: bool,
    /// Whether visual tickets complete immediately, for headless play.
    pub auto_complete_visuals: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            columns: 5,
            rows: 6,
            seed: 0x6d65_7267_655f_7369,
            moves_per_board: 30,
            boards_per_level: 3,
            clear_bonus_per_move: 5,
            combo_timeout_ms: 2_000,
            wild_accumulate_charge: 0.10,
            wild_explosion_charge: 0.22,
            wild_retry_ms: 600,
            visual_fallback_ms: 900,
            end_delay_ms: 1_200,
            rescue_max: 3,
            lone_tile: LoneTile::Stuck,
            first_explosion_wild: true,
            target_threshold: 0.06,
            assist_pull: 0.35,
            tile_size: 100.0,
            tile_gap: 8.0,
            storage_key: persistence::DEFAULT_KEY.to_owned(),
            max_snapshot_age_hours: 24,
            autosave: true,
            auto_complete_visuals: false,
        }
    }
}

impl SessionConfig {
    pub(crate) fn world(&self) -> WorldConfig {
        WorldConfig::new(self.columns, self.rows, self.seed)
            .with_moves_per_board(self.moves_per_board)
            .with_boards_per_level(self.boards_per_level)
            .with_clear_bonus_per_move(self.clear_bonus_per_move)
    }

    pub(crate) fn merge(&self) -> merge::Config {
        merge::Config::new(self.first_explosion_wild)
    }

    pub(crate) fn drag_targeting(&self) -> drag_targeting::Config {
        drag_targeting::Config::new(self.target_threshold).with_pull(self.assist_pull)
    }

    /// World-space layout of the board cells.
    #[must_use]
    pub fn layout(&self) -> BoardLayout {
        BoardLayout::new(Vec2::ZERO, self.tile_size, self.tile_gap)
    }

    pub(crate) fn combo(&self) -> combo::Config {
        combo::Config::new(Duration::from_millis(self.combo_timeout_ms))
    }

    pub(crate) fn wild_meter(&self) -> wild_meter::Config {
        wild_meter::Config::new(
            self.wild_accumulate_charge,
            self.wild_explosion_charge,
            Duration::from_millis(self.wild_retry_ms),
        )
    }

    pub(crate) fn lifecycle(&self) -> lifecycle::Config {
        let policy = match self.lone_tile {
            LoneTile::Stuck => LoneTilePolicy::Stuck,
            LoneTile::Rescue => LoneTilePolicy::Rescue,
        };
        lifecycle::Config::new(
            Duration::from_millis(self.visual_fallback_ms),
            Duration::from_millis(self.end_delay_ms),
        )
        .with_rescue_max(self.rescue_max)
        .with_lone_tile_policy(policy)
    }

    /// Storage key and snapshot age limit.
    #[must_use]
    pub fn persistence(&self) -> persistence::Config {
        persistence::Config::new(
            self.storage_key.clone(),
            Duration::from_secs(self.max_snapshot_age_hours.saturating_mul(60 * 60)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SessionConfig = toml::from_str(
            r#"
            columns = 4
            seed = 12
            lone_tile = "rescue"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.columns, 4);
        assert_eq!(config.rows, 6);
        assert_eq!(config.seed, 12);
        assert_eq!(config.lone_tile, LoneTile::Rescue);
        assert_eq!(config.combo_timeout_ms, 2_000);
    }
}
