//! Tunable parameters for a maze chase session.
//!
//! Every section deserialises with defaults, so a TOML file only needs to
//! name the values it overrides.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_SEED: u64 = 0x6d61_7a65_6368_6173;

/// Root configuration consumed by the world, the systems and the adapters.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChaseConfig {
    /// Seed for the world's random number generator.
    pub seed: u64,
    /// Maze dimensions, geometry and object placement.
    pub maze: MazeConfig,
    /// Navigation surface bake parameters.
    pub navigation: NavigationConfig,
    /// Pursuer movement and perception.
    pub pursuer: PursuerConfig,
    /// Round pipeline timing.
    pub lifecycle: LifecycleConfig,
    /// Slowing traps dropped by the target.
    pub traps: TrapConfig,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            maze: MazeConfig::default(),
            navigation: NavigationConfig::default(),
            pursuer: PursuerConfig::default(),
            lifecycle: LifecycleConfig::default(),
            traps: TrapConfig::default(),
        }
    }
}

impl ChaseConfig {
    /// Checks that every value describes a playable session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maze.initial_size < 2 {
            return Err(ConfigError::MazeTooSmall {
                size: self.maze.initial_size,
            });
        }
        if self.maze.win_size < self.maze.initial_size {
            return Err(ConfigError::WinSizeBelowInitial {
                initial: self.maze.initial_size,
                win: self.maze.win_size,
            });
        }
        if self.maze.rows_per_step == 0 {
            return Err(ConfigError::NotPositive("maze.rows_per_step"));
        }
        if self.navigation.rows_per_poll == 0 {
            return Err(ConfigError::NotPositive("navigation.rows_per_poll"));
        }
        if self.pursuer.retarget_interval_ms == 0 {
            return Err(ConfigError::NotPositive("pursuer.retarget_interval_ms"));
        }

        let positive = [
            ("maze.cell_spacing", self.maze.cell_spacing),
            ("maze.target_radius", self.maze.target_radius),
            ("navigation.agent_height", self.navigation.agent_height),
            ("pursuer.base_speed", self.pursuer.base_speed),
            ("pursuer.boosted_speed", self.pursuer.boosted_speed),
            (
                "pursuer.rotation_speed_degrees",
                self.pursuer.rotation_speed_degrees,
            ),
            ("pursuer.arrival_distance", self.pursuer.arrival_distance),
            ("traps.detection_radius", self.traps.detection_radius),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive(name));
            }
        }

        let non_negative = [
            ("navigation.extra_bounds", self.navigation.extra_bounds),
            ("pursuer.attack_range", self.pursuer.attack_range),
            (
                "pursuer.line_of_sight_distance",
                self.pursuer.line_of_sight_distance,
            ),
            ("pursuer.stopping_distance", self.pursuer.stopping_distance),
            ("pursuer.moved_threshold", self.pursuer.moved_threshold),
            ("pursuer.search_radius", self.pursuer.search_radius),
            ("pursuer.snap_distance", self.pursuer.snap_distance),
            ("traps.slow_factor", self.traps.slow_factor),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Negative(name));
            }
        }

        if self.navigation.agent_radius * 2.0 >= self.maze.cell_spacing {
            return Err(ConfigError::AgentTooWide {
                radius: self.navigation.agent_radius,
                spacing: self.maze.cell_spacing,
            });
        }

        Ok(())
    }
}

/// Maze dimensions, geometry and object placement.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    /// Edge length of the first round's maze.
    pub initial_size: u32,
    /// The session is won once the maze would grow beyond this size.
    pub win_size: u32,
    /// Distance between neighbouring cell centres in world units.
    pub cell_spacing: f32,
    /// One trigger zone is scattered per this many cells.
    pub tiles_per_trigger_zone: u32,
    /// Minimum grid distance between a trigger zone and the start or end cell.
    pub min_trigger_distance: f32,
    /// Radius of the exit trigger around the end marker.
    pub end_trigger_radius: f32,
    /// Radius of the target's body.
    pub target_radius: f32,
    /// Grid rows placed before the structure step yields.
    pub rows_per_step: u32,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            initial_size: 5,
            win_size: 20,
            cell_spacing: 1.2,
            tiles_per_trigger_zone: 10,
            min_trigger_distance: 2.0,
            end_trigger_radius: 0.4,
            target_radius: 0.3,
            rows_per_step: 5,
        }
    }
}

/// Navigation surface bake parameters.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Clearance kept between the walkable area and blocking geometry.
    pub agent_radius: f32,
    /// Geometry starting above this height does not block the agent.
    pub agent_height: f32,
    /// Floors steeper than this are not walkable.
    pub max_slope_degrees: f32,
    /// Geometry no taller than this can be stepped over.
    pub step_height: f32,
    /// Margin added around the maze when computing bake bounds.
    pub extra_bounds: f32,
    /// Lattice rows processed per bake poll.
    pub rows_per_poll: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            agent_radius: 0.2,
            agent_height: 1.5,
            max_slope_degrees: 45.0,
            step_height: 0.4,
            extra_bounds: 2.0,
            rows_per_poll: 8,
        }
    }
}

/// Pursuer movement and perception.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PursuerConfig {
    /// Speed used while the target is close along the path.
    pub base_speed: f32,
    /// Speed used while the target is far along the path.
    pub boosted_speed: f32,
    /// Path length above which the boosted speed applies.
    pub boost_distance: f32,
    /// Maximum turn rate while facing the direction of travel.
    pub rotation_speed_degrees: f32,
    /// Distance at which the target is caught.
    pub attack_range: f32,
    /// Length of the line-of-sight ray.
    pub line_of_sight_distance: f32,
    /// Period between retargeting decisions.
    pub retarget_interval_ms: u64,
    /// Delay before the first retargeting decision after activation.
    pub first_retarget_delay_ms: u64,
    /// Movement halts when the remaining path is within this distance.
    pub stopping_distance: f32,
    /// Slack beyond `stopping_distance` within which the destination counts
    /// as reached.
    pub arrival_distance: f32,
    /// Target displacement that forces a retarget without line of sight.
    pub moved_threshold: f32,
    /// Radius around the last known position sampled while searching.
    pub search_radius: f32,
    /// Maximum distance for snapping onto the surface at activation.
    pub snap_distance: f32,
    /// Samples drawn per search decision before giving up until next period.
    pub search_attempts: u32,
}

impl Default for PursuerConfig {
    fn default() -> Self {
        Self {
            base_speed: 0.8,
            boosted_speed: 1.5,
            boost_distance: 8.0,
            rotation_speed_degrees: 120.0,
            attack_range: 0.4,
            line_of_sight_distance: 3.0,
            retarget_interval_ms: 200,
            first_retarget_delay_ms: 100,
            stopping_distance: 0.5,
            arrival_distance: 0.5,
            moved_threshold: 1.0,
            search_radius: 3.0,
            snap_distance: 2.0,
            search_attempts: 8,
        }
    }
}

impl PursuerConfig {
    /// Period between retargeting decisions.
    #[must_use]
    pub fn retarget_interval(&self) -> Duration {
        Duration::from_millis(self.retarget_interval_ms)
    }

    /// Delay before the first retargeting decision.
    #[must_use]
    pub fn first_retarget_delay(&self) -> Duration {
        Duration::from_millis(self.first_retarget_delay_ms)
    }
}

/// Round pipeline timing.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Delay between the surface becoming ready and the pursuer spawning.
    pub spawn_delay_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            spawn_delay_ms: 1_000,
        }
    }
}

impl LifecycleConfig {
    /// Delay between the surface becoming ready and the pursuer spawning.
    #[must_use]
    pub fn spawn_delay(&self) -> Duration {
        Duration::from_millis(self.spawn_delay_ms)
    }
}

/// Slowing traps dropped by the target.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    /// Minimum time between two drops.
    pub cooldown_ms: u64,
    /// Distance from a trap at which a body sets it off.
    pub detection_radius: f32,
    /// Speed multiplier applied to whoever sets a trap off.
    pub slow_factor: f32,
    /// How long the slow lasts.
    pub slow_duration_ms: u64,
    /// Age before a trap can catch the target that dropped it.
    pub creator_grace_ms: u64,
    /// Age at which an untouched trap disappears.
    pub lifetime_ms: u64,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 3_000,
            detection_radius: 0.5,
            slow_factor: 0.3,
            slow_duration_ms: 2_000,
            creator_grace_ms: 1_000,
            lifetime_ms: 60_000,
        }
    }
}

impl TrapConfig {
    /// Minimum time between two drops.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// How long a triggered slow lasts.
    #[must_use]
    pub fn slow_duration(&self) -> Duration {
        Duration::from_millis(self.slow_duration_ms)
    }

    /// Age before a trap can catch the target that dropped it.
    #[must_use]
    pub fn creator_grace(&self) -> Duration {
        Duration::from_millis(self.creator_grace_ms)
    }

    /// Age at which an untouched trap disappears.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms)
    }
}

/// Reasons a configuration is rejected.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The first maze would not separate start and end.
    #[error("initial maze size {size} is below the minimum of 2")]
    MazeTooSmall {
        /// Rejected size.
        size: u32,
    },
    /// The session would be won before the first round.
    #[error("win size {win} is below the initial size {initial}")]
    WinSizeBelowInitial {
        /// Configured initial size.
        initial: u32,
        /// Configured win size.
        win: u32,
    },
    /// A value that must be strictly positive is not.
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    /// A distance or factor is negative, infinite or not a number.
    #[error("{0} must be a finite, non-negative number")]
    Negative(&'static str),
    /// The agent cannot fit through a corridor.
    #[error("agent radius {radius} does not fit between walls {spacing} apart")]
    AgentTooWide {
        /// Configured agent radius.
        radius: f32,
        /// Configured cell spacing.
        spacing: f32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ChaseConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config: ChaseConfig = toml::from_str(
            r#"
            seed = 7

            [maze]
            initial_size = 4

            [pursuer]
            boost_distance = 12.5
            "#,
        )
        .expect("parse config");

        assert_eq!(config.seed, 7);
        assert_eq!(config.maze.initial_size, 4);
        assert_eq!(config.maze.win_size, MazeConfig::default().win_size);
        assert!((config.pursuer.boost_distance - 12.5).abs() < f32::EPSILON);
        assert_eq!(config.navigation, NavigationConfig::default());
    }

    #[test]
    fn single_cell_maze_is_rejected() {
        let mut config = ChaseConfig::default();
        config.maze.initial_size = 1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MazeTooSmall { size: 1 })
        );
    }

    #[test]
    fn win_size_below_initial_is_rejected() {
        let mut config = ChaseConfig::default();
        config.maze.initial_size = 8;
        config.maze.win_size = 4;
        assert_eq!(
            config.validate(),
            Err(ConfigError::WinSizeBelowInitial { initial: 8, win: 4 })
        );
    }

    #[test]
    fn non_positive_speed_is_rejected() {
        let mut config = ChaseConfig::default();
        config.pursuer.base_speed = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive("pursuer.base_speed"))
        );
    }

    #[test]
    fn unreachable_arrival_is_rejected() {
        let mut config = ChaseConfig::default();
        config.pursuer.arrival_distance = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive("pursuer.arrival_distance"))
        );
    }

    #[test]
    fn distances_must_be_finite_and_non_negative() {
        type Field = fn(&mut ChaseConfig) -> &mut f32;
        let fields: [(&str, Field); 8] = [
            ("navigation.extra_bounds", |c| &mut c.navigation.extra_bounds),
            ("pursuer.attack_range", |c| &mut c.pursuer.attack_range),
            ("pursuer.line_of_sight_distance", |c| {
                &mut c.pursuer.line_of_sight_distance
            }),
            ("pursuer.stopping_distance", |c| &mut c.pursuer.stopping_distance),
            ("pursuer.moved_threshold", |c| &mut c.pursuer.moved_threshold),
            ("pursuer.search_radius", |c| &mut c.pursuer.search_radius),
            ("pursuer.snap_distance", |c| &mut c.pursuer.snap_distance),
            ("traps.slow_factor", |c| &mut c.traps.slow_factor),
        ];

        for (name, field) in fields {
            for bad in [-1.0, f32::NAN, f32::INFINITY] {
                let mut config = ChaseConfig::default();
                *field(&mut config) = bad;
                assert_eq!(
                    config.validate(),
                    Err(ConfigError::Negative(name)),
                    "{name} = {bad}"
                );
            }
            let mut config = ChaseConfig::default();
            *field(&mut config) = 0.0;
            assert_eq!(config.validate(), Ok(()), "{name} = 0");
        }
    }

    #[test]
    fn infinite_arrival_is_rejected() {
        let mut config = ChaseConfig::default();
        config.pursuer.arrival_distance = f32::INFINITY;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive("pursuer.arrival_distance"))
        );
    }

    #[test]
    fn durations_convert_from_milliseconds() {
        let config = ChaseConfig::default();
        assert_eq!(
            config.pursuer.retarget_interval(),
            Duration::from_millis(200)
        );
        assert_eq!(config.lifecycle.spawn_delay(), Duration::from_secs(1));
        assert_eq!(config.traps.cooldown(), Duration::from_secs(3));
        assert_eq!(config.traps.slow_duration(), Duration::from_secs(2));
    }
}
