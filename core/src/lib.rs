#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the maze chase engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to. Systems consume event streams, query read-only
//! views of the world, and respond exclusively with new command batches.
//!
//! Grid coordinates use the `(x, z)` ground plane. World positions are
//! [`Vec2`] values whose `x` component maps to world `x` and whose `y`
//! component maps to world `z`.

pub mod config;

use std::{fmt, time::Duration};

pub use glam::Vec2;
use thiserror::Error;

pub use config::{
    ChaseConfig, ConfigError, LifecycleConfig, MazeConfig, NavigationConfig, PursuerConfig,
    TrapConfig,
};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Destroys the current round's maze, markers, obstacles and pursuer, and
    /// invalidates the navigation surface.
    ClearMaze,
    /// Allocates an empty, fully walled grid of the provided size.
    AllocateMaze {
        /// Edge length of the square grid measured in cells.
        size: MazeSize,
    },
    /// Advances structure construction by at most `row_budget` grid rows.
    BuildStructure {
        /// Number of grid rows the world may place before yielding.
        row_budget: u32,
    },
    /// Fixes start and end cells and places markers and trigger zones.
    PlaceObjects,
    /// Adds a maze-owned static obstacle to the scene.
    PlaceObstacle {
        /// Footprint of the obstacle on the ground plane.
        bounds: Aabb,
        /// Height of the obstacle's top above the floor.
        height: f32,
    },
    /// Discards the navigation surface and starts a fresh bake.
    RebuildNavigationSurface,
    /// Places the pursuer at the start cell.
    SpawnPursuer,
    /// Relocates the target entity.
    MoveTarget {
        /// New position of the target on the ground plane.
        position: Vec2,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Reports that a pursuer reached the target.
    ReportTargetCaught,
    /// Reports where the pursuer stands so traps can detect it.
    MovePursuer {
        /// Pursuer position on the ground plane.
        position: Vec2,
    },
    /// Drops a slowing trap at the target's feet, subject to a cooldown.
    DropTrap,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that every trace of the previous round was removed.
    MazeCleared,
    /// Confirms that an empty grid was allocated.
    MazeAllocated {
        /// Size of the allocated grid.
        size: MazeSize,
    },
    /// Reports that a generation request was rejected.
    GenerationRejected {
        /// Reason the request was rejected.
        error: GenerationError,
    },
    /// Reports partial progress while cells are being placed.
    StructureProgress {
        /// Number of grid rows placed so far.
        rows_placed: u32,
        /// Number of grid rows in the maze.
        total_rows: u32,
    },
    /// Confirms that every cell was placed and the spanning tree was carved.
    StructureBuilt {
        /// Size of the carved maze.
        size: MazeSize,
        /// Number of open internal edges in the carved maze.
        open_edges: u64,
    },
    /// Confirms that start, end, markers and trigger zones were placed.
    ObjectsPlaced {
        /// Cell the target starts from.
        start: CellCoord,
        /// Cell holding the exit.
        end: CellCoord,
        /// Number of trigger zones scattered through the maze.
        trigger_zones: u32,
    },
    /// Announces that a navigation surface bake started.
    NavigationSurfaceRebuildStarted {
        /// Generation assigned to the bake.
        generation: SurfaceGeneration,
    },
    /// Announces that a navigation surface was published.
    NavigationSurfaceReady {
        /// Generation of the published surface.
        generation: SurfaceGeneration,
    },
    /// Reports that a bake failed and the surface stays not ready.
    NavigationSurfaceBuildFailed {
        /// Generation of the failed bake.
        generation: SurfaceGeneration,
        /// Reason the bake failed.
        failure: SurfaceBuildFailure,
    },
    /// Confirms that the pursuer was placed in the maze.
    PursuerSpawned {
        /// Spawn position on the ground plane.
        position: Vec2,
    },
    /// Reports that the target touched the exit trigger.
    TargetReachedExit,
    /// Reports that the target entered a trigger zone for the first time.
    TriggerZoneEntered {
        /// Cell hosting the trigger zone.
        cell: CellCoord,
    },
    /// Reports that a pursuer caught the target.
    TargetCaught,
    /// Confirms that a trap was dropped.
    TrapDropped {
        /// Trap position on the ground plane.
        position: Vec2,
    },
    /// Reports that a body set a trap off. The trap is gone afterwards.
    TrapTriggered {
        /// Position of the consumed trap.
        position: Vec2,
        /// Body that set the trap off.
        victim: TrapVictim,
        /// Speed multiplier the victim must apply.
        slow_factor: f32,
        /// How long the victim stays slowed.
        duration: Duration,
    },
}

/// Bodies that can set a trap off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrapVictim {
    /// The target that drops the traps.
    Target,
    /// The pursuer.
    Pursuer,
}

/// Cardinal directions on the `(x, z)` grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Toward increasing `z`.
    North,
    /// Toward increasing `x`.
    East,
    /// Toward decreasing `z`.
    South,
    /// Toward decreasing `x`.
    West,
}

impl Direction {
    /// Every direction in a fixed order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Direction pointing the other way across the same edge.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Unit step along the `(x, z)` axes.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
        }
    }

    /// Dense index in `0..4`, matching [`Direction::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }
}

/// State of a single cell boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WallState {
    /// The boundary can be crossed.
    Open,
    /// The boundary is blocked by a wall.
    Walled,
}

/// Location of a single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    x: u32,
    z: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: u32, z: u32) -> Self {
        Self { x, z }
    }

    /// Zero-based index along the `x` axis.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Zero-based index along the `z` axis.
    #[must_use]
    pub const fn z(&self) -> u32 {
        self.z
    }

    /// Neighbouring cell in the provided direction, if it lies inside a square
    /// grid of edge length `size`.
    #[must_use]
    pub fn neighbor(self, direction: Direction, size: u32) -> Option<CellCoord> {
        let (dx, dz) = direction.offset();
        let x = self.x.checked_add_signed(dx)?;
        let z = self.z.checked_add_signed(dz)?;
        (x < size && z < size).then_some(CellCoord::new(x, z))
    }

    /// Direction leading from `self` to an orthogonally adjacent cell.
    #[must_use]
    pub fn direction_to(self, other: CellCoord) -> Option<Direction> {
        Direction::ALL.into_iter().find(|direction| {
            let (dx, dz) = direction.offset();
            self.x.checked_add_signed(dx) == Some(other.x)
                && self.z.checked_add_signed(dz) == Some(other.z)
        })
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.x.abs_diff(other.x) + self.z.abs_diff(other.z)
    }

    /// Computes the Euclidean distance between two cell coordinates in cells.
    #[must_use]
    pub fn euclidean_distance(self, other: CellCoord) -> f32 {
        let dx = self.x.abs_diff(other.x) as f32;
        let dz = self.z.abs_diff(other.z) as f32;
        (dx * dx + dz * dz).sqrt()
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Edge length of a square maze measured in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MazeSize(u32);

impl MazeSize {
    /// Creates a new maze size.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the edge length in cells.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Size used for the round following a win.
    #[must_use]
    pub const fn doubled(self) -> Self {
        Self(self.0.saturating_mul(2))
    }

    /// Number of cells in the grid.
    #[must_use]
    pub const fn cell_count(&self) -> u64 {
        self.0 as u64 * self.0 as u64
    }
}

impl fmt::Display for MazeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.0)
    }
}

/// Monotonic identifier of a navigation surface bake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceGeneration(u64);

impl SurfaceGeneration {
    /// Creates a generation wrapper with the provided value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the generation.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Generation that follows `self`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Axis-aligned rectangle on the ground plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    min: Vec2,
    max: Vec2,
}

impl Aabb {
    /// Creates a rectangle from its minimum and maximum corners.
    #[must_use]
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Creates a rectangle centred on `center` spanning `size`.
    #[must_use]
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Minimum corner.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Maximum corner.
    #[must_use]
    pub const fn max(&self) -> Vec2 {
        self.max
    }

    /// Centre of the rectangle.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Returns `true` when the rectangle has no area or non-finite corners.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !self.min.is_finite()
            || !self.max.is_finite()
            || self.max.x <= self.min.x
            || self.max.y <= self.min.y
    }

    /// Reports whether the point lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Reports whether the two rectangles overlap or touch.
    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Rectangle grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// Distance along the ray `origin + t * direction` at which it first enters
    /// the rectangle, if that happens within `0..=max_distance`.
    ///
    /// A ray starting inside the rectangle hits at `t = 0`.
    #[must_use]
    pub fn ray_entry(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;

        for (start, dir, low, high) in [
            (origin.x, direction.x, self.min.x, self.max.x),
            (origin.y, direction.y, self.min.y, self.max.y),
        ] {
            if dir.abs() < f32::EPSILON {
                if start < low || start > high {
                    return None;
                }
                continue;
            }

            let inverse = 1.0 / dir;
            let mut near = (low - start) * inverse;
            let mut far = (high - start) * inverse;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t_min = t_min.max(near);
            t_max = t_max.min(far);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }
}

/// Read-only description of the hunted entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetSnapshot {
    /// Current position on the ground plane.
    pub position: Vec2,
    /// Radius of the target's body.
    pub radius: f32,
}

/// Overall state of a play session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No round has been requested yet.
    NotStarted,
    /// Rounds are being played.
    Playing,
    /// The maze grew past the win threshold.
    Won,
    /// The pursuer caught the target.
    Lost,
}

impl SessionState {
    /// Returns `true` for the states that end a session.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Observable stage of the round pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// No pipeline is running.
    Idle,
    /// Previous round state is being destroyed.
    Clearing,
    /// Cells are being placed and the spanning tree carved.
    BuildingStructure,
    /// Start, end, markers and trigger zones are being placed.
    PlacingObjects,
    /// Waiting for the navigation surface to become ready.
    BakingSurface,
    /// Waiting out the delay before the pursuer appears.
    SpawningPursuer,
}

/// Reasons a maze generation request is rejected.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum GenerationError {
    /// The requested grid has no cells.
    #[error("maze size must be at least one cell")]
    InvalidSize,
    /// The grid already holds a maze that was never cleared.
    #[error("maze grid is already populated; clear it before generating again")]
    AlreadyPopulated,
}

/// Reasons a navigation surface bake leaves the surface not ready.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum SurfaceBuildFailure {
    /// The bake bounds have no area.
    #[error("bake bounds are degenerate")]
    DegenerateBounds,
    /// No wall or floor geometry intersects the bake bounds.
    #[error("no structural sources found inside the bake bounds")]
    NoStructuralSources,
    /// Structural geometry was found but no node is walkable.
    #[error("no walkable area inside the bake bounds")]
    NoWalkableArea,
}

/// Reasons a navigation query cannot be answered.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum NavigationQueryFailure {
    /// An endpoint lies too far from any walkable node.
    #[error("query point is off the navigation surface")]
    OffSurface,
    /// Both endpoints are on the surface but not connected.
    #[error("destination is unreachable")]
    Unreachable,
}

/// Reasons a lifecycle request is rejected.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum LifecycleError {
    /// The session already ended; it must be reset before a new round.
    #[error("session already finished in state {state:?}")]
    SessionFinished {
        /// Terminal state the session ended in.
        state: SessionState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_respects_grid_bounds() {
        let origin = CellCoord::new(0, 0);
        assert_eq!(origin.neighbor(Direction::West, 3), None);
        assert_eq!(origin.neighbor(Direction::South, 3), None);
        assert_eq!(
            origin.neighbor(Direction::North, 3),
            Some(CellCoord::new(0, 1))
        );

        let corner = CellCoord::new(2, 2);
        assert_eq!(corner.neighbor(Direction::East, 3), None);
        assert_eq!(corner.neighbor(Direction::North, 3), None);
    }

    #[test]
    fn direction_to_matches_offsets() {
        let origin = CellCoord::new(3, 3);
        for direction in Direction::ALL {
            let neighbor = origin.neighbor(direction, 10).expect("inside grid");
            assert_eq!(origin.direction_to(neighbor), Some(direction));
            assert_eq!(neighbor.direction_to(origin), Some(direction.opposite()));
        }
        assert_eq!(origin.direction_to(CellCoord::new(4, 4)), None);
        assert_eq!(origin.direction_to(origin), None);
    }

    #[test]
    fn maze_size_doubles_and_saturates() {
        assert_eq!(MazeSize::new(5).doubled(), MazeSize::new(10));
        assert_eq!(MazeSize::new(u32::MAX).doubled(), MazeSize::new(u32::MAX));
        assert_eq!(MazeSize::new(5).cell_count(), 25);
    }

    #[test]
    fn ray_entry_hits_box_in_front() {
        let wall = Aabb::new(Vec2::new(1.0, -1.0), Vec2::new(1.2, 1.0));
        let hit = wall.ray_entry(Vec2::ZERO, Vec2::X, 5.0);
        assert!((hit.expect("ray should hit") - 1.0).abs() < 1e-5);
        assert_eq!(wall.ray_entry(Vec2::ZERO, -Vec2::X, 5.0), None);
        assert_eq!(wall.ray_entry(Vec2::ZERO, Vec2::X, 0.5), None);
    }

    #[test]
    fn degenerate_boxes_are_detected() {
        assert!(Aabb::new(Vec2::ZERO, Vec2::ZERO).is_degenerate());
        assert!(Aabb::new(Vec2::ZERO, Vec2::new(f32::NAN, 1.0)).is_degenerate());
        assert!(!Aabb::from_center_size(Vec2::ONE, Vec2::ONE).is_degenerate());
    }
}
