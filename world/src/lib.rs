#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for the maze chase.
//!
//! The world owns the grid maze, the objects placed in it, the navigation
//! surface builder and the target's position. It changes only through
//! [`apply`] and exposes read-only views through [`query`].

pub mod maze;
pub mod navigation;
pub mod scene;
pub mod traps;

use maze_chase_core::{
    Aabb, CellCoord, ChaseConfig, Command, Event, GenerationError, MazeSize, Vec2,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::{
    maze::{Carver, GridMaze},
    navigation::{
        collect_sources, BuildOutcome, BuildSettings, NavigationSurfaceBuilder, SolidSource,
        SourceKind,
    },
    traps::TrapField,
};

const TRIGGER_ZONE_ATTEMPTS: u32 = 100;
const TARGET_HEIGHT: f32 = 1.8;

/// Trigger volume scattered through the maze.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerZone {
    cell: CellCoord,
    bounds: Aabb,
    entered: bool,
}

impl TriggerZone {
    /// Cell hosting the zone.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Footprint of the zone.
    #[must_use]
    pub const fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Reports whether the target already entered the zone this round.
    #[must_use]
    pub const fn is_entered(&self) -> bool {
        self.entered
    }
}

/// Objects placed once the structure is carved.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    start: CellCoord,
    end: CellCoord,
    start_position: Vec2,
    end_position: Vec2,
    sign: Aabb,
    trigger_zones: Vec<TriggerZone>,
}

impl Placement {
    /// Cell the target starts from.
    #[must_use]
    pub const fn start(&self) -> CellCoord {
        self.start
    }

    /// Cell holding the exit.
    #[must_use]
    pub const fn end(&self) -> CellCoord {
        self.end
    }

    /// World position of the start marker.
    #[must_use]
    pub const fn start_position(&self) -> Vec2 {
        self.start_position
    }

    /// World position of the end marker and its trigger.
    #[must_use]
    pub const fn end_position(&self) -> Vec2 {
        self.end_position
    }

    /// Footprint of the instruction sign.
    #[must_use]
    pub const fn sign(&self) -> Aabb {
        self.sign
    }

    /// Trigger zones scattered through the maze.
    #[must_use]
    pub fn trigger_zones(&self) -> &[TriggerZone] {
        &self.trigger_zones
    }
}

#[derive(Clone, Debug, Default)]
struct StructureBuild {
    rows_placed: u32,
    carver: Option<Carver>,
    built: bool,
}

#[derive(Clone, Copy, Debug)]
struct Obstacle {
    bounds: Aabb,
    height: f32,
}

/// Represents the authoritative maze chase world state.
#[derive(Debug)]
pub struct World {
    config: ChaseConfig,
    rng: ChaCha8Rng,
    maze: Option<GridMaze>,
    structure: StructureBuild,
    placement: Option<Placement>,
    obstacles: Vec<Obstacle>,
    builder: NavigationSurfaceBuilder,
    target_position: Vec2,
    pursuer_spawn: Option<Vec2>,
    pursuer_position: Option<Vec2>,
    traps: TrapField,
    target_caught: bool,
    exit_reported: bool,
    tick_index: u64,
}

impl World {
    /// Creates an empty world driven by the provided configuration.
    #[must_use]
    pub fn new(config: ChaseConfig) -> Self {
        let settings = BuildSettings::from_config(&config.maze, &config.navigation);
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            maze: None,
            structure: StructureBuild::default(),
            placement: None,
            obstacles: Vec::new(),
            builder: NavigationSurfaceBuilder::new(settings),
            target_position: Vec2::ZERO,
            pursuer_spawn: None,
            pursuer_position: None,
            traps: TrapField::default(),
            target_caught: false,
            exit_reported: false,
            tick_index: 0,
            config,
        }
    }

    fn spacing(&self) -> f32 {
        self.config.maze.cell_spacing
    }

    fn clear(&mut self) {
        self.maze = None;
        self.structure = StructureBuild::default();
        self.placement = None;
        self.obstacles.clear();
        self.pursuer_spawn = None;
        self.pursuer_position = None;
        self.traps.clear();
        self.target_caught = false;
        self.exit_reported = false;
        self.builder.invalidate();
    }

    fn allocate(&mut self, size: MazeSize, out_events: &mut Vec<Event>) {
        if self.maze.is_some() {
            warn!(%size, "maze allocation rejected: grid still populated");
            out_events.push(Event::GenerationRejected {
                error: GenerationError::AlreadyPopulated,
            });
            return;
        }

        match GridMaze::allocate(size) {
            Ok(maze) => {
                debug!(%size, "maze allocated");
                self.maze = Some(maze);
                self.structure = StructureBuild::default();
                out_events.push(Event::MazeAllocated { size });
            }
            Err(error) => {
                warn!(%size, %error, "maze allocation rejected");
                out_events.push(Event::GenerationRejected { error });
            }
        }
    }

    fn build_structure(&mut self, row_budget: u32, out_events: &mut Vec<Event>) {
        let Some(maze) = self.maze.as_mut() else {
            debug!("structure build requested without an allocated maze");
            return;
        };
        if self.structure.built {
            return;
        }

        let size = maze.size();
        let total_rows = size.get();
        let budget = row_budget.max(1);

        if self.structure.rows_placed < total_rows {
            self.structure.rows_placed = self
                .structure
                .rows_placed
                .saturating_add(budget)
                .min(total_rows);
            out_events.push(Event::StructureProgress {
                rows_placed: self.structure.rows_placed,
                total_rows,
            });
            if self.structure.rows_placed < total_rows {
                return;
            }
        }

        if self.structure.carver.is_none() {
            let origin = maze.start();
            match Carver::start(maze, origin) {
                Ok(carver) => self.structure.carver = Some(carver),
                Err(error) => {
                    warn!(%error, "maze carve rejected");
                    out_events.push(Event::GenerationRejected { error });
                    return;
                }
            }
        }

        let Some(carver) = self.structure.carver.as_mut() else {
            return;
        };
        let steps = usize::try_from(u64::from(budget) * u64::from(total_rows) * 2)
            .unwrap_or(usize::MAX);
        if !carver.advance(maze, &mut self.rng, steps) {
            return;
        }

        self.structure.carver = None;
        self.structure.built = true;
        let open_edges = maze.open_edge_count();
        info!(%size, open_edges, "maze structure built");
        out_events.push(Event::StructureBuilt { size, open_edges });
    }

    fn place_objects(&mut self, out_events: &mut Vec<Event>) {
        let Some(maze) = self.maze.as_ref().filter(|_| self.structure.built) else {
            debug!("object placement requested before the structure was built");
            return;
        };

        let spacing = self.config.maze.cell_spacing;
        let start = maze.start();
        let end = maze.end();
        let trigger_zones = choose_trigger_zones(maze, &self.config, &mut self.rng)
            .into_iter()
            .map(|cell| TriggerZone {
                cell,
                bounds: scene::trigger_zone_bounds(cell, spacing),
                entered: false,
            })
            .collect::<Vec<_>>();
        let zone_count = u32::try_from(trigger_zones.len()).unwrap_or(u32::MAX);

        let placement = Placement {
            start,
            end,
            start_position: scene::cell_position(start, spacing),
            end_position: scene::cell_position(end, spacing),
            sign: scene::sign_bounds(start, spacing),
            trigger_zones,
        };
        self.target_position = placement.start_position;
        self.exit_reported = false;
        self.placement = Some(placement);

        debug!(%start, %end, trigger_zones = zone_count, "objects placed");
        out_events.push(Event::ObjectsPlaced {
            start,
            end,
            trigger_zones: zone_count,
        });
    }

    fn scene_sources(&self) -> Vec<SolidSource> {
        let spacing = self.spacing();
        let mut sources = Vec::new();

        if let Some(maze) = &self.maze {
            sources.push(scene::floor_source(maze.size(), spacing));
            sources.extend(scene::wall_sources(maze, spacing));
        }

        if let Some(placement) = &self.placement {
            sources.push(scene::sign_source(placement.start, spacing));
            sources.push(scene::marker_source(
                placement.start,
                spacing,
                self.config.maze.target_radius * 2.0,
            ));
            sources.push(scene::marker_source(
                placement.end,
                spacing,
                self.config.maze.end_trigger_radius * 2.0,
            ));
            sources.extend(placement.trigger_zones.iter().map(|zone| {
                scene::marker_source(zone.cell, spacing, scene::TRIGGER_ZONE_SIDE)
            }));
        }

        sources.extend(
            self.obstacles
                .iter()
                .map(|obstacle| SolidSource::obstacle(obstacle.bounds, obstacle.height)),
        );

        let body = Vec2::splat(self.config.maze.target_radius * 2.0);
        sources.push(SolidSource::standing(
            SourceKind::Target,
            Aabb::from_center_size(self.target_position, body),
            TARGET_HEIGHT,
        ));
        if let Some(spawn) = self.pursuer_spawn {
            let body = Vec2::splat(self.config.navigation.agent_radius * 2.0);
            sources.push(SolidSource::standing(
                SourceKind::Pursuer,
                Aabb::from_center_size(spawn, body),
                self.config.navigation.agent_height,
            ));
        }

        sources
    }

    fn rebuild_surface(&mut self, out_events: &mut Vec<Event>) {
        let size = self
            .maze
            .as_ref()
            .map_or(MazeSize::new(0), GridMaze::size);
        let bounds = scene::maze_bounds(
            size,
            self.spacing(),
            self.config.navigation.extra_bounds,
        );
        let sources = collect_sources(&bounds, self.scene_sources());
        let generation = self.builder.begin(bounds, sources);
        out_events.push(Event::NavigationSurfaceRebuildStarted { generation });
    }

    fn poll_surface(&mut self, out_events: &mut Vec<Event>) {
        match self.builder.poll() {
            Some(BuildOutcome::Ready(generation)) => {
                out_events.push(Event::NavigationSurfaceReady { generation });
            }
            Some(BuildOutcome::Failed(generation, failure)) => {
                out_events.push(Event::NavigationSurfaceBuildFailed {
                    generation,
                    failure,
                });
            }
            None => {}
        }
    }

    fn check_triggers(&mut self, out_events: &mut Vec<Event>) {
        let Some(placement) = self.placement.as_mut() else {
            return;
        };
        let radius = self.config.maze.target_radius;
        let position = self.target_position;

        if !self.exit_reported
            && position.distance(placement.end_position)
                <= self.config.maze.end_trigger_radius + radius
        {
            self.exit_reported = true;
            self.traps.clear();
            info!(tick = self.tick_index, "target reached the exit");
            out_events.push(Event::TargetReachedExit);
        }

        for zone in placement
            .trigger_zones
            .iter_mut()
            .filter(|zone| !zone.entered)
        {
            if zone.bounds.expanded(radius).contains(position) {
                zone.entered = true;
                debug!(cell = %zone.cell, "trigger zone entered");
                out_events.push(Event::TriggerZoneEntered { cell: zone.cell });
            }
        }
    }

    fn spawn_pursuer(&mut self, out_events: &mut Vec<Event>) {
        let Some(placement) = &self.placement else {
            debug!("pursuer spawn requested before objects were placed");
            return;
        };
        let position = placement.start_position;
        self.pursuer_spawn = Some(position);
        self.pursuer_position = Some(position);
        info!(x = position.x, z = position.y, "pursuer spawned");
        out_events.push(Event::PursuerSpawned { position });
    }

    fn drop_trap(&mut self, out_events: &mut Vec<Event>) {
        if self.placement.is_none() || self.target_caught || self.exit_reported {
            debug!("trap drop ignored outside a running round");
            return;
        }
        let position = self.target_position;
        if !self.traps.drop_at(position, &self.config.traps) {
            debug!(cooldown = ?self.traps.cooldown(), "trap drop ignored while cooling down");
            return;
        }
        debug!(x = position.x, z = position.y, "trap dropped");
        out_events.push(Event::TrapDropped { position });
    }

    fn move_pursuer(&mut self, position: Vec2) {
        if self.pursuer_spawn.is_none() || !position.is_finite() {
            debug!("pursuer move ignored without a spawned pursuer");
            return;
        }
        self.pursuer_position = Some(position);
    }
}

fn choose_trigger_zones<R: Rng + ?Sized>(
    maze: &GridMaze,
    config: &ChaseConfig,
    rng: &mut R,
) -> Vec<CellCoord> {
    let size = maze.size();
    let per_zone = u64::from(config.maze.tiles_per_trigger_zone.max(1));
    let wanted = usize::try_from((size.cell_count() / per_zone).max(1)).unwrap_or(usize::MAX);
    let start = maze.start();
    let end = maze.end();
    let min_distance = config.maze.min_trigger_distance;

    let mut zones: Vec<CellCoord> = Vec::new();
    for _ in 0..TRIGGER_ZONE_ATTEMPTS {
        if zones.len() >= wanted {
            break;
        }
        let cell = CellCoord::new(rng.gen_range(0..size.get()), rng.gen_range(0..size.get()));
        if cell == start || cell == end || zones.contains(&cell) {
            continue;
        }
        if cell.euclidean_distance(start) < min_distance
            || cell.euclidean_distance(end) < min_distance
        {
            continue;
        }
        zones.push(cell);
    }
    zones
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ClearMaze => {
            world.clear();
            out_events.push(Event::MazeCleared);
        }
        Command::AllocateMaze { size } => world.allocate(size, out_events),
        Command::BuildStructure { row_budget } => world.build_structure(row_budget, out_events),
        Command::PlaceObjects => world.place_objects(out_events),
        Command::PlaceObstacle { bounds, height } => {
            if bounds.is_degenerate() || !(height > 0.0) {
                warn!(?bounds, height, "ignoring degenerate obstacle");
                return;
            }
            world.obstacles.push(Obstacle { bounds, height });
        }
        Command::RebuildNavigationSurface => world.rebuild_surface(out_events),
        Command::SpawnPursuer => world.spawn_pursuer(out_events),
        Command::MoveTarget { position } => {
            if position.is_finite() {
                world.target_position = position;
            }
        }
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });
            world.poll_surface(out_events);
            world.check_triggers(out_events);
            world.traps.tick(
                dt,
                world.target_position,
                world.pursuer_position,
                &world.config.traps,
                out_events,
            );
        }
        Command::MovePursuer { position } => world.move_pursuer(position),
        Command::DropTrap => world.drop_trap(out_events),
        Command::ReportTargetCaught => {
            if !world.target_caught {
                world.target_caught = true;
                world.traps.clear();
                info!(tick = world.tick_index, "target caught");
                out_events.push(Event::TargetCaught);
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use maze_chase_core::{CellCoord, ChaseConfig, TargetSnapshot, Vec2};

    use std::time::Duration;

    use super::{Placement, World};
    use crate::{
        maze::GridMaze,
        navigation::{NavigationSurface, SurfaceStatus},
        scene,
        traps::Trap,
    };

    /// Configuration the world was created with.
    #[must_use]
    pub fn config(world: &World) -> &ChaseConfig {
        &world.config
    }

    /// Current maze, if one is allocated.
    #[must_use]
    pub fn maze(world: &World) -> Option<&GridMaze> {
        world.maze.as_ref()
    }

    /// Grid rows placed so far and the total row count of the current maze.
    #[must_use]
    pub fn structure_progress(world: &World) -> Option<(u32, u32)> {
        world
            .maze
            .as_ref()
            .map(|maze| (world.structure.rows_placed, maze.size().get()))
    }

    /// Objects placed in the current round.
    #[must_use]
    pub fn placement(world: &World) -> Option<&Placement> {
        world.placement.as_ref()
    }

    /// Published navigation surface, available only while it is ready.
    #[must_use]
    pub fn navigation_surface(world: &World) -> Option<&NavigationSurface> {
        world.builder.surface()
    }

    /// Observable state of the navigation surface builder.
    #[must_use]
    pub fn surface_status(world: &World) -> SurfaceStatus {
        world.builder.status()
    }

    /// Read-only view of the hunted entity.
    #[must_use]
    pub fn target(world: &World) -> TargetSnapshot {
        TargetSnapshot {
            position: world.target_position,
            radius: world.config.maze.target_radius,
        }
    }

    /// Position the pursuer was spawned at this round.
    #[must_use]
    pub fn pursuer_spawn(world: &World) -> Option<Vec2> {
        world.pursuer_spawn
    }

    /// Last position reported for the pursuer this round.
    #[must_use]
    pub fn pursuer_position(world: &World) -> Option<Vec2> {
        world.pursuer_position
    }

    /// Traps lying in the maze.
    #[must_use]
    pub fn traps(world: &World) -> &[Trap] {
        world.traps.traps()
    }

    /// Time left before the target may drop another trap.
    #[must_use]
    pub fn trap_cooldown(world: &World) -> Duration {
        world.traps.cooldown()
    }

    /// Reports whether a catch was recorded since the last clear.
    #[must_use]
    pub fn is_target_caught(world: &World) -> bool {
        world.target_caught
    }

    /// World position of a cell's centre.
    #[must_use]
    pub fn cell_position(world: &World, cell: CellCoord) -> Vec2 {
        scene::cell_position(cell, world.config.maze.cell_spacing)
    }

    /// Number of ticks processed since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }
}
