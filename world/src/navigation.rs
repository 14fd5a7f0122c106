//! Walkable navigation surface and its staged, pollable builder.
//!
//! The surface is a lattice of nodes placed at cell spacing across the bake
//! bounds. A node is walkable when a shallow enough floor covers it and no
//! blocking source, inflated by the agent radius, does. Orthogonal
//! neighbours are linked when the segment between them stays clear of every
//! inflated blocker. Paths are searched with A* over those links.

use maze_chase_core::{
    Aabb, Direction, MazeConfig, NavigationConfig, NavigationQueryFailure, SurfaceBuildFailure,
    SurfaceGeneration, Vec2,
};
use pathfinding::prelude::astar;
use tracing::{debug, info, warn};

/// Kind of solid geometry offered to the builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Maze wall segment.
    Wall,
    /// Ground plane under the maze.
    Floor,
    /// The hunted entity.
    Target,
    /// A pursuer body.
    Pursuer,
    /// Instruction sign next to the start cell.
    Signage,
    /// Start, end or trigger-zone marker.
    Marker,
    /// Any other solid object.
    Prop,
}

/// Inclusion class a [`SourceKind`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceCategory {
    /// Always part of the surface.
    Structural,
    /// Moving entities that never shape the surface.
    Actor,
    /// Presentation-only geometry.
    Decorative,
    /// Included only when solid and owned by the maze.
    Other,
}

impl SourceKind {
    /// Inclusion class of the kind.
    #[must_use]
    pub const fn category(self) -> SourceCategory {
        match self {
            Self::Wall | Self::Floor => SourceCategory::Structural,
            Self::Target | Self::Pursuer => SourceCategory::Actor,
            Self::Signage => SourceCategory::Decorative,
            Self::Marker | Self::Prop => SourceCategory::Other,
        }
    }
}

/// Piece of solid geometry sampled from the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolidSource {
    /// Kind of geometry.
    pub kind: SourceKind,
    /// Footprint on the ground plane.
    pub bounds: Aabb,
    /// Height of the lowest point above the floor.
    pub bottom: f32,
    /// Height of the highest point above the floor.
    pub top: f32,
    /// Incline of the top face in degrees.
    pub slope_degrees: f32,
    /// Trigger volumes detect overlap but are not solid.
    pub is_trigger: bool,
    /// Whether the source lives under the maze's scene subtree.
    pub maze_owned: bool,
}

impl SolidSource {
    /// Maze-owned wall standing on the floor.
    #[must_use]
    pub fn wall(bounds: Aabb, height: f32) -> Self {
        Self {
            kind: SourceKind::Wall,
            bounds,
            bottom: 0.0,
            top: height,
            slope_degrees: 0.0,
            is_trigger: false,
            maze_owned: true,
        }
    }

    /// Flat ground plane.
    #[must_use]
    pub fn floor(bounds: Aabb) -> Self {
        Self {
            kind: SourceKind::Floor,
            bounds,
            bottom: -0.1,
            top: 0.0,
            slope_degrees: 0.0,
            is_trigger: false,
            maze_owned: true,
        }
    }

    /// Maze-owned solid prop standing on the floor.
    #[must_use]
    pub fn obstacle(bounds: Aabb, height: f32) -> Self {
        Self {
            kind: SourceKind::Prop,
            ..Self::wall(bounds, height)
        }
    }

    /// Solid geometry of the provided kind standing on the floor.
    #[must_use]
    pub fn standing(kind: SourceKind, bounds: Aabb, height: f32) -> Self {
        Self {
            kind,
            ..Self::wall(bounds, height)
        }
    }

    /// Marks the source as a trigger volume.
    #[must_use]
    pub fn into_trigger(self) -> Self {
        Self {
            is_trigger: true,
            ..self
        }
    }

    /// Detaches the source from the maze's scene subtree.
    #[must_use]
    pub fn detached(self) -> Self {
        Self {
            maze_owned: false,
            ..self
        }
    }

    fn is_included(&self) -> bool {
        match self.kind.category() {
            SourceCategory::Structural => true,
            SourceCategory::Actor | SourceCategory::Decorative => false,
            SourceCategory::Other => !self.is_trigger && self.maze_owned,
        }
    }
}

/// Selects the sources that shape a surface baked inside `bounds`.
pub fn collect_sources<I>(bounds: &Aabb, candidates: I) -> Vec<SolidSource>
where
    I: IntoIterator<Item = SolidSource>,
{
    candidates
        .into_iter()
        .filter(|source| source.bounds.intersects(bounds))
        .filter(SolidSource::is_included)
        .collect()
}

/// Agent and lattice parameters used by a bake.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildSettings {
    /// Distance between lattice nodes.
    pub spacing: f32,
    /// Clearance kept around blockers.
    pub agent_radius: f32,
    /// Geometry starting above this height does not block.
    pub agent_height: f32,
    /// Steepest walkable floor in degrees.
    pub max_slope_degrees: f32,
    /// Geometry no taller than this can be stepped over.
    pub step_height: f32,
    /// Lattice rows processed per poll.
    pub rows_per_poll: u32,
}

impl BuildSettings {
    /// Derives bake settings from the session configuration.
    #[must_use]
    pub fn from_config(maze: &MazeConfig, navigation: &NavigationConfig) -> Self {
        Self {
            spacing: maze.cell_spacing,
            agent_radius: navigation.agent_radius,
            agent_height: navigation.agent_height,
            max_slope_degrees: navigation.max_slope_degrees,
            step_height: navigation.step_height,
            rows_per_poll: navigation.rows_per_poll,
        }
    }

    fn blocks(&self, source: &SolidSource) -> bool {
        source.kind != SourceKind::Floor
            && source.top > self.step_height
            && source.bottom < self.agent_height
    }
}

/// Polyline returned by a path query.
#[derive(Clone, Debug, PartialEq)]
pub struct NavPath {
    corners: Vec<Vec2>,
}

impl NavPath {
    /// Corner points from the query origin to the destination.
    #[must_use]
    pub fn corners(&self) -> &[Vec2] {
        &self.corners
    }

    /// Sum of the distances between consecutive corners.
    #[must_use]
    pub fn length(&self) -> f32 {
        self.corners
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }

    /// Final corner of the path.
    #[must_use]
    pub fn destination(&self) -> Option<Vec2> {
        self.corners.last().copied()
    }
}

/// Published, read-only walkable surface.
#[derive(Clone, Debug)]
pub struct NavigationSurface {
    generation: SurfaceGeneration,
    lattice: Lattice,
    walkable: Vec<bool>,
    links: Vec<u8>,
    half_extent: f32,
    blockers: Vec<Aabb>,
    inflated: Vec<Aabb>,
}

impl NavigationSurface {
    /// Generation of the bake that produced the surface.
    #[must_use]
    pub const fn generation(&self) -> SurfaceGeneration {
        self.generation
    }

    /// Number of lattice nodes covering the bake bounds.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.walkable.len()
    }

    /// Number of lattice nodes an agent may stand on.
    #[must_use]
    pub fn walkable_count(&self) -> usize {
        self.walkable.iter().filter(|walkable| **walkable).count()
    }

    /// Reports whether the lattice node nearest `point` is walkable.
    #[must_use]
    pub fn is_walkable_at(&self, point: Vec2) -> bool {
        self.lattice
            .nearest(point)
            .is_some_and(|node| self.walkable[node])
    }

    /// Nearest point on the surface within `max_distance` of `point`.
    #[must_use]
    pub fn sample_position(&self, point: Vec2, max_distance: f32) -> Option<Vec2> {
        if !point.is_finite() || !(max_distance >= 0.0) {
            return None;
        }

        let span = self.lattice.columns.max(self.lattice.rows) as f32;
        let reach = (max_distance / self.lattice.spacing).min(span).ceil() as i64 + 1;
        let half = Vec2::splat(self.half_extent);
        let mut best: Option<(f32, Vec2)> = None;

        for node in self.lattice.window(point, reach) {
            if !self.walkable[node] {
                continue;
            }
            let centre = self.lattice.position(node);
            let mut consider = |min: Vec2, max: Vec2| {
                let candidate = point.clamp(min, max);
                let distance = candidate.distance(point);
                if distance <= max_distance && best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, candidate));
                }
            };

            consider(centre - half, centre + half);
            for direction in [Direction::East, Direction::North] {
                if self.is_linked(node, direction) {
                    let (dx, dz) = direction.offset();
                    let far = centre + Vec2::new(dx as f32, dz as f32) * self.lattice.spacing;
                    consider(centre.min(far) - half, centre.max(far) + half);
                }
            }
        }

        best.map(|(_, position)| position)
    }

    /// Shortest path over the surface between two points.
    pub fn find_path(&self, from: Vec2, to: Vec2) -> Result<NavPath, NavigationQueryFailure> {
        let start = self.locate(from).ok_or(NavigationQueryFailure::OffSurface)?;
        let goal = self.locate(to).ok_or(NavigationQueryFailure::OffSurface)?;

        let (mut nodes, _cost) = astar(
            &start,
            |&node| self.successors(node),
            |&node| self.lattice.manhattan(node, goal),
            |&node| node == goal,
        )
        .ok_or(NavigationQueryFailure::Unreachable)?;

        if nodes.len() >= 2 && self.segment_clear(from, self.lattice.position(nodes[1])) {
            let _ = nodes.remove(0);
        }
        if nodes.len() >= 2 && self.segment_clear(self.lattice.position(nodes[nodes.len() - 2]), to)
        {
            let _ = nodes.pop();
        }
        if nodes.len() == 1 && self.segment_clear(from, to) {
            nodes.clear();
        }

        let mut corners = Vec::with_capacity(nodes.len() + 2);
        corners.push(from);
        corners.extend(nodes.into_iter().map(|node| self.lattice.position(node)));
        corners.push(to);

        Ok(NavPath {
            corners: collapse_collinear(corners),
        })
    }

    /// Reports whether a path connects the two points.
    #[must_use]
    pub fn is_reachable(&self, from: Vec2, to: Vec2) -> bool {
        self.find_path(from, to).is_ok()
    }

    /// Distance to the first blocker hit by the ray, if any lies within
    /// `max_distance`.
    #[must_use]
    pub fn raycast(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Option<f32> {
        let direction = direction.try_normalize()?;
        self.blockers
            .iter()
            .filter_map(|blocker| blocker.ray_entry(origin, direction, max_distance))
            .min_by(f32::total_cmp)
    }

    fn is_linked(&self, node: usize, direction: Direction) -> bool {
        self.links[node] & (1 << direction.index()) != 0
    }

    fn successors(&self, node: usize) -> impl Iterator<Item = (usize, u32)> + '_ {
        Direction::ALL.into_iter().filter_map(move |direction| {
            if !self.is_linked(node, direction) {
                return None;
            }
            self.lattice.neighbor(node, direction).map(|next| (next, 1))
        })
    }

    fn locate(&self, point: Vec2) -> Option<usize> {
        if !point.is_finite() {
            return None;
        }
        self.lattice
            .window(point, 2)
            .filter(|node| self.walkable[*node])
            .map(|node| (node, self.lattice.position(node).distance(point)))
            .filter(|(_, distance)| *distance <= self.lattice.spacing)
            .filter(|(node, _)| self.sight_clear(point, self.lattice.position(*node)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(node, _)| node)
    }

    fn segment_clear(&self, from: Vec2, to: Vec2) -> bool {
        !crosses_any(&self.inflated, from, to)
    }

    fn sight_clear(&self, from: Vec2, to: Vec2) -> bool {
        !crosses_any(&self.blockers, from, to)
    }
}

fn crosses_any(boxes: &[Aabb], from: Vec2, to: Vec2) -> bool {
    let delta = to - from;
    let length = delta.length();
    let Some(direction) = delta.try_normalize() else {
        return boxes.iter().any(|bounds| bounds.contains(from));
    };
    boxes
        .iter()
        .any(|bounds| bounds.ray_entry(from, direction, length).is_some())
}

fn collapse_collinear(points: Vec<Vec2>) -> Vec<Vec2> {
    let mut corners: Vec<Vec2> = Vec::with_capacity(points.len());
    for point in points {
        if corners.last().is_some_and(|last| last.distance(point) < 1e-4) {
            continue;
        }
        if corners.len() >= 2 {
            let a = corners[corners.len() - 2];
            let b = corners[corners.len() - 1];
            let first = b - a;
            let second = point - b;
            if first.perp_dot(second).abs() < 1e-4 && first.dot(second) > 0.0 {
                let _ = corners.pop();
            }
        }
        corners.push(point);
    }
    corners
}

/// Node layout shared by a pending bake and the surface it publishes.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Lattice {
    spacing: f32,
    origin: (i64, i64),
    columns: usize,
    rows: usize,
}

impl Lattice {
    fn covering(bounds: &Aabb, spacing: f32) -> Self {
        let min_i = (bounds.min().x / spacing).ceil() as i64;
        let max_i = (bounds.max().x / spacing).floor() as i64;
        let min_j = (bounds.min().y / spacing).ceil() as i64;
        let max_j = (bounds.max().y / spacing).floor() as i64;
        Self {
            spacing,
            origin: (min_i, min_j),
            columns: usize::try_from(max_i - min_i + 1).unwrap_or(0),
            rows: usize::try_from(max_j - min_j + 1).unwrap_or(0),
        }
    }

    fn len(&self) -> usize {
        self.columns * self.rows
    }

    fn position(&self, node: usize) -> Vec2 {
        let i = self.origin.0 + (node % self.columns) as i64;
        let j = self.origin.1 + (node / self.columns) as i64;
        Vec2::new(i as f32, j as f32) * self.spacing
    }

    fn node(&self, column: i64, row: i64) -> Option<usize> {
        let column = usize::try_from(column).ok()?;
        let row = usize::try_from(row).ok()?;
        (column < self.columns && row < self.rows).then_some(row * self.columns + column)
    }

    fn neighbor(&self, node: usize, direction: Direction) -> Option<usize> {
        let (dx, dz) = direction.offset();
        let column = (node % self.columns) as i64 + i64::from(dx);
        let row = (node / self.columns) as i64 + i64::from(dz);
        self.node(column, row)
    }

    fn relative(&self, point: Vec2) -> (i64, i64) {
        let scaled = point / self.spacing;
        (
            scaled.x.round() as i64 - self.origin.0,
            scaled.y.round() as i64 - self.origin.1,
        )
    }

    fn nearest(&self, point: Vec2) -> Option<usize> {
        let (column, row) = self.relative(point);
        self.node(column, row)
    }

    /// Nodes within `reach` steps of the lattice cell nearest `point`.
    ///
    /// Points outside the lattice are first pulled onto its edge, so the
    /// window never walks cells that cannot hold a node.
    fn window(&self, point: Vec2, reach: i64) -> impl Iterator<Item = usize> + '_ {
        let last_column = self.columns as i64 - 1;
        let last_row = self.rows as i64 - 1;
        let (column, row) = self.relative(point);
        let (column, row) = (column.clamp(0, last_column.max(0)), row.clamp(0, last_row.max(0)));
        let columns = (column - reach).max(0)..=(column + reach).min(last_column);
        let rows = (row - reach).max(0)..=(row + reach).min(last_row);
        rows.flat_map(move |r| columns.clone().filter_map(move |c| self.node(c, r)))
    }

    fn manhattan(&self, a: usize, b: usize) -> u32 {
        let (ac, ar) = (a % self.columns, a / self.columns);
        let (bc, br) = (b % self.columns, b / self.columns);
        (ac.abs_diff(bc) + ar.abs_diff(br)) as u32
    }
}

/// Result of a bake reported by [`NavigationSurfaceBuilder::poll`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The surface was published.
    Ready(SurfaceGeneration),
    /// The bake failed and the surface stays not ready.
    Failed(SurfaceGeneration, SurfaceBuildFailure),
}

/// Observable state of the builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// No bake has been requested since the last invalidation.
    Idle,
    /// A bake is in progress.
    Building(SurfaceGeneration),
    /// A surface is published.
    Ready(SurfaceGeneration),
    /// The last bake failed.
    Failed(SurfaceGeneration, SurfaceBuildFailure),
}

impl SurfaceStatus {
    /// Reports whether pursuers may query the surface.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Index,
    Walkability { next_row: usize },
    Links { next_row: usize },
}

#[derive(Clone, Debug)]
struct PendingBuild {
    bounds: Aabb,
    sources: Vec<SolidSource>,
    stage: Stage,
    lattice: Lattice,
    floors: Vec<Aabb>,
    blockers: Vec<Aabb>,
    inflated: Vec<Aabb>,
    bins: Vec<Vec<u32>>,
    walkable: Vec<bool>,
    links: Vec<u8>,
}

impl PendingBuild {
    fn new(bounds: Aabb, sources: Vec<SolidSource>, spacing: f32) -> Self {
        Self {
            bounds,
            sources,
            stage: Stage::Index,
            lattice: Lattice {
                spacing,
                origin: (0, 0),
                columns: 0,
                rows: 0,
            },
            floors: Vec::new(),
            blockers: Vec::new(),
            inflated: Vec::new(),
            bins: Vec::new(),
            walkable: Vec::new(),
            links: Vec::new(),
        }
    }

    fn advance(&mut self, settings: &BuildSettings) -> Result<bool, SurfaceBuildFailure> {
        let budget = usize::try_from(settings.rows_per_poll.max(1)).unwrap_or(usize::MAX);
        match self.stage {
            Stage::Index => {
                self.index(settings)?;
                self.stage = Stage::Walkability { next_row: 0 };
                Ok(false)
            }
            Stage::Walkability { next_row } => {
                let end = next_row.saturating_add(budget).min(self.lattice.rows);
                for row in next_row..end {
                    self.mark_row_walkability(row);
                }
                if end < self.lattice.rows {
                    self.stage = Stage::Walkability { next_row: end };
                    return Ok(false);
                }
                if !self.walkable.iter().any(|walkable| *walkable) {
                    return Err(SurfaceBuildFailure::NoWalkableArea);
                }
                self.stage = Stage::Links { next_row: 0 };
                Ok(false)
            }
            Stage::Links { next_row } => {
                let end = next_row.saturating_add(budget).min(self.lattice.rows);
                for row in next_row..end {
                    self.link_row(row);
                }
                self.stage = Stage::Links { next_row: end };
                Ok(end >= self.lattice.rows)
            }
        }
    }

    fn index(&mut self, settings: &BuildSettings) -> Result<(), SurfaceBuildFailure> {
        if self.bounds.is_degenerate() || !(settings.spacing > 0.0) {
            return Err(SurfaceBuildFailure::DegenerateBounds);
        }
        if !self
            .sources
            .iter()
            .any(|source| source.kind.category() == SourceCategory::Structural)
        {
            return Err(SurfaceBuildFailure::NoStructuralSources);
        }

        self.lattice = Lattice::covering(&self.bounds, settings.spacing);
        if self.lattice.len() == 0 {
            return Err(SurfaceBuildFailure::NoWalkableArea);
        }

        let max_slope = settings.max_slope_degrees;
        self.floors = self
            .sources
            .iter()
            .filter(|source| source.kind == SourceKind::Floor)
            .filter(|source| source.slope_degrees <= max_slope)
            .map(|source| source.bounds)
            .collect();
        self.blockers = self
            .sources
            .iter()
            .filter(|source| settings.blocks(source))
            .map(|source| source.bounds)
            .collect();
        self.inflated = self
            .blockers
            .iter()
            .map(|bounds| bounds.expanded(settings.agent_radius))
            .collect();

        self.bins = vec![Vec::new(); self.lattice.len()];
        let spacing = self.lattice.spacing;
        for (index, bounds) in self.inflated.iter().enumerate() {
            let reach = bounds.expanded(spacing);
            let low = self.lattice.relative(reach.min());
            let high = self.lattice.relative(reach.max());
            for row in low.1..=high.1 {
                for column in low.0..=high.0 {
                    if let Some(node) = self.lattice.node(column, row) {
                        self.bins[node].push(index as u32);
                    }
                }
            }
        }

        self.walkable = vec![false; self.lattice.len()];
        self.links = vec![0; self.lattice.len()];
        Ok(())
    }

    fn mark_row_walkability(&mut self, row: usize) {
        for column in 0..self.lattice.columns {
            let node = row * self.lattice.columns + column;
            let centre = self.lattice.position(node);
            let supported = self.floors.iter().any(|floor| floor.contains(centre));
            let blocked = self.bins[node]
                .iter()
                .any(|index| self.inflated[*index as usize].contains(centre));
            self.walkable[node] = supported && !blocked;
        }
    }

    fn link_row(&mut self, row: usize) {
        for column in 0..self.lattice.columns {
            let node = row * self.lattice.columns + column;
            if !self.walkable[node] {
                continue;
            }
            for direction in [Direction::East, Direction::North] {
                let Some(next) = self.lattice.neighbor(node, direction) else {
                    continue;
                };
                if !self.walkable[next] {
                    continue;
                }
                let from = self.lattice.position(node);
                let to = self.lattice.position(next);
                let crossing = self.bins[node].iter().any(|index| {
                    let bounds = &self.inflated[*index as usize];
                    crosses_any(std::slice::from_ref(bounds), from, to)
                });
                if !crossing {
                    self.links[node] |= 1 << direction.index();
                    self.links[next] |= 1 << direction.opposite().index();
                }
            }
        }
    }

    fn publish(self, generation: SurfaceGeneration, settings: &BuildSettings) -> NavigationSurface {
        NavigationSurface {
            generation,
            lattice: self.lattice,
            walkable: self.walkable,
            links: self.links,
            half_extent: (self.lattice.spacing * 0.5 - settings.agent_radius).max(0.0),
            blockers: self.blockers,
            inflated: self.inflated,
        }
    }
}

#[derive(Clone, Debug)]
enum BuilderState {
    Idle,
    Pending(Box<PendingBuild>),
    Ready(NavigationSurface),
    Failed(SurfaceBuildFailure),
}

/// Owns the single navigation surface and rebuilds it in place.
///
/// A bake never blocks: [`NavigationSurfaceBuilder::begin`] discards the
/// current surface and queues the work, and each call to
/// [`NavigationSurfaceBuilder::poll`] performs one bounded chunk of it.
#[derive(Clone, Debug)]
pub struct NavigationSurfaceBuilder {
    settings: BuildSettings,
    generation: SurfaceGeneration,
    state: BuilderState,
}

impl NavigationSurfaceBuilder {
    /// Creates an idle builder.
    #[must_use]
    pub fn new(settings: BuildSettings) -> Self {
        Self {
            settings,
            generation: SurfaceGeneration::default(),
            state: BuilderState::Idle,
        }
    }

    /// Parameters applied to every bake.
    #[must_use]
    pub const fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Generation of the most recent bake request or invalidation.
    #[must_use]
    pub const fn generation(&self) -> SurfaceGeneration {
        self.generation
    }

    /// Discards the current surface and any in-flight bake.
    pub fn invalidate(&mut self) {
        if let BuilderState::Pending(_) = self.state {
            debug!(generation = self.generation.get(), "discarding in-flight bake");
        }
        self.generation = self.generation.next();
        self.state = BuilderState::Idle;
    }

    /// Discards the current surface and starts baking a new one.
    pub fn begin(&mut self, bounds: Aabb, sources: Vec<SolidSource>) -> SurfaceGeneration {
        self.invalidate();
        debug!(
            generation = self.generation.get(),
            sources = sources.len(),
            "navigation surface bake started"
        );
        self.state = BuilderState::Pending(Box::new(PendingBuild::new(
            bounds,
            sources,
            self.settings.spacing,
        )));
        self.generation
    }

    /// Performs one chunk of the in-flight bake.
    ///
    /// Returns an outcome only on the poll that completes the bake.
    pub fn poll(&mut self) -> Option<BuildOutcome> {
        let BuilderState::Pending(pending) = &mut self.state else {
            return None;
        };
        let generation = self.generation;

        match pending.advance(&self.settings) {
            Ok(false) => None,
            Ok(true) => {
                let BuilderState::Pending(pending) =
                    std::mem::replace(&mut self.state, BuilderState::Idle)
                else {
                    return None;
                };
                let surface = pending.publish(generation, &self.settings);
                info!(
                    generation = generation.get(),
                    nodes = surface.node_count(),
                    walkable = surface.walkable_count(),
                    "navigation surface ready"
                );
                self.state = BuilderState::Ready(surface);
                Some(BuildOutcome::Ready(generation))
            }
            Err(failure) => {
                warn!(generation = generation.get(), %failure, "navigation surface bake failed");
                self.state = BuilderState::Failed(failure);
                Some(BuildOutcome::Failed(generation, failure))
            }
        }
    }

    /// Polls until the in-flight bake completes.
    pub fn finish(&mut self) -> Option<BuildOutcome> {
        while let BuilderState::Pending(_) = self.state {
            if let Some(outcome) = self.poll() {
                return Some(outcome);
            }
        }
        None
    }

    /// Observable state of the builder.
    #[must_use]
    pub fn status(&self) -> SurfaceStatus {
        match &self.state {
            BuilderState::Idle => SurfaceStatus::Idle,
            BuilderState::Pending(_) => SurfaceStatus::Building(self.generation),
            BuilderState::Ready(_) => SurfaceStatus::Ready(self.generation),
            BuilderState::Failed(failure) => SurfaceStatus::Failed(self.generation, *failure),
        }
    }

    /// Published surface, available only while the builder is ready.
    #[must_use]
    pub fn surface(&self) -> Option<&NavigationSurface> {
        match &self.state {
            BuilderState::Ready(surface) => Some(surface),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BuildSettings {
        BuildSettings::from_config(&MazeConfig::default(), &NavigationConfig::default())
    }

    fn open_room() -> (Aabb, Vec<SolidSource>) {
        let bounds = Aabb::new(Vec2::splat(-0.6), Vec2::splat(4.2));
        (bounds, vec![SolidSource::floor(bounds)])
    }

    #[test]
    fn sources_are_filtered_by_category() {
        let bounds = Aabb::new(Vec2::ZERO, Vec2::splat(10.0));
        let inside = Aabb::from_center_size(Vec2::splat(2.0), Vec2::ONE);
        let outside = Aabb::from_center_size(Vec2::splat(20.0), Vec2::ONE);

        let candidates = vec![
            SolidSource::wall(inside, 2.0),
            SolidSource::floor(bounds),
            SolidSource::standing(SourceKind::Target, inside, 1.8),
            SolidSource::standing(SourceKind::Pursuer, inside, 1.8),
            SolidSource::standing(SourceKind::Signage, inside, 1.0),
            SolidSource::standing(SourceKind::Marker, inside, 0.1).into_trigger(),
            SolidSource::obstacle(inside, 1.0),
            SolidSource::obstacle(inside, 1.0).detached(),
            SolidSource::wall(outside, 2.0),
        ];

        let kinds: Vec<SourceKind> = collect_sources(&bounds, candidates)
            .into_iter()
            .map(|source| source.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![SourceKind::Wall, SourceKind::Floor, SourceKind::Prop]
        );
    }

    #[test]
    fn degenerate_bounds_fail() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let bounds = Aabb::new(Vec2::ONE, Vec2::ONE);
        let generation = builder.begin(bounds, vec![SolidSource::floor(bounds)]);
        assert_eq!(
            builder.finish(),
            Some(BuildOutcome::Failed(
                generation,
                SurfaceBuildFailure::DegenerateBounds
            ))
        );
        assert!(builder.surface().is_none());
    }

    #[test]
    fn missing_structure_fails() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let (bounds, _) = open_room();
        let generation = builder.begin(bounds, Vec::new());
        assert_eq!(
            builder.poll(),
            Some(BuildOutcome::Failed(
                generation,
                SurfaceBuildFailure::NoStructuralSources
            ))
        );
        assert_eq!(
            builder.status(),
            SurfaceStatus::Failed(generation, SurfaceBuildFailure::NoStructuralSources)
        );
        assert_eq!(builder.poll(), None, "failure is reported once");
    }

    #[test]
    fn bake_takes_several_polls() {
        let mut builder = NavigationSurfaceBuilder::new(BuildSettings {
            rows_per_poll: 1,
            ..settings()
        });
        let (bounds, sources) = open_room();
        let generation = builder.begin(bounds, sources);
        assert_eq!(builder.poll(), None);
        assert_eq!(builder.status(), SurfaceStatus::Building(generation));
        assert!(builder.surface().is_none());
        assert_eq!(builder.finish(), Some(BuildOutcome::Ready(generation)));
        assert!(builder.status().is_ready());
    }

    #[test]
    fn begin_discards_previous_surface() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let (bounds, sources) = open_room();
        let first = builder.begin(bounds, sources.clone());
        let _ = builder.finish();
        assert!(builder.surface().is_some());

        let second = builder.begin(bounds, sources);
        assert!(second > first);
        assert!(builder.surface().is_none());
    }

    #[test]
    fn open_room_paths_are_straight() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let (bounds, sources) = open_room();
        let _ = builder.begin(bounds, sources);
        let _ = builder.finish();
        let surface = builder.surface().expect("surface ready");

        let path = surface
            .find_path(Vec2::ZERO, Vec2::new(3.6, 0.0))
            .expect("path");
        assert_eq!(path.corners().len(), 2);
        assert!((path.length() - 3.6).abs() < 1e-4);
    }

    #[test]
    fn obstacle_removes_nodes_and_forces_detour() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let (bounds, mut sources) = open_room();
        sources.push(SolidSource::obstacle(
            Aabb::from_center_size(Vec2::new(1.2, 0.0), Vec2::splat(0.4)),
            1.0,
        ));
        let _ = builder.begin(bounds, sources);
        let _ = builder.finish();
        let surface = builder.surface().expect("surface ready");

        assert!(!surface.is_walkable_at(Vec2::new(1.2, 0.0)));
        let path = surface
            .find_path(Vec2::ZERO, Vec2::new(2.4, 0.0))
            .expect("detour");
        assert!(path.length() > 2.4 + 1e-3);
    }

    #[test]
    fn low_obstacles_are_stepped_over() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let (bounds, mut sources) = open_room();
        sources.push(SolidSource::obstacle(
            Aabb::from_center_size(Vec2::new(1.2, 0.0), Vec2::splat(0.4)),
            0.2,
        ));
        let _ = builder.begin(bounds, sources);
        let _ = builder.finish();
        let surface = builder.surface().expect("surface ready");
        assert!(surface.is_walkable_at(Vec2::new(1.2, 0.0)));
    }

    #[test]
    fn sample_position_snaps_onto_surface() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let (bounds, sources) = open_room();
        let _ = builder.begin(bounds, sources);
        let _ = builder.finish();
        let surface = builder.surface().expect("surface ready");

        let inside = Vec2::new(1.0, 1.0);
        assert_eq!(surface.sample_position(inside, 0.1), Some(inside));

        let outside = Vec2::new(-3.0, 0.0);
        let snapped = surface.sample_position(outside, 3.0).expect("snapped");
        assert!(snapped.x > outside.x);
        assert_eq!(surface.sample_position(outside, 0.5), None);
    }

    #[test]
    fn sample_position_handles_unbounded_radius() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let (bounds, sources) = open_room();
        let _ = builder.begin(bounds, sources);
        let _ = builder.finish();
        let surface = builder.surface().expect("surface ready");

        assert_eq!(
            surface.sample_position(Vec2::ZERO, f32::INFINITY),
            Some(Vec2::ZERO)
        );
        assert_eq!(surface.sample_position(Vec2::ZERO, f32::NAN), None);

        let far = Vec2::splat(1.0e6);
        let snapped = surface
            .sample_position(far, f32::INFINITY)
            .expect("every walkable point is in range");
        assert!(snapped.x <= 4.2 && snapped.y <= 4.2, "snapped to {snapped:?}");
        assert!(snapped.x >= 3.0 && snapped.y >= 3.0, "snapped to {snapped:?}");
        assert_eq!(surface.sample_position(far, f32::MAX), Some(snapped));
    }

    #[test]
    fn raycast_reports_nearest_blocker() {
        let mut builder = NavigationSurfaceBuilder::new(settings());
        let (bounds, mut sources) = open_room();
        sources.push(SolidSource::wall(
            Aabb::new(Vec2::new(1.0, -1.0), Vec2::new(1.1, 5.0)),
            2.0,
        ));
        sources.push(SolidSource::wall(
            Aabb::new(Vec2::new(2.0, -1.0), Vec2::new(2.1, 5.0)),
            2.0,
        ));
        let _ = builder.begin(bounds, sources);
        let _ = builder.finish();
        let surface = builder.surface().expect("surface ready");

        let hit = surface.raycast(Vec2::ZERO, Vec2::X, 3.0).expect("hit");
        assert!((hit - 1.0).abs() < 1e-4);
        assert_eq!(surface.raycast(Vec2::ZERO, -Vec2::X, 0.5), None);
    }
}
