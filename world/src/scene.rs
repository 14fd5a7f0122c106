//! Converts maze topology and placed objects into ground-plane geometry.

use maze_chase_core::{Aabb, CellCoord, Direction, MazeSize, Vec2, WallState};

use crate::{
    maze::GridMaze,
    navigation::{SolidSource, SourceKind},
};

/// Height of a maze wall above the floor.
pub const WALL_HEIGHT: f32 = 2.0;
/// Thickness of a maze wall.
pub const WALL_THICKNESS: f32 = 0.1;
/// Margin the ground plane extends past the outer walls, per side.
pub const FLOOR_MARGIN: f32 = 1.0;
/// Side length of a trigger zone's box.
pub const TRIGGER_ZONE_SIDE: f32 = 0.8;
/// Offset of the instruction sign from the start cell's centre.
pub const SIGN_OFFSET: Vec2 = Vec2::new(0.22, 0.22);

const SIGN_FOOTPRINT: Vec2 = Vec2::new(0.3, 0.05);
const SIGN_HEIGHT: f32 = 1.0;
const MARKER_HEIGHT: f32 = 0.05;

/// World position of a cell's centre.
#[must_use]
pub fn cell_position(cell: CellCoord, spacing: f32) -> Vec2 {
    Vec2::new(cell.x() as f32, cell.z() as f32) * spacing
}

/// Cell whose footprint contains the world position, if it lies inside the grid.
#[must_use]
pub fn cell_at(position: Vec2, size: MazeSize, spacing: f32) -> Option<CellCoord> {
    let scaled = (position / spacing).round();
    let limit = size.get() as f32;
    if !scaled.is_finite() || scaled.x < 0.0 || scaled.y < 0.0 || scaled.x >= limit || scaled.y >= limit
    {
        return None;
    }
    Some(CellCoord::new(scaled.x as u32, scaled.y as u32))
}

fn maze_center(size: MazeSize, spacing: f32) -> Vec2 {
    Vec2::splat(size.get().saturating_sub(1) as f32 * spacing * 0.5)
}

/// Bake volume covering the maze plus `extra` on every side.
#[must_use]
pub fn maze_bounds(size: MazeSize, spacing: f32, extra: f32) -> Aabb {
    let side = size.get() as f32 * spacing + 2.0 * extra;
    Aabb::from_center_size(maze_center(size, spacing), Vec2::splat(side))
}

/// Ground plane spanning the maze.
#[must_use]
pub fn floor_source(size: MazeSize, spacing: f32) -> SolidSource {
    let side = size.get() as f32 * spacing + 2.0 * FLOOR_MARGIN;
    SolidSource::floor(Aabb::from_center_size(
        maze_center(size, spacing),
        Vec2::splat(side),
    ))
}

/// Footprint of the wall on the given side of a cell.
#[must_use]
pub fn wall_bounds(cell: CellCoord, direction: Direction, spacing: f32) -> Aabb {
    let centre = cell_position(cell, spacing);
    let (dx, dz) = direction.offset();
    let offset = Vec2::new(dx as f32, dz as f32) * (spacing * 0.5);
    let length = spacing + WALL_THICKNESS;
    let size = if dx == 0 {
        Vec2::new(length, WALL_THICKNESS)
    } else {
        Vec2::new(WALL_THICKNESS, length)
    };
    Aabb::from_center_size(centre + offset, size)
}

/// One solid source per walled edge; shared edges are emitted once.
#[must_use]
pub fn wall_sources(maze: &GridMaze, spacing: f32) -> Vec<SolidSource> {
    let size = maze.size().get();
    let mut sources = Vec::new();
    for cell in maze.coords() {
        for direction in Direction::ALL {
            if maze.wall(cell, direction) != Some(WallState::Walled) {
                continue;
            }
            let boundary = cell.neighbor(direction, size).is_none();
            let owner = matches!(direction, Direction::East | Direction::North);
            if boundary || owner {
                sources.push(SolidSource::wall(
                    wall_bounds(cell, direction, spacing),
                    WALL_HEIGHT,
                ));
            }
        }
    }
    sources
}

/// Footprint of the instruction sign next to the start cell.
#[must_use]
pub fn sign_bounds(start: CellCoord, spacing: f32) -> Aabb {
    Aabb::from_center_size(cell_position(start, spacing) + SIGN_OFFSET, SIGN_FOOTPRINT)
}

/// Decorative instruction sign.
#[must_use]
pub fn sign_source(start: CellCoord, spacing: f32) -> SolidSource {
    SolidSource::standing(SourceKind::Signage, sign_bounds(start, spacing), SIGN_HEIGHT)
}

/// Footprint of the trigger zone hosted by a cell.
#[must_use]
pub fn trigger_zone_bounds(cell: CellCoord, spacing: f32) -> Aabb {
    Aabb::from_center_size(cell_position(cell, spacing), Vec2::splat(TRIGGER_ZONE_SIDE))
}

/// Non-solid marker volume centred on a cell.
#[must_use]
pub fn marker_source(cell: CellCoord, spacing: f32, side: f32) -> SolidSource {
    SolidSource::standing(
        SourceKind::Marker,
        Aabb::from_center_size(cell_position(cell, spacing), Vec2::splat(side)),
        MARKER_HEIGHT,
    )
    .into_trigger()
}
