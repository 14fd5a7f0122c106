use std::fmt::Write as _;

use maze_chase_core::{CellCoord, Direction, WallState};
use maze_chase_world::maze::GridMaze;

/// Draws the maze with north at the top, marking the start and the exit.
pub(crate) fn ascii(maze: &GridMaze) -> String {
    let size = maze.size().get();
    let walled = |cell: CellCoord, direction: Direction| {
        maze.wall(cell, direction) != Some(WallState::Open)
    };

    let mut out = String::new();
    for z in (0..size).rev() {
        for x in 0..size {
            let edge = if walled(CellCoord::new(x, z), Direction::North) {
                "---"
            } else {
                "   "
            };
            let _ = write!(out, "+{edge}");
        }
        out.push_str("+\n");

        for x in 0..size {
            let cell = CellCoord::new(x, z);
            let side = if walled(cell, Direction::West) { '|' } else { ' ' };
            let mark = if cell == maze.start() {
                'S'
            } else if cell == maze.end() {
                'E'
            } else {
                ' '
            };
            let _ = write!(out, "{side} {mark} ");
        }
        out.push_str("|\n");
    }
    for _ in 0..size {
        out.push_str("+---");
    }
    out.push_str("+\n");
    out
}
