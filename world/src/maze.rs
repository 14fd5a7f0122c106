//! Square grid maze with shared wall state and a resumable spanning-tree carver.

use maze_chase_core::{CellCoord, Direction, GenerationError, MazeSize, WallState};
use rand::Rng;

/// Single grid cell with its four boundary states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    walls: [WallState; 4],
    visited: bool,
}

impl Cell {
    const fn walled() -> Self {
        Self {
            walls: [WallState::Walled; 4],
            visited: false,
        }
    }

    /// State of the boundary on the provided side.
    #[must_use]
    pub const fn wall(&self, direction: Direction) -> WallState {
        self.walls[direction.index()]
    }

    /// Reports whether the carver already entered the cell.
    #[must_use]
    pub const fn is_visited(&self) -> bool {
        self.visited
    }
}

/// Square grid of cells whose shared edges are always stored symmetrically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridMaze {
    size: MazeSize,
    cells: Vec<Cell>,
}

impl GridMaze {
    /// Allocates a grid with every boundary walled and no cell visited.
    pub fn allocate(size: MazeSize) -> Result<Self, GenerationError> {
        if size.get() == 0 {
            return Err(GenerationError::InvalidSize);
        }
        let count =
            usize::try_from(size.cell_count()).map_err(|_| GenerationError::InvalidSize)?;
        Ok(Self {
            size,
            cells: vec![Cell::walled(); count],
        })
    }

    /// Allocates a grid and carves a complete spanning tree from the origin.
    pub fn generate<R: Rng + ?Sized>(size: MazeSize, rng: &mut R) -> Result<Self, GenerationError> {
        let mut maze = Self::allocate(size)?;
        let mut carver = Carver::start(&mut maze, CellCoord::new(0, 0))?;
        carver.run(&mut maze, rng);
        Ok(maze)
    }

    /// Edge length of the grid.
    #[must_use]
    pub const fn size(&self) -> MazeSize {
        self.size
    }

    /// Cell the target starts from.
    #[must_use]
    pub const fn start(&self) -> CellCoord {
        CellCoord::new(0, 0)
    }

    /// Cell holding the exit, diagonally opposite the start.
    #[must_use]
    pub const fn end(&self) -> CellCoord {
        let last = self.size.get().saturating_sub(1);
        CellCoord::new(last, last)
    }

    /// Returns the cell at the coordinate, if it lies inside the grid.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.index(coord).and_then(|index| self.cells.get(index))
    }

    /// State of the boundary on the provided side of a cell.
    #[must_use]
    pub fn wall(&self, coord: CellCoord, direction: Direction) -> Option<WallState> {
        self.cell(coord).map(|cell| cell.wall(direction))
    }

    /// Opens the edge between a cell and its neighbour, updating both sides.
    ///
    /// Returns `false` for outer boundary edges, which always stay walled.
    pub fn open_wall(&mut self, coord: CellCoord, direction: Direction) -> bool {
        let Some(neighbor) = coord.neighbor(direction, self.size.get()) else {
            return false;
        };
        let (Some(here), Some(there)) = (self.index(coord), self.index(neighbor)) else {
            return false;
        };
        self.cells[here].walls[direction.index()] = WallState::Open;
        self.cells[there].walls[direction.opposite().index()] = WallState::Open;
        true
    }

    /// Neighbours reachable through open walls.
    pub fn open_neighbors(&self, coord: CellCoord) -> impl Iterator<Item = CellCoord> + '_ {
        let size = self.size.get();
        Direction::ALL.into_iter().filter_map(move |direction| {
            match self.wall(coord, direction) {
                Some(WallState::Open) => coord.neighbor(direction, size),
                _ => None,
            }
        })
    }

    /// Every open internal edge, reported once from its western or southern cell.
    pub fn open_edges(&self) -> impl Iterator<Item = (CellCoord, CellCoord)> + '_ {
        self.coords().flat_map(move |coord| {
            [Direction::East, Direction::North]
                .into_iter()
                .filter(move |direction| self.wall(coord, *direction) == Some(WallState::Open))
                .filter_map(move |direction| {
                    coord
                        .neighbor(direction, self.size.get())
                        .map(|neighbor| (coord, neighbor))
                })
        })
    }

    /// Number of open internal edges.
    #[must_use]
    pub fn open_edge_count(&self) -> u64 {
        self.open_edges().count() as u64
    }

    /// All coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = CellCoord> {
        let size = self.size.get();
        (0..size).flat_map(move |z| (0..size).map(move |x| CellCoord::new(x, z)))
    }

    /// Reports whether any cell was already entered by a carver.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.cells.iter().any(|cell| cell.visited)
    }

    fn mark_visited(&mut self, coord: CellCoord) {
        if let Some(index) = self.index(coord) {
            self.cells[index].visited = true;
        }
    }

    fn is_unvisited(&self, coord: CellCoord) -> bool {
        self.cell(coord).is_some_and(|cell| !cell.visited)
    }

    fn unvisited_neighbors(&self, coord: CellCoord) -> Vec<CellCoord> {
        let size = self.size.get();
        [
            Direction::East,
            Direction::West,
            Direction::North,
            Direction::South,
        ]
        .into_iter()
        .filter_map(|direction| coord.neighbor(direction, size))
        .filter(|neighbor| self.is_unvisited(*neighbor))
        .collect()
    }

    fn index(&self, coord: CellCoord) -> Option<usize> {
        let size = self.size.get();
        if coord.x() >= size || coord.z() >= size {
            return None;
        }
        let width = usize::try_from(size).ok()?;
        let x = usize::try_from(coord.x()).ok()?;
        let z = usize::try_from(coord.z()).ok()?;
        z.checked_mul(width)?.checked_add(x)
    }
}

/// Observable transition performed by a single carver step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarveStep {
    /// The carver opened the wall between `from` and `to` and entered `to`.
    Advanced {
        /// Cell the carver left.
        from: CellCoord,
        /// Newly visited cell.
        to: CellCoord,
    },
    /// The cell had no unvisited neighbours left and was popped off the stack.
    Backtracked {
        /// Cell that was exhausted.
        cell: CellCoord,
    },
    /// The stack is empty; every reachable cell was visited.
    Finished,
}

#[derive(Clone, Debug)]
struct Frame {
    cell: CellCoord,
    candidates: Vec<CellCoord>,
}

/// Randomised depth-first carver driven one step at a time.
///
/// The stack holds one frame per cell on the current branch together with the
/// neighbours it has not tried yet, so carving never recurses.
#[derive(Clone, Debug)]
pub struct Carver {
    stack: Vec<Frame>,
}

impl Carver {
    /// Marks `origin` visited and prepares to carve from it.
    pub fn start(maze: &mut GridMaze, origin: CellCoord) -> Result<Self, GenerationError> {
        if maze.cell(origin).is_none() {
            return Err(GenerationError::InvalidSize);
        }
        if maze.is_populated() {
            return Err(GenerationError::AlreadyPopulated);
        }
        maze.mark_visited(origin);
        let candidates = maze.unvisited_neighbors(origin);
        Ok(Self {
            stack: vec![Frame {
                cell: origin,
                candidates,
            }],
        })
    }

    /// Number of frames on the current branch.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Reports whether carving completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.stack.is_empty()
    }

    /// Performs a single advance or backtrack.
    pub fn step<R: Rng + ?Sized>(&mut self, maze: &mut GridMaze, rng: &mut R) -> CarveStep {
        let Some(frame) = self.stack.last_mut() else {
            return CarveStep::Finished;
        };

        frame.candidates.retain(|candidate| maze.is_unvisited(*candidate));
        if frame.candidates.is_empty() {
            let cell = frame.cell;
            let _ = self.stack.pop();
            return CarveStep::Backtracked { cell };
        }

        let pick = rng.gen_range(0..frame.candidates.len());
        let next = frame.candidates.swap_remove(pick);
        let from = frame.cell;

        maze.mark_visited(next);
        if let Some(direction) = from.direction_to(next) {
            let _ = maze.open_wall(from, direction);
        }
        let candidates = maze.unvisited_neighbors(next);
        self.stack.push(Frame {
            cell: next,
            candidates,
        });

        CarveStep::Advanced { from, to: next }
    }

    /// Performs at most `budget` steps and reports whether carving completed.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        maze: &mut GridMaze,
        rng: &mut R,
        budget: usize,
    ) -> bool {
        for _ in 0..budget {
            if self.step(maze, rng) == CarveStep::Finished {
                return true;
            }
        }
        self.is_finished()
    }

    /// Carves until the stack is empty.
    pub fn run<R: Rng + ?Sized>(&mut self, maze: &mut GridMaze, rng: &mut R) {
        while self.step(maze, rng) != CarveStep::Finished {}
    }
}
