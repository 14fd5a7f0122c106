#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Round lifecycle orchestration for the maze chase.
//!
//! The lifecycle sequences every round through clearing, structure
//! generation, object placement, the navigation surface bake and the
//! delayed pursuer spawn. Each stage is an explicit state that advances only
//! when the world confirms the previous command, so the pipeline can be
//! cancelled at any point by starting over.

use std::time::Duration;

use maze_chase_core::{
    ChaseConfig, Command, Event, GenerationError, LifecycleError, LifecyclePhase, MazeSize,
    SessionState, SurfaceBuildFailure, SurfaceGeneration,
};
use tracing::{debug, info, warn};

/// Summary of a freshly started round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundStart {
    /// One-based round counter within the session.
    pub round: u32,
    /// Size of the maze the round will generate.
    pub size: MazeSize,
    /// Phase of the pipeline that was cancelled to start this round.
    pub cancelled: Option<LifecyclePhase>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Idle,
    Clearing {
        requested: bool,
        cleared: bool,
    },
    Building {
        allocated: bool,
        step_due: bool,
        built: bool,
    },
    Placing {
        placed: bool,
    },
    Baking {
        generation: Option<SurfaceGeneration>,
        ready: bool,
    },
    Spawning {
        remaining: Duration,
        requested: bool,
        spawned: bool,
    },
}

impl Stage {
    const fn phase(self) -> LifecyclePhase {
        match self {
            Self::Idle => LifecyclePhase::Idle,
            Self::Clearing { .. } => LifecyclePhase::Clearing,
            Self::Building { .. } => LifecyclePhase::BuildingStructure,
            Self::Placing { .. } => LifecyclePhase::PlacingObjects,
            Self::Baking { .. } => LifecyclePhase::BakingSurface,
            Self::Spawning { .. } => LifecyclePhase::SpawningPursuer,
        }
    }
}

/// Pure system owning round sequencing and maze size progression.
#[derive(Debug)]
pub struct Lifecycle {
    initial_size: MazeSize,
    size: MazeSize,
    win_size: MazeSize,
    rows_per_step: u32,
    spawn_delay: Duration,
    session: SessionState,
    round: u32,
    stage: Stage,
    bake_failure: Option<SurfaceBuildFailure>,
    last_error: Option<GenerationError>,
}

impl Lifecycle {
    /// Creates an idle lifecycle using the session configuration.
    #[must_use]
    pub fn new(config: &ChaseConfig) -> Self {
        let initial_size = MazeSize::new(config.maze.initial_size);
        Self {
            initial_size,
            size: initial_size,
            win_size: MazeSize::new(config.maze.win_size),
            rows_per_step: config.maze.rows_per_step.max(1),
            spawn_delay: config.lifecycle.spawn_delay(),
            session: SessionState::NotStarted,
            round: 0,
            stage: Stage::Idle,
            bake_failure: None,
            last_error: None,
        }
    }

    /// Observable stage of the round pipeline.
    #[must_use]
    pub const fn phase(&self) -> LifecyclePhase {
        self.stage.phase()
    }

    /// Size of the current or next maze.
    #[must_use]
    pub const fn maze_size(&self) -> MazeSize {
        self.size
    }

    /// Size above which the session is won.
    #[must_use]
    pub const fn win_size(&self) -> MazeSize {
        self.win_size
    }

    /// Overall state of the session.
    #[must_use]
    pub const fn session_state(&self) -> SessionState {
        self.session
    }

    /// Number of rounds started in the session.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Failure reported by the current round's bake, if any.
    ///
    /// A failed bake leaves the round waiting in
    /// [`LifecyclePhase::BakingSurface`] until a new round is started.
    #[must_use]
    pub const fn bake_failure(&self) -> Option<SurfaceBuildFailure> {
        self.bake_failure
    }

    /// Most recent generation request the world rejected.
    #[must_use]
    pub const fn last_error(&self) -> Option<GenerationError> {
        self.last_error
    }

    /// Starts a new round at the current size.
    ///
    /// Any pipeline still in flight is cancelled and restarted from a clear.
    pub fn begin_round(&mut self) -> Result<RoundStart, LifecycleError> {
        if self.session.is_terminal() {
            return Err(LifecycleError::SessionFinished {
                state: self.session,
            });
        }

        let cancelled = match self.stage {
            Stage::Idle => None,
            stage => {
                warn!(phase = ?stage.phase(), "cancelling in-flight round pipeline");
                Some(stage.phase())
            }
        };

        self.session = SessionState::Playing;
        self.start_round();
        Ok(RoundStart {
            round: self.round,
            size: self.size,
            cancelled,
        })
    }

    /// Returns the session to its initial size after it finished.
    pub fn reset_session(&mut self) {
        info!(previous = ?self.session, "session reset");
        self.size = self.initial_size;
        self.session = SessionState::NotStarted;
        self.round = 0;
        self.stage = Stage::Idle;
        self.bake_failure = None;
        self.last_error = None;
    }

    /// Consumes world events and emits the commands that advance the round.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            self.observe(event);
        }
        self.advance(out);
    }

    fn start_round(&mut self) {
        self.round = self.round.saturating_add(1);
        self.bake_failure = None;
        self.last_error = None;
        self.stage = Stage::Clearing {
            requested: false,
            cleared: false,
        };
        info!(round = self.round, size = %self.size, "round started");
    }

    fn observe(&mut self, event: &Event) {
        match event {
            Event::TargetReachedExit => return self.round_won(),
            Event::TargetCaught => return self.round_lost(),
            Event::GenerationRejected { error } => {
                if matches!(self.stage, Stage::Building { .. }) {
                    warn!(%error, "maze generation rejected; round aborted");
                    self.last_error = Some(*error);
                    self.stage = Stage::Idle;
                }
                return;
            }
            _ => {}
        }

        let round_size = self.size;
        match (event, &mut self.stage) {
            (Event::MazeCleared, Stage::Clearing { requested: true, cleared }) => {
                *cleared = true;
            }
            (Event::MazeAllocated { size }, Stage::Building { allocated, step_due, .. })
                if *size == round_size =>
            {
                *allocated = true;
                *step_due = true;
            }
            (Event::StructureBuilt { size, .. }, Stage::Building { built, .. })
                if *size == round_size =>
            {
                *built = true;
            }
            (Event::ObjectsPlaced { .. }, Stage::Placing { placed }) => *placed = true,
            (
                Event::NavigationSurfaceRebuildStarted { generation },
                Stage::Baking {
                    generation: awaited,
                    ..
                },
            ) => *awaited = Some(*generation),
            (
                Event::NavigationSurfaceReady { generation },
                Stage::Baking {
                    generation: awaited,
                    ready,
                },
            ) => {
                if *awaited == Some(*generation) {
                    *ready = true;
                } else {
                    debug!(generation = generation.get(), "ignoring stale surface readiness");
                }
            }
            (
                Event::NavigationSurfaceBuildFailed {
                    generation,
                    failure,
                },
                Stage::Baking {
                    generation: awaited,
                    ..
                },
            ) if *awaited == Some(*generation) => {
                warn!(
                    generation = generation.get(),
                    %failure,
                    "navigation surface bake failed; round is stuck until restarted"
                );
                self.bake_failure = Some(*failure);
            }
            (Event::TimeAdvanced { .. }, Stage::Building { step_due, .. }) => *step_due = true,
            (Event::TimeAdvanced { dt }, Stage::Spawning { remaining, .. }) => {
                *remaining = remaining.saturating_sub(*dt);
            }
            (Event::PursuerSpawned { .. }, Stage::Spawning { spawned, .. }) => *spawned = true,
            _ => {}
        }
    }

    fn round_won(&mut self) {
        if self.session != SessionState::Playing {
            return;
        }
        let next = self.size.doubled();
        self.size = next;
        if next > self.win_size {
            info!(size = %next, win_size = %self.win_size, "session won");
            self.session = SessionState::Won;
            self.stage = Stage::Idle;
            return;
        }
        info!(size = %next, "round won; maze grows");
        self.start_round();
    }

    fn round_lost(&mut self) {
        if self.session != SessionState::Playing {
            return;
        }
        info!(round = self.round, "session lost");
        self.session = SessionState::Lost;
        self.stage = Stage::Idle;
    }

    fn advance(&mut self, out: &mut Vec<Command>) {
        let next = match self.stage {
            Stage::Idle => Stage::Idle,
            Stage::Clearing {
                requested: false, ..
            } => {
                out.push(Command::ClearMaze);
                Stage::Clearing {
                    requested: true,
                    cleared: false,
                }
            }
            Stage::Clearing { cleared: true, .. } => {
                out.push(Command::AllocateMaze { size: self.size });
                Stage::Building {
                    allocated: false,
                    step_due: false,
                    built: false,
                }
            }
            Stage::Building { built: true, .. } => {
                out.push(Command::PlaceObjects);
                Stage::Placing { placed: false }
            }
            Stage::Building {
                allocated: true,
                step_due: true,
                built: false,
            } => {
                out.push(Command::BuildStructure {
                    row_budget: self.rows_per_step,
                });
                Stage::Building {
                    allocated: true,
                    step_due: false,
                    built: false,
                }
            }
            Stage::Placing { placed: true } => {
                out.push(Command::RebuildNavigationSurface);
                Stage::Baking {
                    generation: None,
                    ready: false,
                }
            }
            Stage::Baking { ready: true, .. } => Stage::Spawning {
                remaining: self.spawn_delay,
                requested: false,
                spawned: false,
            },
            Stage::Spawning {
                remaining,
                requested: false,
                ..
            } if remaining.is_zero() => {
                out.push(Command::SpawnPursuer);
                Stage::Spawning {
                    remaining,
                    requested: true,
                    spawned: false,
                }
            }
            Stage::Spawning { spawned: true, .. } => Stage::Idle,
            stage => stage,
        };

        if next.phase() != self.stage.phase() {
            debug!(from = ?self.stage.phase(), to = ?next.phase(), "lifecycle phase changed");
        }
        self.stage = next;
    }
}
