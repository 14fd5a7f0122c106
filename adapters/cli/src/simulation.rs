use std::time::Duration;

use anyhow::Result;
use maze_chase_core::{
    CellCoord, ChaseConfig, Command, Event, MazeSize, SessionState, SurfaceBuildFailure,
};
use maze_chase_system_lifecycle::Lifecycle;
use maze_chase_system_pursuit::Pursuit;
use maze_chase_world::{self as world, maze::GridMaze, query, scene, World};
use tracing::{debug, info};

use crate::autopilot::Autopilot;

/// How a round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RoundOutcome {
    Escaped,
    Caught { cell: Option<CellCoord> },
    Unfinished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RoundReport {
    pub(crate) round: u32,
    pub(crate) size: MazeSize,
    pub(crate) ticks: u64,
    pub(crate) trigger_zones: u32,
    pub(crate) zones_entered: u32,
    pub(crate) traps_dropped: u32,
    pub(crate) traps_triggered: u32,
    pub(crate) outcome: RoundOutcome,
}

impl RoundReport {
    fn new(round: u32, size: MazeSize) -> Self {
        Self {
            round,
            size,
            ticks: 0,
            trigger_zones: 0,
            zones_entered: 0,
            traps_dropped: 0,
            traps_triggered: 0,
            outcome: RoundOutcome::Unfinished,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SessionReport {
    pub(crate) rounds: Vec<RoundReport>,
    pub(crate) state: SessionState,
    pub(crate) ticks: u64,
    pub(crate) bake_failure: Option<SurfaceBuildFailure>,
}

/// Headless session wiring the world to the lifecycle, the pursuer and the
/// scripted target.
#[derive(Debug)]
pub(crate) struct Simulation {
    world: World,
    lifecycle: Lifecycle,
    pursuit: Pursuit,
    autopilot: Autopilot,
    frame: Duration,
    drop_traps: bool,
    rounds: Vec<RoundReport>,
}

impl Simulation {
    pub(crate) fn new(config: ChaseConfig, frame: Duration, target_speed: f32) -> Self {
        Self {
            lifecycle: Lifecycle::new(&config),
            pursuit: Pursuit::new(&config),
            world: World::new(config),
            autopilot: Autopilot::new(target_speed),
            frame,
            drop_traps: false,
            rounds: Vec::new(),
        }
    }

    /// Makes the target drop a trap whenever the cooldown allows while the
    /// pursuer is out.
    pub(crate) fn dropping_traps(mut self, enabled: bool) -> Self {
        self.drop_traps = enabled;
        self
    }

    pub(crate) fn run(&mut self, max_ticks: u64) -> Result<SessionReport> {
        let start = self.lifecycle.begin_round()?;
        self.rounds.push(RoundReport::new(start.round, start.size));

        while query::tick_index(&self.world) < max_ticks
            && !self.lifecycle.session_state().is_terminal()
        {
            self.step();
        }

        info!(
            state = ?self.lifecycle.session_state(),
            rounds = self.rounds.len(),
            ticks = query::tick_index(&self.world),
            "session finished"
        );
        Ok(SessionReport {
            rounds: self.rounds.clone(),
            state: self.lifecycle.session_state(),
            ticks: query::tick_index(&self.world),
            bake_failure: self.lifecycle.bake_failure(),
        })
    }

    pub(crate) fn maze(&self) -> Option<&GridMaze> {
        query::maze(&self.world)
    }

    fn step(&mut self) {
        let mut events = Vec::new();
        let exit = query::placement(&self.world).map(|placement| placement.end_position());
        if let Some(position) = self.autopilot.advance(
            query::navigation_surface(&self.world),
            query::target(&self.world).position,
            exit,
            self.frame,
        ) {
            world::apply(&mut self.world, Command::MoveTarget { position }, &mut events);
        }
        if self.drop_traps
            && query::pursuer_position(&self.world).is_some()
            && query::trap_cooldown(&self.world).is_zero()
        {
            world::apply(&mut self.world, Command::DropTrap, &mut events);
        }
        world::apply(&mut self.world, Command::Tick { dt: self.frame }, &mut events);

        while !events.is_empty() {
            self.record(&events);

            let mut commands = Vec::new();
            self.lifecycle.handle(&events, &mut commands);
            self.pursuit.handle(
                &events,
                query::navigation_surface(&self.world),
                query::target(&self.world),
                &mut commands,
            );
            self.autopilot.handle(&events);
            self.follow_round();

            events.clear();
            for command in commands {
                world::apply(&mut self.world, command, &mut events);
            }
        }
    }

    fn record(&mut self, events: &[Event]) {
        let Some(report) = self.rounds.last_mut() else {
            return;
        };
        for event in events {
            match event {
                Event::TimeAdvanced { .. } => report.ticks += 1,
                Event::ObjectsPlaced { trigger_zones, .. } => {
                    report.trigger_zones = *trigger_zones;
                }
                Event::TriggerZoneEntered { cell } => {
                    debug!(%cell, "target crossed a trigger zone");
                    report.zones_entered += 1;
                }
                Event::TrapDropped { .. } => report.traps_dropped += 1,
                Event::TrapTriggered { victim, .. } => {
                    debug!(?victim, "trap set off");
                    report.traps_triggered += 1;
                }
                Event::TargetReachedExit => report.outcome = RoundOutcome::Escaped,
                Event::TargetCaught => {
                    let config = query::config(&self.world);
                    let cell = query::maze(&self.world).and_then(|maze| {
                        scene::cell_at(
                            query::target(&self.world).position,
                            maze.size(),
                            config.maze.cell_spacing,
                        )
                    });
                    report.outcome = RoundOutcome::Caught { cell };
                }
                _ => {}
            }
        }
    }

    fn follow_round(&mut self) {
        let round = self.lifecycle.round();
        if self.rounds.last().map(|report| report.round) != Some(round) {
            self.rounds
                .push(RoundReport::new(round, self.lifecycle.maze_size()));
        }
    }
}
