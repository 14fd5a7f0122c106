use std::time::Duration;

use maze_chase_core::{
    ChaseConfig, Command, Event, LifecycleError, LifecyclePhase, MazeSize, SessionState,
};
use maze_chase_system_lifecycle::Lifecycle;
use maze_chase_world::{self as world, query, World};

const FRAME: Duration = Duration::from_millis(16);
const MAX_FRAMES: usize = 4_000;

/// Advances the world one frame and lets the lifecycle react until it has
/// nothing left to say.
fn frame(world: &mut World, lifecycle: &mut Lifecycle, log: &mut Vec<Event>) {
    let mut events = Vec::new();
    world::apply(world, Command::Tick { dt: FRAME }, &mut events);
    loop {
        let mut commands = Vec::new();
        lifecycle.handle(&events, &mut commands);
        log.append(&mut events);
        if commands.is_empty() {
            break;
        }
        for command in commands {
            world::apply(world, command, &mut events);
        }
    }
}

fn run_until(
    world: &mut World,
    lifecycle: &mut Lifecycle,
    log: &mut Vec<Event>,
    done: impl Fn(&Lifecycle) -> bool,
) {
    for _ in 0..MAX_FRAMES {
        frame(world, lifecycle, log);
        if done(lifecycle) {
            return;
        }
    }
    panic!("lifecycle stuck in {:?}", lifecycle.phase());
}

fn position_of(log: &[Event], wanted: impl Fn(&Event) -> bool) -> usize {
    log.iter()
        .position(wanted)
        .expect("expected event was never emitted")
}

#[test]
fn first_round_runs_the_whole_pipeline() {
    let config = ChaseConfig::default();
    let mut world = World::new(config.clone());
    let mut lifecycle = Lifecycle::new(&config);
    let mut log = Vec::new();

    let start = lifecycle.begin_round().expect("round starts");
    assert_eq!(start.round, 1);
    assert_eq!(start.size, MazeSize::new(5));
    assert_eq!(start.cancelled, None);

    run_until(&mut world, &mut lifecycle, &mut log, |lifecycle| {
        lifecycle.phase() == LifecyclePhase::Idle
    });

    let cleared = position_of(&log, |event| matches!(event, Event::MazeCleared));
    let allocated = position_of(&log, |event| matches!(event, Event::MazeAllocated { .. }));
    let built = position_of(&log, |event| matches!(event, Event::StructureBuilt { .. }));
    let placed = position_of(&log, |event| matches!(event, Event::ObjectsPlaced { .. }));
    let ready = position_of(&log, |event| {
        matches!(event, Event::NavigationSurfaceReady { .. })
    });
    let spawned = position_of(&log, |event| matches!(event, Event::PursuerSpawned { .. }));
    assert!(cleared < allocated);
    assert!(allocated < built);
    assert!(built < placed);
    assert!(placed < ready);
    assert!(ready < spawned);

    assert!(log.contains(&Event::StructureBuilt {
        size: MazeSize::new(5),
        open_edges: 24,
    }));

    let maze = query::maze(&world).expect("maze built");
    let placement = query::placement(&world).expect("objects placed");
    assert_eq!(placement.start(), maze.start());
    assert_eq!(placement.end(), maze.end());
    let surface = query::navigation_surface(&world).expect("surface ready");
    assert!(surface.is_reachable(placement.start_position(), placement.end_position()));
    assert_eq!(query::pursuer_spawn(&world), Some(placement.start_position()));
    assert_eq!(lifecycle.session_state(), SessionState::Playing);
}

#[test]
fn structure_building_yields_between_frames() {
    let mut config = ChaseConfig::default();
    config.maze.initial_size = 12;
    config.maze.win_size = 48;
    config.maze.rows_per_step = 3;
    let mut world = World::new(config.clone());
    let mut lifecycle = Lifecycle::new(&config);
    let mut log = Vec::new();

    let _ = lifecycle.begin_round().expect("round starts");
    run_until(&mut world, &mut lifecycle, &mut log, |lifecycle| {
        lifecycle.phase() == LifecyclePhase::PlacingObjects
            || lifecycle.phase() == LifecyclePhase::BakingSurface
    });

    let progress: Vec<u32> = log
        .iter()
        .filter_map(|event| match event {
            Event::StructureProgress { rows_placed, .. } => Some(*rows_placed),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![3, 6, 9, 12]);

    let frames: Vec<usize> = log
        .iter()
        .enumerate()
        .filter(|(_, event)| matches!(event, Event::StructureProgress { .. }))
        .map(|(index, _)| {
            log[..index]
                .iter()
                .filter(|event| matches!(event, Event::TimeAdvanced { .. }))
                .count()
        })
        .collect();
    assert!(
        frames.windows(2).all(|pair| pair[0] < pair[1]),
        "each batch of rows should land in its own frame: {frames:?}"
    );
}

#[test]
fn reaching_the_exit_grows_the_maze_until_the_session_is_won() {
    let config = ChaseConfig::default();
    let mut world = World::new(config.clone());
    let mut lifecycle = Lifecycle::new(&config);
    let mut log = Vec::new();

    let _ = lifecycle.begin_round().expect("round starts");
    let mut built_sizes = Vec::new();
    while lifecycle.session_state() == SessionState::Playing {
        run_until(&mut world, &mut lifecycle, &mut log, |lifecycle| {
            lifecycle.phase() == LifecyclePhase::Idle
        });
        let maze = query::maze(&world).expect("round built a maze");
        built_sizes.push(maze.size().get());
        assert_eq!(maze.open_edge_count(), maze.size().cell_count() - 1);

        let exit = query::placement(&world).expect("placement").end_position();
        let mut events = Vec::new();
        world::apply(&mut world, Command::MoveTarget { position: exit }, &mut events);
        frame(&mut world, &mut lifecycle, &mut log);
    }

    assert_eq!(built_sizes, vec![5, 10, 20]);
    assert_eq!(lifecycle.session_state(), SessionState::Won);
    assert_eq!(lifecycle.maze_size(), MazeSize::new(40));
    assert_eq!(lifecycle.phase(), LifecyclePhase::Idle);
    assert_eq!(
        log.iter()
            .filter(|event| matches!(event, Event::TargetReachedExit))
            .count(),
        3
    );
    assert_eq!(
        lifecycle.begin_round(),
        Err(LifecycleError::SessionFinished {
            state: SessionState::Won
        })
    );
}

#[test]
fn restarting_mid_pipeline_never_rejects_generation() {
    for interrupted in [
        LifecyclePhase::BuildingStructure,
        LifecyclePhase::BakingSurface,
        LifecyclePhase::SpawningPursuer,
    ] {
        let mut config = ChaseConfig::default();
        config.maze.initial_size = 10;
        config.maze.rows_per_step = 2;
        let mut world = World::new(config.clone());
        let mut lifecycle = Lifecycle::new(&config);
        let mut log = Vec::new();

        let _ = lifecycle.begin_round().expect("round starts");
        run_until(&mut world, &mut lifecycle, &mut log, |lifecycle| {
            lifecycle.phase() == interrupted
        });

        let restart = lifecycle.begin_round().expect("restart");
        assert_eq!(restart.cancelled, Some(interrupted));
        assert_eq!(restart.round, 2);

        let restarted_at = log.len();
        run_until(&mut world, &mut lifecycle, &mut log, |lifecycle| {
            lifecycle.phase() == LifecyclePhase::Idle
        });

        assert!(
            !log.iter()
                .any(|event| matches!(event, Event::GenerationRejected { .. })),
            "restart during {interrupted:?} left a populated grid behind"
        );
        assert_eq!(lifecycle.last_error(), None);

        let ready: Vec<&Event> = log[restarted_at..]
            .iter()
            .filter(|event| matches!(event, Event::NavigationSurfaceReady { .. }))
            .collect();
        assert_eq!(ready.len(), 1, "restart during {interrupted:?}");
        let spawns = log[restarted_at..]
            .iter()
            .filter(|event| matches!(event, Event::PursuerSpawned { .. }))
            .count();
        assert_eq!(spawns, 1);
        assert!(query::navigation_surface(&world).is_some());
    }
}

#[test]
fn caught_target_loses_the_session() {
    let config = ChaseConfig::default();
    let mut world = World::new(config.clone());
    let mut lifecycle = Lifecycle::new(&config);
    let mut log = Vec::new();

    let _ = lifecycle.begin_round().expect("round starts");
    run_until(&mut world, &mut lifecycle, &mut log, |lifecycle| {
        lifecycle.phase() == LifecyclePhase::Idle
    });

    let mut events = Vec::new();
    world::apply(&mut world, Command::ReportTargetCaught, &mut events);
    let mut commands = Vec::new();
    lifecycle.handle(&events, &mut commands);

    assert!(commands.is_empty());
    assert_eq!(lifecycle.session_state(), SessionState::Lost);
    assert_eq!(lifecycle.maze_size(), MazeSize::new(5));
    assert!(lifecycle.begin_round().is_err());
}
