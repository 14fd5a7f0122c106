use maze_chase_core::{
    Aabb, CellCoord, ChaseConfig, Command, Direction, Event, MazeSize, NavigationQueryFailure,
    Vec2,
};
use maze_chase_world::{
    self as world,
    maze::GridMaze,
    navigation::{
        collect_sources, BuildOutcome, BuildSettings, NavigationSurface,
        NavigationSurfaceBuilder, SurfaceStatus,
    },
    query, scene, World,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

const SPACING: f32 = 1.2;

fn bake(maze: &GridMaze) -> NavigationSurface {
    let config = ChaseConfig::default();
    let bounds = scene::maze_bounds(maze.size(), SPACING, config.navigation.extra_bounds);
    let mut candidates = vec![scene::floor_source(maze.size(), SPACING)];
    candidates.extend(scene::wall_sources(maze, SPACING));

    let mut builder =
        NavigationSurfaceBuilder::new(BuildSettings::from_config(&config.maze, &config.navigation));
    let generation = builder.begin(bounds, collect_sources(&bounds, candidates));
    assert_eq!(builder.finish(), Some(BuildOutcome::Ready(generation)));
    builder.surface().cloned().expect("surface ready")
}

fn tree_distance(maze: &GridMaze, from: CellCoord, to: CellCoord) -> u32 {
    let mut depth = std::collections::HashMap::from([(from, 0u32)]);
    let mut queue = std::collections::VecDeque::from([from]);
    while let Some(cell) = queue.pop_front() {
        let next_depth = depth[&cell] + 1;
        for next in maze.open_neighbors(cell) {
            if !depth.contains_key(&next) {
                let _ = depth.insert(next, next_depth);
                queue.push_back(next);
            }
        }
    }
    depth[&to]
}

#[test]
fn path_follows_corridors_of_generated_maze() {
    for seed in 0..8 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let maze = GridMaze::generate(MazeSize::new(6), &mut rng).expect("generate");
        let surface = bake(&maze);

        let start = scene::cell_position(maze.start(), SPACING);
        let end = scene::cell_position(maze.end(), SPACING);
        let path = surface.find_path(start, end).expect("exit reachable");

        let expected = tree_distance(&maze, maze.start(), maze.end()) as f32 * SPACING;
        assert!(
            (path.length() - expected).abs() < 1e-3,
            "seed {seed}: path length {} differs from corridor length {expected}",
            path.length()
        );
    }
}

#[test]
fn walls_separate_adjacent_cells() {
    let mut maze = GridMaze::allocate(MazeSize::new(2)).expect("allocate");
    assert!(maze.open_wall(CellCoord::new(0, 0), Direction::North));
    assert!(maze.open_wall(CellCoord::new(0, 1), Direction::East));
    assert!(maze.open_wall(CellCoord::new(1, 1), Direction::South));
    let surface = bake(&maze);

    let from = scene::cell_position(CellCoord::new(0, 0), SPACING);
    let to = scene::cell_position(CellCoord::new(1, 0), SPACING);
    let path = surface.find_path(from, to).expect("around the wall");
    assert!((path.length() - 3.0 * SPACING).abs() < 1e-3);
    assert_eq!(path.corners().len(), 4);

    let hit = surface.raycast(from, to - from, 3.0).expect("wall in the way");
    assert!(hit < SPACING * 0.5);
}

#[test]
fn closed_cells_are_unreachable() {
    let maze = GridMaze::allocate(MazeSize::new(2)).expect("allocate");
    let surface = bake(&maze);
    let from = scene::cell_position(CellCoord::new(0, 0), SPACING);
    let to = scene::cell_position(CellCoord::new(1, 1), SPACING);
    assert_eq!(
        surface.find_path(from, to),
        Err(NavigationQueryFailure::Unreachable)
    );
    assert_eq!(
        surface.find_path(from, Vec2::splat(40.0)),
        Err(NavigationQueryFailure::OffSurface)
    );
}

fn pump_until_ready(world: &mut World) -> Vec<Event> {
    let mut events = Vec::new();
    for _ in 0..256 {
        world::apply(
            world,
            Command::Tick {
                dt: Duration::from_millis(16),
            },
            &mut events,
        );
        if !matches!(query::surface_status(world), SurfaceStatus::Building(_)) {
            break;
        }
    }
    events
}

fn built_world(size: u32) -> World {
    let mut world = World::new(ChaseConfig::default());
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::AllocateMaze {
            size: MazeSize::new(size),
        },
        &mut events,
    );
    while !events
        .iter()
        .any(|event| matches!(event, Event::StructureBuilt { .. }))
    {
        world::apply(&mut world, Command::BuildStructure { row_budget: 4 }, &mut events);
    }
    world::apply(&mut world, Command::PlaceObjects, &mut events);
    world
}

#[test]
fn world_bake_publishes_surface_once() {
    let mut world = built_world(5);
    let mut events = Vec::new();
    world::apply(&mut world, Command::RebuildNavigationSurface, &mut events);
    let Some(Event::NavigationSurfaceRebuildStarted { generation }) = events.pop() else {
        panic!("bake did not start");
    };
    assert!(query::navigation_surface(&world).is_none());

    let events = pump_until_ready(&mut world);
    let ready: Vec<&Event> = events
        .iter()
        .filter(|event| matches!(event, Event::NavigationSurfaceReady { .. }))
        .collect();
    assert_eq!(ready, vec![&Event::NavigationSurfaceReady { generation }]);

    let surface = query::navigation_surface(&world).expect("surface published");
    let placement = query::placement(&world).expect("placement");
    assert!(surface.is_reachable(placement.start_position(), placement.end_position()));
    // Sign and markers never carve holes into the start cell.
    assert!(surface.is_walkable_at(placement.start_position()));
}

#[test]
fn placed_obstacle_is_carved_out_by_next_bake() {
    let mut world = built_world(4);
    let mut events = Vec::new();
    let centre = query::cell_position(&world, CellCoord::new(2, 2));
    world::apply(
        &mut world,
        Command::PlaceObstacle {
            bounds: Aabb::from_center_size(centre, Vec2::splat(0.5)),
            height: 1.0,
        },
        &mut events,
    );
    world::apply(&mut world, Command::RebuildNavigationSurface, &mut events);
    let _ = pump_until_ready(&mut world);

    let surface = query::navigation_surface(&world).expect("surface published");
    assert!(!surface.is_walkable_at(centre));
}

#[test]
fn clear_invalidates_surface() {
    let mut world = built_world(3);
    let mut events = Vec::new();
    world::apply(&mut world, Command::RebuildNavigationSurface, &mut events);
    let _ = pump_until_ready(&mut world);
    assert!(query::navigation_surface(&world).is_some());

    world::apply(&mut world, Command::ClearMaze, &mut events);
    assert!(query::navigation_surface(&world).is_none());
    assert_eq!(query::surface_status(&world), SurfaceStatus::Idle);
}

#[test]
fn bake_without_maze_stays_not_ready() {
    let mut world = World::new(ChaseConfig::default());
    let mut events = Vec::new();
    world::apply(&mut world, Command::RebuildNavigationSurface, &mut events);
    let events = pump_until_ready(&mut world);
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::NavigationSurfaceBuildFailed { .. })));
    assert!(matches!(
        query::surface_status(&world),
        SurfaceStatus::Failed(..)
    ));
    assert!(query::navigation_surface(&world).is_none());
}
