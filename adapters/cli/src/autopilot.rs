use std::time::Duration;

use maze_chase_core::{Event, SurfaceGeneration, TrapVictim, Vec2};
use maze_chase_world::navigation::NavigationSurface;
use tracing::{debug, warn};

/// Scripted target that walks the published surface toward the exit.
#[derive(Debug)]
pub(crate) struct Autopilot {
    speed: f32,
    ready: Option<SurfaceGeneration>,
    planned: Option<SurfaceGeneration>,
    route: Vec<Vec2>,
    slow: Option<(f32, Duration)>,
}

impl Autopilot {
    pub(crate) fn new(speed: f32) -> Self {
        Self {
            speed,
            ready: None,
            planned: None,
            route: Vec::new(),
            slow: None,
        }
    }

    pub(crate) fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::MazeCleared => {
                    self.ready = None;
                    self.planned = None;
                    self.route.clear();
                    self.slow = None;
                }
                Event::NavigationSurfaceReady { generation } => self.ready = Some(*generation),
                Event::TrapTriggered {
                    victim: TrapVictim::Target,
                    slow_factor,
                    duration,
                    ..
                } => {
                    debug!(slow_factor, ?duration, "target stepped into a trap");
                    self.slow = Some((*slow_factor, *duration));
                }
                _ => {}
            }
        }
    }

    /// Returns the target position after walking for `dt`, or `None` when
    /// the target should stay put.
    pub(crate) fn advance(
        &mut self,
        surface: Option<&NavigationSurface>,
        position: Vec2,
        exit: Option<Vec2>,
        dt: Duration,
    ) -> Option<Vec2> {
        let (surface, exit) = (surface?, exit?);
        if self.ready.is_some() && self.planned != self.ready {
            self.planned = self.ready;
            self.route = match surface.find_path(position, exit) {
                Ok(path) => path.corners().iter().skip(1).copied().collect(),
                Err(failure) => {
                    warn!(%failure, "target has no route to the exit");
                    Vec::new()
                }
            };
            debug!(corners = self.route.len(), "target route planned");
        }

        let mut speed = self.speed;
        if let Some((factor, remaining)) = self.slow.as_mut() {
            speed *= *factor;
            *remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                self.slow = None;
            }
        }

        let mut budget = speed * dt.as_secs_f32();
        let mut current = position;
        while budget > 0.0 {
            let Some(&corner) = self.route.first() else {
                break;
            };
            let remaining = current.distance(corner);
            if remaining <= budget {
                current = corner;
                budget -= remaining;
                let _ = self.route.remove(0);
            } else {
                current += (corner - current) * (budget / remaining);
                budget = 0.0;
            }
        }

        (current != position).then_some(current)
    }
}

#[cfg(test)]
mod tests {
    use maze_chase_core::{CellCoord, ChaseConfig, Direction, MazeSize};
    use maze_chase_world::{
        maze::GridMaze,
        navigation::{collect_sources, BuildSettings, NavigationSurfaceBuilder},
        scene,
    };

    use super::*;

    fn corridor() -> (NavigationSurface, SurfaceGeneration) {
        let config = ChaseConfig::default();
        let mut maze = GridMaze::allocate(MazeSize::new(3)).expect("allocate");
        assert!(maze.open_wall(CellCoord::new(0, 0), Direction::East));
        assert!(maze.open_wall(CellCoord::new(1, 0), Direction::East));

        let bounds = scene::maze_bounds(maze.size(), 1.2, config.navigation.extra_bounds);
        let mut candidates = vec![scene::floor_source(maze.size(), 1.2)];
        candidates.extend(scene::wall_sources(&maze, 1.2));
        let mut builder = NavigationSurfaceBuilder::new(BuildSettings::from_config(
            &config.maze,
            &config.navigation,
        ));
        let generation = builder.begin(bounds, collect_sources(&bounds, candidates));
        let _ = builder.finish();
        (builder.surface().cloned().expect("surface ready"), generation)
    }

    #[test]
    fn stays_put_until_surface_is_ready() {
        let (surface, _) = corridor();
        let mut autopilot = Autopilot::new(2.0);
        let moved = autopilot.advance(
            Some(&surface),
            Vec2::ZERO,
            Some(Vec2::new(2.4, 0.0)),
            Duration::from_millis(100),
        );
        assert_eq!(moved, None);
    }

    #[test]
    fn walks_the_corridor_at_its_speed() {
        let (surface, generation) = corridor();
        let mut autopilot = Autopilot::new(2.0);
        autopilot.handle(&[Event::NavigationSurfaceReady { generation }]);

        let exit = Some(Vec2::new(2.4, 0.0));
        let first = autopilot
            .advance(Some(&surface), Vec2::ZERO, exit, Duration::from_millis(500))
            .expect("target walks");
        assert!((first - Vec2::new(1.0, 0.0)).length() < 1e-4);

        let second = autopilot
            .advance(Some(&surface), first, exit, Duration::from_secs(2))
            .expect("target walks");
        assert!((second - Vec2::new(2.4, 0.0)).length() < 1e-4);
        assert_eq!(
            autopilot.advance(Some(&surface), second, exit, Duration::from_secs(1)),
            None
        );
    }

    #[test]
    fn trap_slows_the_target_for_its_duration() {
        let (surface, generation) = corridor();
        let mut autopilot = Autopilot::new(2.0);
        autopilot.handle(&[
            Event::NavigationSurfaceReady { generation },
            Event::TrapTriggered {
                position: Vec2::ZERO,
                victim: TrapVictim::Target,
                slow_factor: 0.5,
                duration: Duration::from_millis(500),
            },
        ]);

        let exit = Some(Vec2::new(2.4, 0.0));
        let slowed = autopilot
            .advance(Some(&surface), Vec2::ZERO, exit, Duration::from_millis(500))
            .expect("target walks");
        assert!((slowed - Vec2::new(0.5, 0.0)).length() < 1e-4);

        let recovered = autopilot
            .advance(Some(&surface), slowed, exit, Duration::from_millis(250))
            .expect("target walks");
        assert!((recovered - Vec2::new(1.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn pursuer_traps_leave_the_target_alone() {
        let (surface, generation) = corridor();
        let mut autopilot = Autopilot::new(2.0);
        autopilot.handle(&[
            Event::NavigationSurfaceReady { generation },
            Event::TrapTriggered {
                position: Vec2::ZERO,
                victim: TrapVictim::Pursuer,
                slow_factor: 0.5,
                duration: Duration::from_secs(1),
            },
        ]);
        let moved = autopilot
            .advance(
                Some(&surface),
                Vec2::ZERO,
                Some(Vec2::new(2.4, 0.0)),
                Duration::from_millis(500),
            )
            .expect("target walks");
        assert!((moved - Vec2::new(1.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn clearing_forgets_the_route() {
        let (surface, generation) = corridor();
        let mut autopilot = Autopilot::new(2.0);
        autopilot.handle(&[Event::NavigationSurfaceReady { generation }, Event::MazeCleared]);
        assert_eq!(
            autopilot.advance(
                Some(&surface),
                Vec2::ZERO,
                Some(Vec2::new(2.4, 0.0)),
                Duration::from_millis(100)
            ),
            None
        );
    }
}
