#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pursuer controller that hunts the target over the navigation surface.
//!
//! The pursuer stays inert until the navigation surface announces readiness
//! for the current round. Once active it re-evaluates line of sight, speed
//! and facing every tick, and re-plans its destination on a coarser fixed
//! period. Navigation query failures never escape the system; they degrade
//! to straight-line estimates or a fresh search sample.

use std::{collections::VecDeque, time::Duration};

use maze_chase_core::{
    ChaseConfig, Command, Event, PursuerConfig, TargetSnapshot, TrapVictim, Vec2,
};
use maze_chase_world::navigation::NavigationSurface;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, UnitDisc};
use tracing::{debug, info, warn};

const PURSUIT_SEED_SALT: u64 = 0x7075_7273_7565_7221;
const FACING_SPEED_THRESHOLD: f32 = 0.1;
const CONTACT_TOLERANCE: f32 = 1e-3;

/// Publicly observable pursuit state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PursuitState {
    /// Target position recorded at the most recent update.
    pub last_known_target_position: Option<Vec2>,
    /// Whether the pursuer saw the target on the latest tick.
    pub has_line_of_sight: bool,
    /// Speed applied to movement this tick.
    pub current_speed: f32,
    /// Speed used while the target is near along the path.
    pub base_speed: f32,
    /// Whether the pursuer is hunting this round.
    pub active: bool,
}

#[derive(Clone, Copy, Debug)]
struct SlowEffect {
    remaining: Duration,
}

#[derive(Clone, Debug)]
struct Body {
    position: Vec2,
    heading: Vec2,
    path: VecDeque<Vec2>,
    destination: Option<Vec2>,
    velocity: Vec2,
}

impl Body {
    fn new(position: Vec2) -> Self {
        Self {
            position,
            heading: Vec2::Y,
            path: VecDeque::new(),
            destination: None,
            velocity: Vec2::ZERO,
        }
    }

    fn remaining_distance(&self) -> f32 {
        let mut from = self.position;
        let mut total = 0.0;
        for corner in &self.path {
            total += from.distance(*corner);
            from = *corner;
        }
        total
    }
}

/// Pure system driving a single pursuer.
#[derive(Debug)]
pub struct Pursuit {
    config: PursuerConfig,
    agent_radius: f32,
    seed: u64,
    rng: ChaCha8Rng,
    spawn: Option<Vec2>,
    body: Option<Body>,
    state: PursuitState,
    retarget_in: Duration,
    slow: Option<SlowEffect>,
    last_path_length: Option<f32>,
    last_straight_distance: Option<f32>,
    caught_reported: bool,
}

impl Pursuit {
    /// Creates an inactive pursuer configured from the session settings.
    #[must_use]
    pub fn new(config: &ChaseConfig) -> Self {
        let seed = config.seed ^ PURSUIT_SEED_SALT;
        Self {
            agent_radius: config.navigation.agent_radius,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            spawn: None,
            body: None,
            state: inactive_state(&config.pursuer),
            retarget_in: Duration::ZERO,
            slow: None,
            last_path_length: None,
            last_straight_distance: None,
            caught_reported: false,
            config: config.pursuer.clone(),
        }
    }

    /// Consumes world events and read-only views, emitting position updates
    /// and catch reports.
    ///
    /// `surface` must be the published surface, or `None` while it is not
    /// ready; the pursuer never queries anything else.
    pub fn handle(
        &mut self,
        events: &[Event],
        surface: Option<&NavigationSurface>,
        target: TargetSnapshot,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            match event {
                Event::MazeCleared => self.reset(),
                Event::PursuerSpawned { position } => {
                    self.reset();
                    self.spawn = Some(*position);
                    if let Some(surface) = surface {
                        self.activate(surface, target);
                    }
                }
                Event::NavigationSurfaceReady { generation } => {
                    if self.state.active {
                        debug!(generation = generation.get(), "pursuer already active");
                        continue;
                    }
                    if let Some(surface) = surface {
                        self.activate(surface, target);
                    }
                }
                Event::TargetCaught => self.caught_reported = true,
                Event::TrapTriggered {
                    victim: TrapVictim::Pursuer,
                    slow_factor,
                    duration,
                    ..
                } => self.apply_slow_effect(*slow_factor, *duration),
                Event::TimeAdvanced { dt } => {
                    if let Some(surface) = surface {
                        self.tick(*dt, surface, target, out);
                    }
                }
                _ => {}
            }
        }
    }

    /// Observable pursuit state.
    #[must_use]
    pub const fn state(&self) -> &PursuitState {
        &self.state
    }

    /// Current position, once the pursuer was spawned and activated.
    #[must_use]
    pub fn position(&self) -> Option<Vec2> {
        self.body.as_ref().map(|body| body.position)
    }

    /// Unit vector the pursuer faces.
    #[must_use]
    pub fn heading(&self) -> Option<Vec2> {
        self.body.as_ref().map(|body| body.heading)
    }

    /// Point the pursuer is currently walking toward.
    #[must_use]
    pub fn destination(&self) -> Option<Vec2> {
        self.body.as_ref().and_then(|body| body.destination)
    }

    /// Path length to the target measured on the latest tick, if a path
    /// existed.
    #[must_use]
    pub const fn last_path_length(&self) -> Option<f32> {
        self.last_path_length
    }

    /// Reports whether an external slow effect is holding the speed.
    #[must_use]
    pub const fn is_slowed(&self) -> bool {
        self.slow.is_some()
    }

    /// Multiplies the current speed by `factor` and holds it for `duration`.
    pub fn apply_slow_effect(&mut self, factor: f32, duration: Duration) {
        if !self.state.active || !factor.is_finite() || factor < 0.0 {
            return;
        }
        self.state.current_speed *= factor;
        self.slow = Some(SlowEffect {
            remaining: duration,
        });
        debug!(factor, ?duration, speed = self.state.current_speed, "pursuer slowed");
    }

    /// Lifts any slow effect and returns to the dynamic speed rule.
    ///
    /// Without a measured path the straight-line distance to the target
    /// decides, as it does during a tick.
    pub fn restore_speed(&mut self) {
        self.slow = None;
        let distance = self.last_path_length.or(self.last_straight_distance).or_else(|| {
            let body = self.body.as_ref()?;
            let known = self.state.last_known_target_position?;
            Some(body.position.distance(known))
        });
        self.state.current_speed =
            distance.map_or(self.state.base_speed, |distance| self.speed_for_distance(distance));
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.spawn = None;
        self.body = None;
        self.state = inactive_state(&self.config);
        self.retarget_in = Duration::ZERO;
        self.slow = None;
        self.last_path_length = None;
        self.last_straight_distance = None;
        self.caught_reported = false;
    }

    fn activate(&mut self, surface: &NavigationSurface, target: TargetSnapshot) {
        let Some(spawn) = self.spawn else {
            return;
        };
        let Some(position) = surface.sample_position(spawn, self.config.snap_distance) else {
            warn!(x = spawn.x, z = spawn.y, "pursuer spawn is off the navigation surface");
            return;
        };

        self.body = Some(Body::new(position));
        self.state.active = true;
        self.retarget_in = self.config.first_retarget_delay();
        self.state.last_known_target_position = Some(target.position);
        let _ = self.set_destination(surface, target.position);
        info!(x = position.x, z = position.y, "pursuer activated");
    }

    fn tick(
        &mut self,
        dt: Duration,
        surface: &NavigationSurface,
        target: TargetSnapshot,
        out: &mut Vec<Command>,
    ) {
        if !self.state.active || self.body.is_none() {
            return;
        }

        self.state.has_line_of_sight = self.line_of_sight(surface, target);
        self.update_slow_effect(dt);
        self.update_speed(surface, target);
        if let Some(position) = self.advance(dt) {
            out.push(Command::MovePursuer { position });
        }
        self.face_movement(dt);
        self.check_catch(target, out);

        self.retarget_in = self.retarget_in.saturating_sub(dt);
        if self.retarget_in.is_zero() {
            self.retarget(surface, target);
            self.retarget_in = self.config.retarget_interval();
        }
    }

    fn line_of_sight(&self, surface: &NavigationSurface, target: TargetSnapshot) -> bool {
        let Some(body) = &self.body else {
            return false;
        };
        let offset = target.position - body.position;
        let Some(direction) = offset.try_normalize() else {
            return true;
        };
        let range = self.config.line_of_sight_distance;
        let target_at = (offset.length() - target.radius).max(0.0);
        if target_at > range {
            return false;
        }
        surface
            .raycast(body.position, direction, range)
            .map_or(true, |blocked_at| target_at <= blocked_at)
    }

    fn update_slow_effect(&mut self, dt: Duration) {
        let Some(slow) = self.slow.as_mut() else {
            return;
        };
        slow.remaining = slow.remaining.saturating_sub(dt);
        if slow.remaining.is_zero() {
            self.restore_speed();
            debug!(speed = self.state.current_speed, "pursuer slow effect expired");
        }
    }

    fn update_speed(&mut self, surface: &NavigationSurface, target: TargetSnapshot) {
        let Some(body) = &self.body else {
            return;
        };
        let straight = body.position.distance(target.position);
        self.last_straight_distance = Some(straight);
        let distance = match surface.find_path(body.position, target.position) {
            Ok(path) => {
                let length = path.length();
                self.last_path_length = Some(length);
                length
            }
            Err(failure) => {
                debug!(%failure, "path to target unavailable; using straight-line distance");
                self.last_path_length = None;
                straight
            }
        };

        if self.slow.is_none() {
            self.state.current_speed = self.speed_for_distance(distance);
        }
    }

    fn speed_for_distance(&self, distance: f32) -> f32 {
        if distance > self.config.boost_distance {
            self.config.boosted_speed
        } else {
            self.state.base_speed
        }
    }

    /// Walks the path for `dt`, returning the new position if it changed.
    fn advance(&mut self, dt: Duration) -> Option<Vec2> {
        let speed = self.state.current_speed;
        let stopping = self.config.stopping_distance;
        let body = self.body.as_mut()?;

        let start = body.position;
        let allowed = (body.remaining_distance() - stopping).max(0.0);
        let mut travel = (speed * dt.as_secs_f32()).min(allowed);
        while travel > 0.0 {
            let Some(corner) = body.path.front().copied() else {
                break;
            };
            let to_corner = corner - body.position;
            let distance = to_corner.length();
            if distance <= travel {
                body.position = corner;
                travel -= distance;
                let _ = body.path.pop_front();
            } else {
                body.position += to_corner / distance * travel;
                travel = 0.0;
            }
        }

        let seconds = dt.as_secs_f32();
        body.velocity = if seconds > 0.0 {
            (body.position - start) / seconds
        } else {
            Vec2::ZERO
        };
        (body.position != start).then_some(body.position)
    }

    fn face_movement(&mut self, dt: Duration) {
        let max_turn = self.config.rotation_speed_degrees.to_radians() * dt.as_secs_f32();
        let Some(body) = self.body.as_mut() else {
            return;
        };
        if body.velocity.length() <= FACING_SPEED_THRESHOLD {
            return;
        }
        let Some(desired) = body.velocity.try_normalize() else {
            return;
        };
        let angle = body.heading.angle_between(desired);
        let turn = angle.clamp(-max_turn, max_turn);
        body.heading = Vec2::from_angle(turn).rotate(body.heading).normalize_or_zero();
    }

    fn check_catch(&mut self, target: TargetSnapshot, out: &mut Vec<Command>) {
        if self.caught_reported {
            return;
        }
        let Some(body) = &self.body else {
            return;
        };
        let distance = body.position.distance(target.position);
        let contact = self.agent_radius + target.radius + CONTACT_TOLERANCE;
        if distance < self.config.attack_range || distance <= contact {
            self.caught_reported = true;
            info!(distance, "pursuer reached the target");
            out.push(Command::ReportTargetCaught);
        }
    }

    fn retarget(&mut self, surface: &NavigationSurface, target: TargetSnapshot) {
        let moved = self
            .state
            .last_known_target_position
            .map_or(true, |known| {
                known.distance(target.position) > self.config.moved_threshold
            });

        if self.state.has_line_of_sight || moved {
            self.state.last_known_target_position = Some(target.position);
            let _ = self.set_destination(surface, target.position);
            return;
        }

        let Some(body) = &self.body else {
            return;
        };
        let arrived_within = self.config.stopping_distance + self.config.arrival_distance;
        if body.path.is_empty() || body.remaining_distance() <= arrived_within {
            self.search(surface);
        }
    }

    fn search(&mut self, surface: &NavigationSurface) {
        let Some(anchor) = self.state.last_known_target_position else {
            return;
        };
        let radius = self.config.search_radius;
        for _ in 0..self.config.search_attempts {
            let [x, z]: [f32; 2] = UnitDisc.sample(&mut self.rng);
            let candidate = anchor + Vec2::new(x, z) * radius;
            let Some(point) = surface
                .sample_position(candidate, radius)
                .filter(|point| point.distance(anchor) <= radius)
            else {
                continue;
            };
            if self.set_destination(surface, point) {
                debug!(x = point.x, z = point.y, "pursuer searching near last known position");
                return;
            }
        }
        debug!("no reachable search point found this period");
    }

    fn set_destination(&mut self, surface: &NavigationSurface, point: Vec2) -> bool {
        let Some(body) = self.body.as_mut() else {
            return false;
        };
        match surface.find_path(body.position, point) {
            Ok(path) => {
                body.path = path.corners().iter().skip(1).copied().collect();
                body.destination = Some(point);
                true
            }
            Err(failure) => {
                debug!(%failure, "destination rejected");
                false
            }
        }
    }
}

fn inactive_state(config: &PursuerConfig) -> PursuitState {
    PursuitState {
        last_known_target_position: None,
        has_line_of_sight: false,
        current_speed: config.base_speed,
        base_speed: config.base_speed,
        active: false,
    }
}
