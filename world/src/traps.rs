//! Slowing traps the target leaves behind.
//!
//! A trap sets off once, for whichever body first comes within the
//! detection radius, and is removed in the same tick. The target is only
//! checked after the creator grace has passed, so a fresh drop does not
//! trip its own creator.

use std::time::Duration;

use maze_chase_core::{Event, TrapConfig, TrapVictim, Vec2};
use tracing::debug;

/// Trap lying on the maze floor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trap {
    position: Vec2,
    age: Duration,
}

impl Trap {
    /// Position on the ground plane.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Time since the trap was dropped.
    #[must_use]
    pub const fn age(&self) -> Duration {
        self.age
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TrapField {
    traps: Vec<Trap>,
    cooldown: Duration,
}

impl TrapField {
    pub(crate) fn traps(&self) -> &[Trap] {
        &self.traps
    }

    pub(crate) const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub(crate) fn clear(&mut self) {
        self.traps.clear();
        self.cooldown = Duration::ZERO;
    }

    /// Drops a trap unless the previous drop is still cooling down.
    pub(crate) fn drop_at(&mut self, position: Vec2, config: &TrapConfig) -> bool {
        if !self.cooldown.is_zero() {
            return false;
        }
        self.traps.push(Trap {
            position,
            age: Duration::ZERO,
        });
        self.cooldown = config.cooldown();
        true
    }

    /// Ages every trap, removes the expired ones and sets off the rest.
    pub(crate) fn tick(
        &mut self,
        dt: Duration,
        target: Vec2,
        pursuer: Option<Vec2>,
        config: &TrapConfig,
        out_events: &mut Vec<Event>,
    ) {
        self.cooldown = self.cooldown.saturating_sub(dt);

        let lifetime = config.lifetime();
        let before = self.traps.len();
        for trap in &mut self.traps {
            trap.age = trap.age.saturating_add(dt);
        }
        self.traps.retain(|trap| trap.age < lifetime);
        if self.traps.len() < before {
            debug!(expired = before - self.traps.len(), "traps expired");
        }

        let radius = config.detection_radius;
        let grace = config.creator_grace();
        self.traps.retain(|trap| {
            let victim = if trap.age >= grace && trap.position.distance(target) <= radius {
                TrapVictim::Target
            } else if pursuer.is_some_and(|at| trap.position.distance(at) <= radius) {
                TrapVictim::Pursuer
            } else {
                return true;
            };
            debug!(?victim, x = trap.position.x, z = trap.position.y, "trap set off");
            out_events.push(Event::TrapTriggered {
                position: trap.position,
                victim,
                slow_factor: config.slow_factor,
                duration: config.slow_duration(),
            });
            false
        });
    }
}
