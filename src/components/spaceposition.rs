//! Spatial state advanced by the motion model.
//!
//! [`SpacePosition`] is only present on entities that exist in space on their
//! own; a stowed ship component has none. [`LastUpdate`] is present on every
//! entity and records the instant its state was last brought up to date.
//!
//! The position keeps a *step origin*: where the entity stood at the end of
//! its last completed integration step. Partial steps are always measured
//! from that origin, see [`crate::systems::motion`].

use bevy_ecs::prelude::Component;

use crate::math::Vec3;
use crate::resources::simclock::SimTime;

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct SpacePosition {
    /// Current position as of [`LastUpdate::at`].
    pub pos: Vec3,
    /// Position at the end of the last completed full step.
    pub step_origin: Vec3,
    /// Time at which the last completed full step ended.
    pub step_start: SimTime,
}

impl SpacePosition {
    pub fn new(pos: Vec3, now: SimTime) -> Self {
        Self {
            pos,
            step_origin: pos,
            step_start: now,
        }
    }

    /// Move the entity instantly, restarting the step grid at `now`.
    pub fn teleport(&mut self, pos: Vec3, now: SimTime) {
        *self = Self::new(pos, now);
    }
}

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LastUpdate {
    pub at: SimTime,
}
