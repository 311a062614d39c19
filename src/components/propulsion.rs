//! Thrust inputs with multiple named forces.
//!
//! The [`Propulsion`] component stores the thrust vectors currently applied
//! to an entity. Each force can be individually enabled/disabled, so game
//! logic can toggle a main drive, manoeuvring jets or a tractor pull without
//! forgetting their configured vectors.
//!
//! The motion model only reads [`Propulsion::total_thrust`]; it never
//! changes the forces itself.

use bevy_ecs::prelude::Component;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// A named thrust force that can be toggled on/off.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThrustForce {
    /// Force vector in simulation force units.
    pub value: Vec3,
    /// Whether this force is currently applied.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ThrustForce {
    /// Create a new enabled thrust force.
    pub fn new(value: Vec3) -> Self {
        Self {
            value,
            enabled: true,
        }
    }
}

/// Named thrust forces acting on an entity.
///
/// # Example
/// ```ignore
/// let mut p = Propulsion::new();
/// p.add_force("main_drive", Vec3::new(0.0, 0.0, 40.0));
/// p.add_force("retro", Vec3::new(0.0, 0.0, -40.0));
/// p.set_force_enabled("retro", false);
/// ```
#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct Propulsion {
    pub forces: FxHashMap<String, ThrustForce>,
}

impl Propulsion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a named force (enabled).
    pub fn add_force(&mut self, name: &str, value: Vec3) {
        self.forces.insert(name.to_string(), ThrustForce::new(value));
    }

    /// Remove a named force. Returns false if it did not exist.
    pub fn remove_force(&mut self, name: &str) -> bool {
        self.forces.remove(name).is_some()
    }

    /// Enable or disable a force by name.
    /// Returns false if the force doesn't exist.
    pub fn set_force_enabled(&mut self, name: &str, enabled: bool) -> bool {
        if let Some(force) = self.forces.get_mut(name) {
            force.enabled = enabled;
            true
        } else {
            false
        }
    }

    /// Enabled thrust vectors, ordered by force name.
    pub fn applied(&self) -> Vec<Vec3> {
        let mut named: Vec<(&String, &ThrustForce)> =
            self.forces.iter().filter(|(_, f)| f.enabled).collect();
        named.sort_by(|a, b| a.0.cmp(b.0));
        named.into_iter().map(|(_, f)| f.value).collect()
    }

    /// Sum of all enabled forces.
    ///
    /// Summed in name order so the result does not depend on map iteration.
    pub fn total_thrust(&self) -> Vec3 {
        self.applied().into_iter().sum()
    }
}
