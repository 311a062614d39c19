//! Entity registry: sole owner of every simulated entity.
//!
//! The registry wraps a bevy_ecs [`World`] and an index from [`EntityId`] to
//! the ECS [`Entity`] holding that record. Everything outside the registry
//! refers to entities by id and resolves them here at use time, so there are
//! no long-lived references to go stale.
//!
//! # Creating entities
//!
//! Entities are created through a factory keyed by [`EntityKind`]. Each kind
//! brings its own defaults (name, mass, storage capacity, whether it has a
//! position); [`EntityOverrides`] replaces any subset of them.
//!
//! ```ignore
//! let mut registry = Registry::new(SimConfig::new(), Arc::new(SystemClock::new()));
//! let sun = registry.create("star", EntityOverrides::default().name("Sol"))?;
//! let ship = registry.create(
//!     "ship",
//!     EntityOverrides::default()
//!         .position(Vec3::new(1.5e6, 0.0, 0.0))
//!         .resource("fuel", 100.0),
//! )?;
//! registry.add_gravity_influence(&ship.id, &sun.id)?;
//! ```
//!
//! # Identity
//!
//! Ids look like `ship-17-3fa09c`: kind prefix, a process-wide counter that
//! guarantees uniqueness, and a random suffix that keeps ids from separate
//! server processes apart in practice.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bevy_ecs::prelude::*;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::components::cargo::Cargo;
use crate::components::gravitywell::GravityWell;
use crate::components::identity::{EntityId, EntityKind, Identity};
use crate::components::mass::Mass;
use crate::components::propulsion::{Propulsion, ThrustForce};
use crate::components::spaceposition::{LastUpdate, SpacePosition};
use crate::components::storage::{Capacity, Storage};
use crate::error::SimError;
use crate::math::Vec3;
use crate::resources::simclock::{Clock, SimTime};
use crate::resources::simconfig::SimConfig;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn generate_id(kind: EntityKind) -> EntityId {
    let serial = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let salt = fastrand::u32(..) & 0x00ff_ffff;
    EntityId::from(format!("{}-{}-{:06x}", kind.id_prefix(), serial, salt))
}

/// Optional replacements for the per-kind defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityOverrides {
    pub name: Option<String>,
    pub position: Option<Vec3>,
    pub mass: Option<f64>,
    pub storage_capacity: Option<Capacity>,
    pub resources: Option<FxHashMap<String, f64>>,
    pub thrust: Option<FxHashMap<String, ThrustForce>>,
}

impl EntityOverrides {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn capacity(mut self, capacity: Capacity) -> Self {
        self.storage_capacity = Some(capacity);
        self
    }

    pub fn resource(mut self, resource: impl Into<String>, amount: f64) -> Self {
        self.resources
            .get_or_insert_with(FxHashMap::default)
            .insert(resource.into(), amount);
        self
    }

    pub fn thrust(mut self, name: impl Into<String>, value: Vec3) -> Self {
        self.thrust
            .get_or_insert_with(FxHashMap::default)
            .insert(name.into(), ThrustForce::new(value));
        self
    }

    fn validate(&self) -> Result<(), SimError> {
        let invalid = |reason: String| SimError::invalid_args("create", reason);
        if let Some(mass) = self.mass.filter(|m| !m.is_finite() || *m <= 0.0) {
            return Err(invalid(format!("mass must be positive and finite, got {}", mass)));
        }
        if self.position.is_some_and(|p| !p.is_finite()) {
            return Err(invalid("position must be finite".into()));
        }
        if let Some(resources) = &self.resources {
            for (resource, amount) in resources {
                if !amount.is_finite() || *amount < 0.0 {
                    return Err(invalid(format!(
                        "resource '{}' must be finite and >= 0, got {}",
                        resource, amount
                    )));
                }
            }
        }
        let bad_thrust = self
            .thrust
            .as_ref()
            .is_some_and(|thrust| thrust.values().any(|f| !f.value.is_finite()));
        if bad_thrust {
            return Err(invalid("thrust vectors must be finite".into()));
        }
        Ok(())
    }
}

/// Per-kind defaults applied by the factory.
struct KindDefaults {
    name: &'static str,
    mass: f64,
    capacity: Capacity,
}

fn kind_defaults(kind: EntityKind, config: &SimConfig) -> KindDefaults {
    match kind {
        EntityKind::Star => KindDefaults {
            name: "Unnamed Star",
            mass: 1e30,
            capacity: Capacity::Unbounded,
        },
        EntityKind::Planet => KindDefaults {
            name: "Unnamed Planet",
            mass: 1e25,
            capacity: Capacity::Unbounded,
        },
        EntityKind::Ship => KindDefaults {
            name: "Unnamed Ship",
            mass: 1e5,
            capacity: Capacity::Limited(config.ship_capacity),
        },
        EntityKind::ShipComponent => KindDefaults {
            name: "Unnamed Component",
            mass: 500.0,
            capacity: Capacity::Unbounded,
        },
    }
}

/// Serializable snapshot of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub mass: f64,
    pub position: Option<Vec3>,
    pub last_update: SimTime,
    pub storage_capacity: Capacity,
    pub entities_inside: Vec<EntityId>,
    pub resources: BTreeMap<String, f64>,
    /// Thrust vectors currently applied.
    pub thrust: Vec<Vec3>,
    pub gravity_influences: Vec<EntityId>,
}

pub struct Registry {
    world: World,
    index: FxHashMap<EntityId, Entity>,
    config: SimConfig,
    clock: Arc<dyn Clock>,
}

impl Registry {
    pub fn new(config: SimConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            world: World::new(),
            index: FxHashMap::default(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Create an entity of the kind named by `kind` and return its record.
    ///
    /// Fails with [`SimError::UnknownKind`] for an unrecognised kind.
    pub fn create(
        &mut self,
        kind: &str,
        overrides: EntityOverrides,
    ) -> Result<EntityRecord, SimError> {
        let kind: EntityKind = kind.parse()?;
        let id = self.spawn(kind, overrides)?;
        self.get(&id)
    }

    /// Typed factory behind [`Registry::create`].
    pub fn spawn(
        &mut self,
        kind: EntityKind,
        overrides: EntityOverrides,
    ) -> Result<EntityId, SimError> {
        overrides.validate()?;
        let defaults = kind_defaults(kind, &self.config);
        let now = self.clock.now();
        let id = generate_id(kind);

        let mut propulsion = Propulsion::new();
        for (name, force) in overrides.thrust.unwrap_or_default() {
            propulsion.forces.insert(name, force);
        }

        let mut entity = self.world.spawn((
            Identity {
                id: id.clone(),
                name: overrides.name.unwrap_or_else(|| defaults.name.to_string()),
                kind,
            },
            Mass(overrides.mass.unwrap_or(defaults.mass)),
            LastUpdate { at: now },
            Storage::new(overrides.storage_capacity.unwrap_or(defaults.capacity)),
            Cargo::new(overrides.resources.unwrap_or_default()),
            propulsion,
            GravityWell::default(),
        ));

        if kind.has_position() {
            let pos = overrides.position.unwrap_or(Vec3::ZERO);
            entity.insert(SpacePosition::new(pos, now));
        } else if overrides.position.is_some() {
            warn!("Ignoring position override for {} '{}'", kind, id);
        }

        let entity = entity.id();
        self.index.insert(id.clone(), entity);
        debug!("Spawned {} '{}' at t={}", kind, id, now);
        Ok(id)
    }

    /// Resolve an id to its ECS entity.
    pub fn entity(&self, id: &EntityId) -> Result<Entity, SimError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| SimError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All registered ids, sorted.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.index.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of the entity's full record.
    pub fn get(&self, id: &EntityId) -> Result<EntityRecord, SimError> {
        let entity = self.entity(id)?;
        let world = &self.world;
        let missing = || SimError::NotFound(id.clone());

        let identity = world.get::<Identity>(entity).ok_or_else(missing)?;
        let storage = world.get::<Storage>(entity).ok_or_else(missing)?;
        let cargo = world.get::<Cargo>(entity).ok_or_else(missing)?;

        Ok(EntityRecord {
            id: identity.id.clone(),
            name: identity.name.clone(),
            kind: identity.kind,
            mass: world.get::<Mass>(entity).ok_or_else(missing)?.0,
            position: world.get::<SpacePosition>(entity).map(|p| p.pos),
            last_update: world.get::<LastUpdate>(entity).ok_or_else(missing)?.at,
            storage_capacity: storage.capacity,
            entities_inside: storage.inside.clone(),
            resources: cargo
                .amounts
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            thrust: world
                .get::<Propulsion>(entity)
                .map(|p| p.applied())
                .unwrap_or_default(),
            gravity_influences: world
                .get::<GravityWell>(entity)
                .map(|g| g.influences.clone())
                .unwrap_or_default(),
        })
    }

    /// Remove an entity. Ids held elsewhere are left dangling and fail to
    /// resolve from then on.
    pub fn remove(&mut self, id: &EntityId) -> Result<(), SimError> {
        let entity = self
            .index
            .remove(id)
            .ok_or_else(|| SimError::NotFound(id.clone()))?;
        self.world.despawn(entity);
        debug!("Removed '{}'", id);
        Ok(())
    }

    /// List `influence` as a gravity source for `id` if it is massive enough.
    ///
    /// Returns `false` (and records nothing) when the influence is lighter
    /// than the materiality threshold, is the entity itself, or is already
    /// listed. The decision is not revisited if masses change later.
    pub fn add_gravity_influence(
        &mut self,
        id: &EntityId,
        influence: &EntityId,
    ) -> Result<bool, SimError> {
        let entity = self.entity(id)?;
        let source = self.entity(influence)?;
        if entity == source {
            return Ok(false);
        }
        let source_mass = self.mass(influence)?;
        if source_mass < self.config.materiality_mass {
            debug!(
                "'{}' ({:e}) is below the materiality threshold for '{}'",
                influence, source_mass, id
            );
            return Ok(false);
        }
        let mut well = self
            .world
            .get_mut::<GravityWell>(entity)
            .ok_or_else(|| SimError::NotFound(id.clone()))?;
        if well.contains(influence) {
            return Ok(false);
        }
        well.influences.push(influence.clone());
        Ok(true)
    }

    pub fn mass(&self, id: &EntityId) -> Result<f64, SimError> {
        let entity = self.entity(id)?;
        self.world
            .get::<Mass>(entity)
            .map(|m| m.0)
            .ok_or_else(|| SimError::NotFound(id.clone()))
    }

    /// Current position, `None` for positionless entities.
    pub fn position(&self, id: &EntityId) -> Result<Option<Vec3>, SimError> {
        let entity = self.entity(id)?;
        Ok(self.world.get::<SpacePosition>(entity).map(|p| p.pos))
    }

    pub fn last_update(&self, id: &EntityId) -> Result<SimTime, SimError> {
        let entity = self.entity(id)?;
        self.world
            .get::<LastUpdate>(entity)
            .map(|l| l.at)
            .ok_or_else(|| SimError::NotFound(id.clone()))
    }

    /// Quantity of `resource` held by `id`.
    pub fn resource_level(&self, id: &EntityId, resource: &str) -> Result<f64, SimError> {
        let entity = self.entity(id)?;
        self.world
            .get::<Cargo>(entity)
            .map(|c| c.get(resource))
            .ok_or_else(|| SimError::NotFound(id.clone()))
    }

    /// Add resources out of thin air (mining, scenario seeding).
    pub fn deposit(
        &mut self,
        id: &EntityId,
        resource: &str,
        amount: f64,
    ) -> Result<f64, SimError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(SimError::invalid_args(
                "deposit",
                format!("amount must be finite and >= 0, got {}", amount),
            ));
        }
        let entity = self.entity(id)?;
        let mut cargo = self
            .world
            .get_mut::<Cargo>(entity)
            .ok_or_else(|| SimError::NotFound(id.clone()))?;
        Ok(cargo.credit(resource, amount))
    }

    /// Add or replace a named thrust force.
    ///
    /// The new force applies from the entity's last update onwards.
    pub fn set_thrust(&mut self, id: &EntityId, name: &str, value: Vec3) -> Result<(), SimError> {
        self.change_thrust(id, |propulsion| {
            propulsion.add_force(name, value);
            true
        })?;
        Ok(())
    }

    /// Remove a named thrust force. Returns false if it was not set.
    pub fn clear_thrust(&mut self, id: &EntityId, name: &str) -> Result<bool, SimError> {
        self.change_thrust(id, |propulsion| propulsion.remove_force(name))
    }

    /// Switch a named thrust force on or off without forgetting its vector.
    /// Returns false if no force has that name.
    pub fn set_thrust_enabled(
        &mut self,
        id: &EntityId,
        name: &str,
        enabled: bool,
    ) -> Result<bool, SimError> {
        self.change_thrust(id, |propulsion| propulsion.set_force_enabled(name, enabled))
    }

    /// Apply `change` to the entity's thrust and, if it reports a change,
    /// restart the step grid at the last update so elapsed time keeps the
    /// forces it was integrated with.
    fn change_thrust(
        &mut self,
        id: &EntityId,
        change: impl FnOnce(&mut Propulsion) -> bool,
    ) -> Result<bool, SimError> {
        let at = self.last_update(id)?;
        let entity = self.entity(id)?;
        let changed = {
            let mut propulsion = self
                .world
                .get_mut::<Propulsion>(entity)
                .ok_or_else(|| SimError::NotFound(id.clone()))?;
            change(&mut *propulsion)
        };
        if !changed {
            return Ok(false);
        }
        if let Some(mut position) = self.world.get_mut::<SpacePosition>(entity) {
            let pos = position.pos;
            position.teleport(pos, at);
        }
        Ok(true)
    }

    /// Place a positioned entity somewhere else as of its last update.
    pub fn teleport(&mut self, id: &EntityId, pos: Vec3) -> Result<(), SimError> {
        let at = self.last_update(id)?;
        let entity = self.entity(id)?;
        let mut position = self
            .world
            .get_mut::<SpacePosition>(entity)
            .ok_or_else(|| SimError::NoPosition(id.clone()))?;
        position.teleport(pos, at);
        Ok(())
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
