//! Lazy, fixed-step motion model.
//!
//! Entities are not simulated every frame. Instead, whenever something needs
//! an entity's position "as of" some instant, [`advance`] brings it up to
//! date by integrating the forces acting on it since its last update.
//!
//! # Stepping
//!
//! Time is cut into fixed steps of `Δ` ([`SimConfig::step`]) measured from
//! the entity's *step origin* (see
//! [`SpacePosition`](crate::components::spaceposition::SpacePosition)). A gap
//! longer than `Δ` is integrated as a run of full steps followed by one
//! partial step. Full steps move the step origin forward; the partial step is
//! always evaluated from the origin, so asking for `T` in one call or in ten
//! calls lands on the same position.
//!
//! For each step of length `dt`:
//! 1. every gravity influence is advanced to the step's end time first;
//! 2. each contributes `G * M / r²` toward itself (coincident bodies are
//!    skipped for that step, their direction is undefined);
//! 3. gravity and enabled thrust are summed into one resultant;
//! 4. `displacement = resultant / mass * dt²`, starting from rest: velocity
//!    is deliberately not carried between steps.
//!
//! Influences that are already past the step's end, or that are being
//! advanced further up the call stack (mutual attraction), are used at their
//! current position instead of being advanced again.
//!
//! [`SimConfig::step`]: crate::resources::simconfig::SimConfig::step

use bevy_ecs::prelude::Entity;
use log::{debug, trace, warn};
use smallvec::SmallVec;

use crate::components::gravitywell::GravityWell;
use crate::components::identity::EntityId;
use crate::components::mass::Mass;
use crate::components::propulsion::Propulsion;
use crate::components::spaceposition::{LastUpdate, SpacePosition};
use crate::error::SimError;
use crate::math::Vec3;
use crate::resources::registry::Registry;
use crate::resources::simclock::SimTime;

/// Entities currently being advanced, innermost last.
type AdvanceStack = SmallVec<[Entity; 8]>;

/// Bring `id` up to date as of `target` and return its position.
///
/// Fails with [`SimError::NoPosition`] for positionless entities and with
/// [`SimError::NonMonotonicTime`] when `target` is before the entity's last
/// update. On failure nothing is modified. Calling again with the same
/// `target` is a no-op.
pub fn advance(registry: &mut Registry, id: &EntityId, target: SimTime) -> Result<Vec3, SimError> {
    let entity = registry.entity(id)?;
    let mut stack = AdvanceStack::new();
    advance_entity(registry, id, entity, target, &mut stack)
}

/// Advance `id` to the registry clock's current time.
pub fn advance_to_now(registry: &mut Registry, id: &EntityId) -> Result<Vec3, SimError> {
    let now = registry.now();
    advance(registry, id, now)
}

fn advance_entity(
    registry: &mut Registry,
    id: &EntityId,
    entity: Entity,
    target: SimTime,
    stack: &mut AdvanceStack,
) -> Result<Vec3, SimError> {
    let world = registry.world();
    let Some(mut state) = world.get::<SpacePosition>(entity).copied() else {
        return Err(SimError::NoPosition(id.clone()));
    };
    let last = world
        .get::<LastUpdate>(entity)
        .map(|l| l.at)
        .unwrap_or(state.step_start);

    if target < last {
        return Err(SimError::NonMonotonicTime {
            id: id.clone(),
            last,
            requested: target,
        });
    }
    if target == last {
        return Ok(state.pos);
    }

    let step = registry.config().step;
    stack.push(entity);

    while target - state.step_start >= step {
        let end = state.step_start + step;
        let displacement = step_displacement(registry, entity, state.step_origin, end, step, stack);
        state.step_origin += displacement;
        state.step_start = end;
        state.pos = state.step_origin;
        store(registry, entity, state, end);
    }

    if target > state.step_start {
        let dt = target - state.step_start;
        let displacement = step_displacement(registry, entity, state.step_origin, target, dt, stack);
        state.pos = state.step_origin + displacement;
    }
    store(registry, entity, state, target);

    stack.pop();
    trace!("'{}' advanced to t={} at {:?}", id, target, state.pos);
    Ok(state.pos)
}

fn store(registry: &mut Registry, entity: Entity, state: SpacePosition, at: SimTime) {
    let world = registry.world_mut();
    if let Some(mut position) = world.get_mut::<SpacePosition>(entity) {
        *position = state;
    }
    if let Some(mut last) = world.get_mut::<LastUpdate>(entity) {
        last.at = at;
    }
}

/// Displacement of `entity` over one step of length `dt` ending at `end`,
/// starting at rest from `origin`.
fn step_displacement(
    registry: &mut Registry,
    entity: Entity,
    origin: Vec3,
    end: SimTime,
    dt: SimTime,
    stack: &mut AdvanceStack,
) -> Vec3 {
    let gravity = registry.config().gravity;
    let (mass, thrust, influences) = {
        let world = registry.world();
        let mass = world.get::<Mass>(entity).map_or(1.0, |m| m.0);
        let thrust = world
            .get::<Propulsion>(entity)
            .map_or(Vec3::ZERO, |p| p.total_thrust());
        let influences = world
            .get::<GravityWell>(entity)
            .map(|g| g.influences.clone())
            .unwrap_or_default();
        (mass, thrust, influences)
    };

    let mut resultant = Vec3::ZERO;
    for source_id in &influences {
        let Some((source_pos, source_mass)) = influence_state(registry, source_id, end, stack)
        else {
            continue;
        };
        let offset = source_pos - origin;
        match offset.unit() {
            Ok(direction) => {
                let magnitude = gravity * source_mass / offset.magnitude_squared();
                resultant += direction * magnitude;
            }
            Err(_) => {
                debug!("Skipping coincident influence '{}' for this step", source_id);
            }
        }
    }
    resultant += thrust;

    let dt = dt as f64;
    resultant / mass * (dt * dt)
}

/// Position and mass of an influence, brought up to `end` where possible.
fn influence_state(
    registry: &mut Registry,
    source_id: &EntityId,
    end: SimTime,
    stack: &mut AdvanceStack,
) -> Option<(Vec3, f64)> {
    let Ok(source) = registry.entity(source_id) else {
        warn!("Gravity influence '{}' no longer exists, skipping", source_id);
        return None;
    };
    let world = registry.world();
    let mass = world.get::<Mass>(source)?.0;
    let current = world.get::<SpacePosition>(source)?.pos;
    let last = world.get::<LastUpdate>(source).map_or(end, |l| l.at);

    if stack.contains(&source) || last >= end {
        return Some((current, mass));
    }
    match advance_entity(registry, source_id, source, end, stack) {
        Ok(pos) => Some((pos, mass)),
        Err(e) => {
            warn!("Could not advance influence '{}': {}", source_id, e);
            Some((current, mass))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::components::identity::EntityKind;
    use crate::resources::registry::EntityOverrides;
    use crate::resources::simclock::ManualClock;
    use crate::resources::simconfig::SimConfig;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn registry() -> Registry {
        Registry::new(SimConfig::new(), Arc::new(ManualClock::new(0)))
    }

    /// Ship with mass 1e5 pushed along +x by 100 force units: a = 1e-3.
    fn thrusting_ship(reg: &mut Registry) -> EntityId {
        reg.spawn(
            EntityKind::Ship,
            EntityOverrides::default().thrust("main", Vec3::new(100.0, 0.0, 0.0)),
        )
        .unwrap()
    }

    #[test]
    fn test_no_forces_no_motion() {
        let mut reg = registry();
        let ship = reg
            .spawn(
                EntityKind::Ship,
                EntityOverrides::default().position(Vec3::new(5.0, 6.0, 7.0)),
            )
            .unwrap();
        let pos = advance(&mut reg, &ship, 10_000).unwrap();
        assert_eq!(pos, Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(reg.last_update(&ship).unwrap(), 10_000);
    }

    #[test]
    fn test_single_full_step() {
        let mut reg = registry();
        let ship = thrusting_ship(&mut reg);
        let pos = advance(&mut reg, &ship, 250).unwrap();
        // 1e-3 * 250²
        assert!(approx_eq(pos.x, 62.5));
        assert!(approx_eq(pos.y, 0.0));
    }

    #[test]
    fn test_partial_step() {
        let mut reg = registry();
        let ship = thrusting_ship(&mut reg);
        let pos = advance(&mut reg, &ship, 125).unwrap();
        assert!(approx_eq(pos.x, 15.625));
    }

    #[test]
    fn test_long_gap_is_cut_into_steps() {
        let mut reg = registry();
        let ship = thrusting_ship(&mut reg);
        // four full steps and a partial of 100
        let pos = advance(&mut reg, &ship, 1100).unwrap();
        assert!(approx_eq(pos.x, 4.0 * 62.5 + 10.0));
    }

    #[test]
    fn test_same_target_is_noop() {
        let mut reg = registry();
        let ship = thrusting_ship(&mut reg);
        let first = advance(&mut reg, &ship, 600).unwrap();
        let second = advance(&mut reg, &ship, 600).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.position(&ship).unwrap(), Some(first));
    }

    #[test]
    fn test_backwards_is_rejected_without_change() {
        let mut reg = registry();
        let ship = thrusting_ship(&mut reg);
        let pos = advance(&mut reg, &ship, 500).unwrap();
        let err = advance(&mut reg, &ship, 400).unwrap_err();
        assert_eq!(
            err,
            SimError::NonMonotonicTime {
                id: ship.clone(),
                last: 500,
                requested: 400
            }
        );
        assert_eq!(reg.position(&ship).unwrap(), Some(pos));
        assert_eq!(reg.last_update(&ship).unwrap(), 500);
    }

    #[test]
    fn test_component_has_no_position() {
        let mut reg = registry();
        let part = reg
            .spawn(EntityKind::ShipComponent, EntityOverrides::default())
            .unwrap();
        assert_eq!(
            advance(&mut reg, &part, 100).unwrap_err(),
            SimError::NoPosition(part)
        );
    }

    #[test]
    fn test_gravity_pulls_toward_star() {
        let mut reg = registry();
        let star = reg.spawn(EntityKind::Star, EntityOverrides::default()).unwrap();
        let ship = reg
            .spawn(
                EntityKind::Ship,
                EntityOverrides::default().position(Vec3::new(1e8, 0.0, 0.0)),
            )
            .unwrap();
        assert!(reg.add_gravity_influence(&ship, &star).unwrap());

        let pos = advance(&mut reg, &ship, 250).unwrap();
        // G * 1e30 / (1e8)² / 1e5 * 250²
        let expected = 1e8 - 6.674e-11 * 1e30 / 1e16 / 1e5 * 62_500.0;
        assert!((pos.x - expected).abs() < 1e-6);
        assert!(approx_eq(pos.y, 0.0));
        // the star was brought along to the same instant
        assert_eq!(reg.last_update(&star).unwrap(), 250);
    }

    #[test]
    fn test_coincident_influence_is_skipped() {
        let mut reg = registry();
        let star = reg.spawn(EntityKind::Star, EntityOverrides::default()).unwrap();
        let ship = reg.spawn(EntityKind::Ship, EntityOverrides::default()).unwrap();
        reg.add_gravity_influence(&ship, &star).unwrap();

        let pos = advance(&mut reg, &ship, 1000).unwrap();
        assert_eq!(pos, Vec3::ZERO);
    }

    #[test]
    fn test_mutual_influence_terminates() {
        let mut reg = registry();
        let star = reg.spawn(EntityKind::Star, EntityOverrides::default()).unwrap();
        let planet = reg
            .spawn(
                EntityKind::Planet,
                EntityOverrides::default().position(Vec3::new(1.5e11, 0.0, 0.0)),
            )
            .unwrap();
        reg.add_gravity_influence(&star, &planet).unwrap();
        reg.add_gravity_influence(&planet, &star).unwrap();

        let planet_pos = advance(&mut reg, &planet, 2_000).unwrap();
        assert!(planet_pos.x <= 1.5e11);
        assert_eq!(reg.last_update(&star).unwrap(), 2_000);
        assert_eq!(reg.last_update(&planet).unwrap(), 2_000);
    }

    #[test]
    fn test_removed_influence_is_ignored() {
        let mut reg = registry();
        let star = reg.spawn(EntityKind::Star, EntityOverrides::default()).unwrap();
        let ship = reg
            .spawn(
                EntityKind::Ship,
                EntityOverrides::default().position(Vec3::new(1e8, 0.0, 0.0)),
            )
            .unwrap();
        reg.add_gravity_influence(&ship, &star).unwrap();
        reg.remove(&star).unwrap();

        let pos = advance(&mut reg, &ship, 750).unwrap();
        assert_eq!(pos, Vec3::new(1e8, 0.0, 0.0));
    }

    #[test]
    fn test_advance_to_now_uses_clock() {
        let clock = Arc::new(ManualClock::new(0));
        let mut reg = Registry::new(SimConfig::new(), clock.clone());
        let ship = thrusting_ship(&mut reg);
        clock.set(250);
        let pos = advance_to_now(&mut reg, &ship).unwrap();
        assert!(approx_eq(pos.x, 62.5));
    }
}
