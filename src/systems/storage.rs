//! Capacity container behaviour shared by ships, stars, planets and
//! components.
//!
//! A container lists the ids of what it holds in [`Storage::inside`]. The
//! list never grows past the container's capacity and never forms a cycle:
//! an entity cannot end up inside itself, directly or through nesting.

use log::debug;
use rustc_hash::FxHashSet;

use crate::components::identity::EntityId;
use crate::components::storage::Storage;
use crate::error::SimError;
use crate::resources::registry::Registry;

/// Put `item` inside `container`.
///
/// Returns `Ok(false)` without changing anything when the container is full
/// or `item` is already held by this or any other container. Fails with [`SimError::Cycle`] if `item` is the
/// container or (transitively) contains it, and with [`SimError::NotFound`]
/// if either id does not resolve.
pub fn add_inside(
    registry: &mut Registry,
    container: &EntityId,
    item: &EntityId,
) -> Result<bool, SimError> {
    let holder = registry.entity(container)?;
    registry.entity(item)?;

    if container == item || holds_transitively(registry, item, container) {
        return Err(SimError::Cycle {
            container: container.clone(),
            item: item.clone(),
        });
    }

    if let Some(current) = holder_of(registry, item) {
        if &current != container {
            debug!("'{}' is already held by '{}'", item, current);
        }
        return Ok(false);
    }

    let mut storage = registry
        .world_mut()
        .get_mut::<Storage>(holder)
        .ok_or_else(|| SimError::NotFound(container.clone()))?;
    if storage.is_full() {
        debug!("Storage capacity of '{}' is full", container);
        return Ok(false);
    }
    storage.inside.push(item.clone());
    Ok(true)
}

/// Take `item` out of `container`. Returns false if it was not inside.
pub fn remove_inside(
    registry: &mut Registry,
    container: &EntityId,
    item: &EntityId,
) -> Result<bool, SimError> {
    let holder = registry.entity(container)?;
    let mut storage = registry
        .world_mut()
        .get_mut::<Storage>(holder)
        .ok_or_else(|| SimError::NotFound(container.clone()))?;
    let before = storage.inside.len();
    storage.inside.retain(|held| held != item);
    Ok(storage.inside.len() != before)
}

/// The container directly holding `item`, if any.
pub fn holder_of(registry: &Registry, item: &EntityId) -> Option<EntityId> {
    registry.ids().into_iter().find(|id| {
        registry
            .entity(id)
            .ok()
            .and_then(|entity| registry.world().get::<Storage>(entity))
            .is_some_and(|storage| storage.contains(item))
    })
}

/// True if `target` is somewhere inside `outer`, at any depth.
///
/// Ids that no longer resolve are treated as empty.
pub fn holds_transitively(registry: &Registry, outer: &EntityId, target: &EntityId) -> bool {
    let mut pending = vec![outer.clone()];
    let mut visited: FxHashSet<EntityId> = FxHashSet::default();

    while let Some(current) = pending.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Ok(entity) = registry.entity(&current) else {
            continue;
        };
        let Some(storage) = registry.world().get::<Storage>(entity) else {
            continue;
        };
        for held in &storage.inside {
            if held == target {
                return true;
            }
            pending.push(held.clone());
        }
    }
    false
}
