//! Ids of the massive bodies an entity is pulled toward.
//!
//! Membership is a snapshot: the registry only lists a body here if its mass
//! met the materiality threshold at the moment it was added, see
//! [`Registry::add_gravity_influence`](crate::resources::registry::Registry::add_gravity_influence).

use bevy_ecs::prelude::Component;

use crate::components::identity::EntityId;

#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct GravityWell {
    pub influences: Vec<EntityId>,
}

impl GravityWell {
    pub fn contains(&self, id: &EntityId) -> bool {
        self.influences.iter().any(|i| i == id)
    }
}
