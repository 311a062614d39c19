use bevy_ecs::prelude::Component;

/// Mass of an entity in simulation mass units. Always positive.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Mass(pub f64);
