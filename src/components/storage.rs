//! Storage capacity and the ids of entities held inside.
//!
//! Containment is a non-owning relationship: the container lists ids, the
//! contained entities stay owned by the registry. Mutations go through
//! [`crate::systems::storage`], which enforces the capacity bound and
//! rejects containment cycles.

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

use crate::components::identity::EntityId;

/// How many entities a container can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<usize>", into = "Option<usize>")]
pub enum Capacity {
    Limited(usize),
    Unbounded,
}

impl Capacity {
    /// True if `count` entities already fill this capacity.
    pub fn is_full(self, count: usize) -> bool {
        match self {
            Capacity::Limited(max) => count >= max,
            Capacity::Unbounded => false,
        }
    }
}

impl From<Option<usize>> for Capacity {
    fn from(value: Option<usize>) -> Self {
        value.map_or(Capacity::Unbounded, Capacity::Limited)
    }
}

impl From<Capacity> for Option<usize> {
    fn from(value: Capacity) -> Self {
        match value {
            Capacity::Limited(max) => Some(max),
            Capacity::Unbounded => None,
        }
    }
}

#[derive(Component, Clone, Debug, PartialEq)]
pub struct Storage {
    pub capacity: Capacity,
    /// Contained ids, distinct, in insertion order.
    pub inside: Vec<EntityId>,
}

impl Storage {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            capacity,
            inside: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_full(self.inside.len())
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.inside.iter().any(|held| held == id)
    }
}
