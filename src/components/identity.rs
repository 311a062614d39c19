//! Identity of a simulated entity: id, name and kind.
//!
//! Every entity spawned by the [`Registry`](crate::resources::registry::Registry)
//! carries exactly one [`Identity`]. Other entities refer to it only through
//! its [`EntityId`], which is resolved through the registry at use time.

use std::fmt;
use std::str::FromStr;

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Stable, process-unique identifier of an entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId(value)
    }
}

/// The four kinds of simulated object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Star,
    Planet,
    Ship,
    ShipComponent,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Star => "star",
            EntityKind::Planet => "planet",
            EntityKind::Ship => "ship",
            EntityKind::ShipComponent => "ship-component",
        }
    }

    /// Prefix used when generating ids for this kind.
    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Star => "star",
            EntityKind::Planet => "planet",
            EntityKind::Ship => "ship",
            EntityKind::ShipComponent => "component",
        }
    }

    /// Components are stowed inside ships and never exist in space on their own.
    pub fn has_position(self) -> bool {
        !matches!(self, EntityKind::ShipComponent)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "star" => Ok(EntityKind::Star),
            "planet" => Ok(EntityKind::Planet),
            "ship" => Ok(EntityKind::Ship),
            "ship-component" | "ship component" => Ok(EntityKind::ShipComponent),
            other => Err(SimError::UnknownKind(other.to_string())),
        }
    }
}

/// Who an entity is. The id never changes after spawn.
#[derive(Component, Clone, Debug)]
pub struct Identity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
}
