//! ECS components that make up an entity record.
//!
//! The registry spawns every simulated object as one bevy_ecs entity carrying
//! these components. Positionless entities (stowed ship components) simply
//! lack [`spaceposition::SpacePosition`].
//!
//! Submodules overview:
//! - [`cargo`] – resource holdings (fuel, ore, ...)
//! - [`gravitywell`] – ids of bodies whose gravity pulls on the entity
//! - [`identity`] – id, name and kind
//! - [`mass`] – positive mass
//! - [`propulsion`] – named, toggleable thrust forces
//! - [`spaceposition`] – position, integration step origin and last update time
//! - [`storage`] – capacity and ids of contained entities

pub mod cargo;
pub mod gravitywell;
pub mod identity;
pub mod mass;
pub mod propulsion;
pub mod spaceposition;
pub mod storage;
