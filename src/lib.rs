//! Starhold library.
//!
//! Simulation and interaction core of a multiplayer space sandbox. Exposes
//! the entity components, registry, motion model, action dispatcher and
//! transport for use by the server binary and integration tests.

pub mod components;
pub mod error;
pub mod events;
pub mod math;
pub mod resources;
pub mod scenario;
pub mod server;
pub mod systems;
