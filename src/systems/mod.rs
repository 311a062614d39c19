//! Simulation systems.
//!
//! Functions that read and mutate entities held by the
//! [`Registry`](crate::resources::registry::Registry).
//!
//! Submodules overview
//! - [`actions`] – named action handlers and their access sets
//! - [`dispatch`] – dispatcher worker loop and reply fan-out
//! - [`motion`] – fixed-step integration of thrust and gravity up to a timestamp
//! - [`storage`] – capacity-bounded, cycle-free containment
//! - [`transfer`] – proximity-checked resource transfer between two entities

pub mod actions;
pub mod dispatch;
pub mod motion;
pub mod storage;
pub mod transfer;
