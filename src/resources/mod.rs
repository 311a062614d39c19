//! Long-lived shared state of the simulation core.
//!
//! Each submodule documents the semantics and intended usage of its
//! resource(s).
//!
//! Overview
//! - `dispatcher` – worker pool bridge, request de-duplication, job queue
//! - `entitylocks` – fair all-or-nothing exclusive access per entity
//! - `gateway` – session-affinity check in front of the dispatcher
//! - `registry` – owner of every entity record, id index and factory
//! - `session` – which server owns which client
//! - `simclock` – simulation time source
//! - `simconfig` – physical constants and server settings
pub mod dispatcher;
pub mod entitylocks;
pub mod gateway;
pub mod registry;
pub mod session;
pub mod simclock;
pub mod simconfig;
