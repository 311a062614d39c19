//! Messages exchanged between clients, the gateway and the dispatcher.
//!
//! Submodules:
//! - [`action`] – client requests and the three response shapes
//! - [`dispatch`] – commands for the dispatcher worker threads
pub mod action;
pub mod dispatch;
