//! Session affinity: which server owns which client.
//!
//! A client's session lives on exactly one server. Requests reaching any
//! other server are answered with `{ "wrongServer": true }` so the client can
//! reconnect elsewhere.
//!
//! # How It Works
//!
//! 1. At startup a server registers itself in a [`SessionDirectory`] under its
//!    server id (`register_server`).
//! 2. Client ids are attached to a server with `connect_client` and detached
//!    with `disconnect_client`.
//! 3. A [`LocalSession`] answers [`SessionAffinity::is_owned_by_this_server`]
//!    for one server id by looking the client up in the directory.
//! 4. On shutdown the server removes itself (`remove_server`), dropping all of
//!    its clients.
//!
//! The directory is in-memory and may be shared between several servers in
//! one process.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

/// Ownership check consulted before any request is dispatched.
pub trait SessionAffinity: Send + Sync {
    fn is_owned_by_this_server(&self, client_id: &str) -> bool;
}

/// `server-<unix millis>-<0..1000>`
pub fn generate_server_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("server-{}-{}", millis, fastrand::u32(..1000))
}

/// Running servers and the clients connected to each.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    servers: RwLock<FxHashMap<String, FxHashSet<String>>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server with no clients. Returns false if it was already present.
    pub fn register_server(&self, server_id: &str) -> bool {
        let mut servers = self.servers.write();
        if servers.contains_key(server_id) {
            return false;
        }
        servers.insert(server_id.to_string(), FxHashSet::default());
        info!("Server '{}' registered", server_id);
        true
    }

    /// Remove a server and forget all of its clients.
    pub fn remove_server(&self, server_id: &str) -> bool {
        let removed = self.servers.write().remove(server_id);
        if let Some(clients) = &removed {
            info!(
                "Server '{}' removed with {} connected clients",
                server_id,
                clients.len()
            );
        }
        removed.is_some()
    }

    /// Attach `client_id` to `server_id`, detaching it from any other server.
    ///
    /// Returns false if the server is not registered.
    pub fn connect_client(&self, server_id: &str, client_id: &str) -> bool {
        let mut servers = self.servers.write();
        if !servers.contains_key(server_id) {
            return false;
        }
        for (id, clients) in servers.iter_mut() {
            if id != server_id && clients.remove(client_id) {
                debug!("Client '{}' moved away from '{}'", client_id, id);
            }
        }
        if let Some(clients) = servers.get_mut(server_id) {
            clients.insert(client_id.to_string());
        }
        debug!("Client '{}' connected to '{}'", client_id, server_id);
        true
    }

    pub fn disconnect_client(&self, server_id: &str, client_id: &str) -> bool {
        self.servers
            .write()
            .get_mut(server_id)
            .is_some_and(|clients| clients.remove(client_id))
    }

    pub fn is_connected(&self, server_id: &str, client_id: &str) -> bool {
        self.servers
            .read()
            .get(server_id)
            .is_some_and(|clients| clients.contains(client_id))
    }

    /// Server currently owning `client_id`, if any.
    pub fn owner_of(&self, client_id: &str) -> Option<String> {
        self.servers
            .read()
            .iter()
            .find(|(_, clients)| clients.contains(client_id))
            .map(|(id, _)| id.clone())
    }

    pub fn server_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.servers.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// The directory as seen from one server.
#[derive(Debug, Clone)]
pub struct LocalSession {
    server_id: String,
    directory: Arc<SessionDirectory>,
}

impl LocalSession {
    /// Register `server_id` in `directory` and return its view.
    pub fn register(server_id: impl Into<String>, directory: Arc<SessionDirectory>) -> Self {
        let server_id = server_id.into();
        directory.register_server(&server_id);
        Self {
            server_id,
            directory,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn directory(&self) -> &Arc<SessionDirectory> {
        &self.directory
    }

    pub fn connect(&self, client_id: &str) -> bool {
        self.directory.connect_client(&self.server_id, client_id)
    }

    pub fn disconnect(&self, client_id: &str) -> bool {
        self.directory.disconnect_client(&self.server_id, client_id)
    }

    /// Claim `client_id` unless another server already owns it.
    pub fn claim(&self, client_id: &str) -> bool {
        match self.directory.owner_of(client_id) {
            Some(owner) => owner == self.server_id,
            None => self.connect(client_id),
        }
    }

    /// Remove this server from the directory.
    pub fn deregister(&self) -> bool {
        self.directory.remove_server(&self.server_id)
    }
}

impl SessionAffinity for LocalSession {
    fn is_owned_by_this_server(&self, client_id: &str) -> bool {
        self.directory.is_connected(&self.server_id, client_id)
    }
}
