//! TCP server speaking newline-delimited JSON.
//!
//! Each connection is served by its own thread. A connection sends one
//! [`ActionRequest`] per line and receives one response per line, in order:
//!
//! ```text
//! -> {"clientId":"c1","requestId":"1","action":"position","args":{"id":"ship-3-a1b2c3"}}
//! <- {"requestId":"1","result":{"id":"ship-3-a1b2c3","position":{"x":0,"y":0,"z":0},"lastUpdate":120}}
//! ```
//!
//! Lines that are not a valid request get an `InvalidRequestError` reply and
//! the connection stays open. A `wrongServer` reply closes the connection.
//! Requests without a `requestId` get one derived from the peer address and a
//! per-connection sequence number.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::error::SimError;
use crate::events::action::{ActionRequest, ActionResponse};
use crate::resources::gateway::Gateway;
use crate::resources::session::LocalSession;

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Handle to a running server.
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// Stop accepting connections. Open connections are served until the
    /// peer closes them.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the accept loop to finish.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct SimServer {
    gateway: Gateway,
    session: LocalSession,
    auto_claim: bool,
}

impl SimServer {
    pub fn new(gateway: Gateway, session: LocalSession, auto_claim: bool) -> Self {
        Self {
            gateway,
            session,
            auto_claim,
        }
    }

    /// Bind `addr` and serve it from a background thread.
    pub fn start(self, addr: &str) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        info!(
            "Server listening on {} with server ID: {}",
            local_addr,
            self.session.server_id()
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let thread = thread::Builder::new()
            .name("accept".into())
            .spawn(move || self.accept_loop(listener, shutdown_clone))?;

        Ok(ServerHandle {
            shutdown,
            thread: Some(thread),
            local_addr,
        })
    }

    fn accept_loop(self, listener: TcpListener, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    info!("Client connected from {}", peer);
                    let connection = Connection {
                        gateway: self.gateway.clone(),
                        session: self.session.clone(),
                        auto_claim: self.auto_claim,
                        peer,
                    };
                    thread::spawn(move || {
                        if let Err(e) = connection.serve(stream) {
                            debug!("Client {} dropped: {}", peer, e);
                        }
                    });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                    break;
                }
            }
        }
        info!("Server on {} stopped accepting", self.session.server_id());
    }
}

struct Connection {
    gateway: Gateway,
    session: LocalSession,
    auto_claim: bool,
    peer: SocketAddr,
}

impl Connection {
    fn serve(&self, stream: TcpStream) -> io::Result<()> {
        let mut claimed: FxHashSet<String> = FxHashSet::default();
        let outcome = self.exchange(stream, &mut claimed);
        // Dropping the connection releases its claims; in-flight work continues.
        for client_id in &claimed {
            self.session.disconnect(client_id);
        }
        info!("Client {} disconnected", self.peer);
        outcome
    }

    fn exchange(&self, stream: TcpStream, claimed: &mut FxHashSet<String>) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        let reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;
        let mut sequence: u64 = 0;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            sequence += 1;

            let (request_id, response) = match serde_json::from_str::<ActionRequest>(&line) {
                Ok(mut request) => {
                    if self.auto_claim
                        && !claimed.contains(&request.client_id)
                        && self.session.claim(&request.client_id)
                    {
                        claimed.insert(request.client_id.clone());
                    }
                    let request_id = request
                        .request_id
                        .get_or_insert_with(|| format!("{}#{}", self.peer, sequence))
                        .clone();
                    (Some(request_id), self.gateway.handle(request))
                }
                Err(e) => {
                    warn!("Malformed request from {}: {}", self.peer, e);
                    (None, SimError::InvalidRequest(e.to_string()).into())
                }
            };

            writeln!(writer, "{}", encode_reply(request_id.as_deref(), &response)?)?;
            writer.flush()?;
            if response.is_wrong_server() {
                break;
            }
        }
        Ok(())
    }
}

/// One response line, carrying the request id when known.
pub fn encode_reply(request_id: Option<&str>, response: &ActionResponse) -> io::Result<String> {
    let mut value = serde_json::to_value(response)?;
    if let (Some(id), Some(fields)) = (request_id, value.as_object_mut()) {
        fields.insert("requestId".into(), Value::from(id));
    }
    Ok(serde_json::to_string(&value)?)
}
