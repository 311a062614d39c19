//! Bridge between request handling threads and the dispatcher worker pool.
//!
//! Use [`Dispatcher::start`] once to spawn the workers around a registry. Any
//! thread may then call [`Dispatcher::submit`] (non-blocking, returns a reply
//! channel) or [`Dispatcher::dispatch`] (blocks for the reply). Call
//! [`Dispatcher::shutdown`] during teardown; jobs already queued still run
//! before the workers exit. Dropping the dispatcher does the same.
//!
//! Submission does three things under one mutex so their order agrees:
//! collapse duplicates of an in-flight `(clientId, requestId)`, take an
//! access ticket from [`EntityLocks`], and queue the job. Workers pick jobs
//! in queue order, so the oldest outstanding ticket is always held by a
//! worker and the pool cannot stall on later tickets.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::SimError;
use crate::events::action::{ActionRequest, ActionResponse, RequestKey};
use crate::events::dispatch::{DispatchCmd, Job};
use crate::resources::entitylocks::EntityLocks;
use crate::resources::registry::Registry;
use crate::systems::actions::ActionTable;
use crate::systems::dispatch::dispatch_worker;

#[derive(Default)]
pub(crate) struct Inflight {
    pub(crate) closed: bool,
    /// Extra reply channels for duplicates of a running request.
    pub(crate) waiters: FxHashMap<RequestKey, Vec<Sender<ActionResponse>>>,
}

/// State shared by the submitting side and every worker.
pub(crate) struct DispatchShared {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) locks: EntityLocks,
    pub(crate) actions: ActionTable,
    pub(crate) inflight: Mutex<Inflight>,
    pub(crate) lock_timeout: Option<Duration>,
    pub(crate) executed: AtomicU64,
}

pub struct Dispatcher {
    shared: Arc<DispatchShared>,
    tx_cmd: Sender<DispatchCmd>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn `actions.workers` worker threads serving `actions` against
    /// `registry`.
    pub fn start(registry: Registry, actions: ActionTable) -> Self {
        let config = registry.config();
        let worker_count = config.workers.max(1);
        let lock_timeout = config.lock_timeout();

        let shared = Arc::new(DispatchShared {
            registry: Mutex::new(registry),
            locks: EntityLocks::new(),
            actions,
            inflight: Mutex::new(Inflight::default()),
            lock_timeout,
            executed: AtomicU64::new(0),
        });
        let (tx_cmd, rx_cmd) = unbounded::<DispatchCmd>();

        let workers = (0..worker_count)
            .map(|n| {
                let shared = Arc::clone(&shared);
                let rx_cmd = rx_cmd.clone();
                std::thread::Builder::new()
                    .name(format!("dispatch-{}", n))
                    .spawn(move || dispatch_worker(n, shared, rx_cmd))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Failed to spawn dispatch worker: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();

        info!(
            "Dispatcher started with {} workers (actions: {:?})",
            workers.len(),
            shared.actions.names()
        );

        Self {
            shared,
            tx_cmd,
            workers,
        }
    }

    /// Queue a request and return the channel its reply arrives on.
    ///
    /// Unknown actions and unparseable arguments are answered immediately
    /// without touching any entity.
    pub fn submit(&self, request: ActionRequest) -> Receiver<ActionResponse> {
        let (reply, rx) = bounded::<ActionResponse>(1);
        let key = request.key();

        let prepared = self.shared.actions.get(&request.action).and_then(|handler| {
            handler.access_set(&request.args)
        });

        let mut inflight = self.shared.inflight.lock();
        if inflight.closed {
            let _ = reply.send(SimError::Shutdown.into());
            return rx;
        }
        if let Some(waiters) = key.as_ref().and_then(|k| inflight.waiters.get_mut(k)) {
            debug!(
                "Request '{}' from '{}' already in flight, waiting for its result",
                request.request_id.as_deref().unwrap_or_default(),
                request.client_id
            );
            waiters.push(reply);
            return rx;
        }

        let access = match prepared {
            Ok(access) => access,
            Err(err) => {
                debug!("Refused '{}' from '{}': {}", request.action, request.client_id, err);
                let _ = reply.send(err.into());
                return rx;
            }
        };

        let ticket = self.shared.locks.enqueue(&access);
        let job = Job {
            key: key.clone(),
            action: request.action,
            args: request.args,
            access,
            ticket,
            reply,
        };
        match self.tx_cmd.send(DispatchCmd::Run(job)) {
            Ok(()) => {
                if let Some(key) = key {
                    inflight.waiters.insert(key, Vec::new());
                }
            }
            Err(returned) => {
                self.shared.locks.cancel(ticket);
                if let DispatchCmd::Run(job) = returned.0 {
                    let _ = job.reply.send(SimError::Shutdown.into());
                }
            }
        }
        rx
    }

    /// Submit and block until the reply arrives.
    pub fn dispatch(&self, request: ActionRequest) -> ActionResponse {
        self.submit(request)
            .recv()
            .unwrap_or_else(|_| SimError::Shutdown.into())
    }

    /// Read the registry between actions.
    ///
    /// Mutation goes through actions only; seed the registry before
    /// [`Dispatcher::start`].
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        let registry = self.shared.registry.lock();
        f(&registry)
    }

    pub fn locks(&self) -> &EntityLocks {
        &self.shared.locks
    }

    /// Number of actions executed so far (duplicates not counted).
    pub fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Relaxed)
    }

    /// Number of keyed requests currently running or queued.
    pub fn in_flight(&self) -> usize {
        self.shared.inflight.lock().waiters.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting requests, let queued jobs finish and join the workers.
    pub fn shutdown(&mut self) {
        {
            let mut inflight = self.shared.inflight.lock();
            if inflight.closed {
                return;
            }
            inflight.closed = true;
            for _ in 0..self.workers.len() {
                let _ = self.tx_cmd.send(DispatchCmd::Shutdown);
            }
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!("Dispatcher stopped after {} actions", self.executed());
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
