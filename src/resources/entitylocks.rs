//! Per-entity exclusive access with FIFO fairness.
//!
//! Every entity id has a queue of tickets. A request that needs several
//! entities takes one ticket and joins the queue of each of them in a single
//! step; it is granted access once its ticket is at the head of all of those
//! queues. Because tickets are issued in one global order, the oldest
//! outstanding ticket is always at the head of every queue it joined, which
//! rules out deadlock and starvation: requests for the same entity are served
//! strictly in ticket order, and a request holding one entity never blocks
//! waiting for another.
//!
//! Access is all-or-nothing. A request never holds some of its entities while
//! waiting for the rest.
//!
//! ```ignore
//! let locks = EntityLocks::new();
//! let guard = locks.acquire(&[ship.clone(), station.clone()], None)?;
//! // ... mutate both entities ...
//! drop(guard); // releases both and wakes the next waiters
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::components::identity::EntityId;
use crate::error::SimError;

/// Position in the global access order.
pub type Ticket = u64;

pub type AccessSet = SmallVec<[EntityId; 2]>;

#[derive(Default)]
struct LockTable {
    next_ticket: Ticket,
    queues: FxHashMap<EntityId, VecDeque<Ticket>>,
    members: FxHashMap<Ticket, AccessSet>,
}

impl LockTable {
    fn is_granted(&self, ticket: Ticket) -> bool {
        let Some(ids) = self.members.get(&ticket) else {
            return false;
        };
        ids.iter().all(|id| {
            self.queues
                .get(id)
                .and_then(|queue| queue.front())
                .is_some_and(|front| *front == ticket)
        })
    }

    fn withdraw(&mut self, ticket: Ticket) -> Option<AccessSet> {
        let ids = self.members.remove(&ticket)?;
        for id in &ids {
            if let Some(queue) = self.queues.get_mut(id) {
                queue.retain(|t| *t != ticket);
                if queue.is_empty() {
                    self.queues.remove(id);
                }
            }
        }
        Some(ids)
    }
}

/// Table of per-entity access queues.
#[derive(Default)]
pub struct EntityLocks {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a ticket for `ids` and join the queue of each of them.
    ///
    /// Duplicated ids are collapsed. The ticket must later be passed to
    /// [`EntityLocks::wait`] or [`EntityLocks::cancel`].
    pub fn enqueue(&self, ids: &[EntityId]) -> Ticket {
        let mut set: AccessSet = ids.iter().cloned().collect();
        set.sort();
        set.dedup();

        let mut table = self.table.lock();
        let ticket = table.next_ticket;
        table.next_ticket += 1;
        for id in &set {
            table.queues.entry(id.clone()).or_default().push_back(ticket);
        }
        table.members.insert(ticket, set);
        ticket
    }

    /// Block until `ticket` reaches the head of all its queues.
    ///
    /// With a timeout, gives up after that long, leaves every queue and fails
    /// with [`SimError::LockTimeout`]; nothing is held in that case.
    pub fn wait(
        &self,
        ticket: Ticket,
        timeout: Option<Duration>,
    ) -> Result<AccessGuard<'_>, SimError> {
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let mut table = self.table.lock();

        if !table.members.contains_key(&ticket) {
            return Err(SimError::InvalidRequest(format!(
                "ticket {} is not queued",
                ticket
            )));
        }

        while !table.is_granted(ticket) {
            match deadline {
                Some(deadline) => {
                    if self.released.wait_until(&mut table, deadline).timed_out()
                        && !table.is_granted(ticket)
                    {
                        let ids = table.withdraw(ticket).unwrap_or_default();
                        drop(table);
                        self.released.notify_all();
                        let waited_ms = started.elapsed().as_millis() as u64;
                        warn!("Gave up waiting for {:?} after {} ms", ids, waited_ms);
                        return Err(SimError::LockTimeout {
                            ids: ids.into_vec(),
                            waited_ms,
                        });
                    }
                }
                None => self.released.wait(&mut table),
            }
        }

        Ok(AccessGuard {
            locks: self,
            ticket,
        })
    }

    /// Enqueue and wait in one call.
    pub fn acquire(
        &self,
        ids: &[EntityId],
        timeout: Option<Duration>,
    ) -> Result<AccessGuard<'_>, SimError> {
        let ticket = self.enqueue(ids);
        self.wait(ticket, timeout)
    }

    /// Leave all queues without ever having been granted.
    pub fn cancel(&self, ticket: Ticket) {
        self.release(ticket);
    }

    /// Number of tickets queued (granted or waiting) on `id`.
    pub fn queued(&self, id: &EntityId) -> usize {
        self.table.lock().queues.get(id).map_or(0, VecDeque::len)
    }

    /// True when no entity has any queued ticket.
    pub fn is_idle(&self) -> bool {
        self.table.lock().queues.is_empty()
    }

    fn release(&self, ticket: Ticket) {
        let released = self.table.lock().withdraw(ticket);
        if let Some(ids) = released {
            debug!("Released ticket {} on {:?}", ticket, ids);
            self.released.notify_all();
        }
    }
}

/// Exclusive access to a set of entities; released on drop.
pub struct AccessGuard<'a> {
    locks: &'a EntityLocks,
    ticket: Ticket,
}

impl AccessGuard<'_> {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(self.ticket);
    }
}
