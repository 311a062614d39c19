//! Dispatcher worker loop.
//!
//! - [`dispatch_worker`] runs on each pool thread and processes
//!   [`DispatchCmd`](crate::events::dispatch::DispatchCmd) messages until it
//!   receives `Shutdown` or the channel closes.
//! - [`run_job`] waits for the job's exclusive access, executes the action
//!   with the registry locked and fans the reply out to the original
//!   submitter and every duplicate that joined while it ran.
//!
//! Waiting for access blocks only the worker thread doing the wait.
//!
//! See also: [`crate::resources::dispatcher`].

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam_channel::Receiver;
use log::{debug, info, warn};

use crate::events::action::ActionResponse;
use crate::events::dispatch::{DispatchCmd, Job};
use crate::resources::dispatcher::DispatchShared;

/// Entry point of a dispatcher worker thread.
pub(crate) fn dispatch_worker(
    worker: usize,
    shared: Arc<DispatchShared>,
    rx_cmd: Receiver<DispatchCmd>,
) {
    debug!("Dispatch worker {} running", worker);
    loop {
        match rx_cmd.recv() {
            Ok(DispatchCmd::Run(job)) => run_job(&shared, job),
            Ok(DispatchCmd::Shutdown) => {
                debug!("Dispatch worker {} shutting down", worker);
                break;
            }
            Err(_) => {
                info!("Dispatch channel closed, worker {} exiting", worker);
                break;
            }
        }
    }
}

/// Execute one job and deliver its reply.
pub(crate) fn run_job(shared: &DispatchShared, job: Job) {
    let response: ActionResponse = match shared.locks.wait(job.ticket, shared.lock_timeout) {
        Ok(_guard) => {
            let outcome = shared.actions.get(&job.action).and_then(|handler| {
                let mut registry = shared.registry.lock();
                handler.execute(&mut registry, &job.args)
            });
            shared.executed.fetch_add(1, Ordering::Relaxed);
            if let Err(err) = &outcome {
                debug!("Action '{}' on {:?} failed: {}", job.action, job.access, err);
            }
            outcome.into()
        }
        Err(err) => {
            warn!("Action '{}' not run: {}", job.action, err);
            err.into()
        }
    };

    // Once the entry is gone, a repeat of this request runs as a new one.
    let duplicates = match &job.key {
        Some(key) => shared.inflight.lock().waiters.remove(key).unwrap_or_default(),
        None => Vec::new(),
    };
    for waiter in duplicates {
        let _ = waiter.send(response.clone());
    }
    // The submitter may have disconnected; the action has run regardless.
    let _ = job.reply.send(response);
}
