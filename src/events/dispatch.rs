use crossbeam_channel::Sender;
use serde_json::Value;

use crate::events::action::{ActionResponse, RequestKey};
use crate::resources::entitylocks::{AccessSet, Ticket};

/// Commands sent *to* the dispatcher workers
#[derive(Debug)]
pub enum DispatchCmd {
    Run(Job),
    Shutdown,
}

/// One accepted request, already holding its place in the access queues.
#[derive(Debug)]
pub struct Job {
    pub key: Option<RequestKey>,
    pub action: String,
    pub args: Value,
    pub access: AccessSet,
    pub ticket: Ticket,
    pub reply: Sender<ActionResponse>,
}
