//! Transport-independent entry point for client requests.
//!
//! The gateway checks session affinity first and only then hands the request
//! to the dispatcher. A request for a client owned by another server never
//! reaches the dispatcher and so never touches an entity.

use std::sync::Arc;

use crossbeam_channel::{Receiver, bounded};
use log::warn;

use crate::error::SimError;
use crate::events::action::{ActionRequest, ActionResponse};
use crate::resources::dispatcher::Dispatcher;
use crate::resources::session::SessionAffinity;

#[derive(Clone)]
pub struct Gateway {
    affinity: Arc<dyn SessionAffinity>,
    dispatcher: Arc<Dispatcher>,
}

impl Gateway {
    pub fn new(affinity: Arc<dyn SessionAffinity>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            affinity,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Queue `request` and return the channel its reply arrives on.
    pub fn submit(&self, request: ActionRequest) -> Receiver<ActionResponse> {
        if !self.affinity.is_owned_by_this_server(&request.client_id) {
            warn!(
                "Client '{}' is not owned by this server, refusing '{}'",
                request.client_id, request.action
            );
            let (tx, rx) = bounded(1);
            let _ = tx.send(ActionResponse::wrong_server());
            return rx;
        }
        self.dispatcher.submit(request)
    }

    /// Handle `request` and block for its reply.
    pub fn handle(&self, request: ActionRequest) -> ActionResponse {
        self.submit(request)
            .recv()
            .unwrap_or_else(|_| SimError::Shutdown.into())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::components::identity::EntityKind;
    use crate::resources::registry::{EntityOverrides, Registry};
    use crate::resources::session::{LocalSession, SessionDirectory};
    use crate::resources::simclock::ManualClock;
    use crate::resources::simconfig::SimConfig;
    use crate::systems::actions::ActionTable;

    fn gateway() -> (Gateway, LocalSession) {
        gateway_with(Registry::new(SimConfig::new(), Arc::new(ManualClock::new(0))))
    }

    fn gateway_with(registry: Registry) -> (Gateway, LocalSession) {
        let dispatcher = Arc::new(Dispatcher::start(registry, ActionTable::with_builtin()));
        let session = LocalSession::register("alpha", Arc::new(SessionDirectory::new()));
        (Gateway::new(Arc::new(session.clone()), dispatcher), session)
    }

    #[test]
    fn test_wrong_server_is_refused_before_dispatch() {
        let (gateway, _session) = gateway();
        let response = gateway.handle(ActionRequest::new("stranger", "multiply", json!({})));
        assert!(response.is_wrong_server());
        assert_eq!(gateway.dispatcher().executed(), 0);
    }

    #[test]
    fn test_owned_client_is_dispatched() {
        let mut registry = Registry::new(SimConfig::new(), Arc::new(ManualClock::new(0)));
        let ship = registry
            .spawn(EntityKind::Ship, EntityOverrides::default())
            .unwrap();
        let (gateway, session) = gateway_with(registry);
        session.claim("c1");

        let response = gateway.handle(ActionRequest::new("c1", "inspect", json!({ "id": ship })));
        assert!(response.is_ok());
        assert_eq!(response.result().unwrap()["kind"], "ship");

        let response = gateway.handle(ActionRequest::new("c1", "multiply", json!({})));
        assert_eq!(response.error_kind(), Some("UnknownActionError"));
    }

    #[test]
    fn test_submit_wrong_server() {
        let (gateway, _session) = gateway();
        let rx = gateway.submit(ActionRequest::new("stranger", "inspect", json!({"id": "x"})));
        assert!(rx.recv().unwrap().is_wrong_server());
    }
}
