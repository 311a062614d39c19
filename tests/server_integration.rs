//! End-to-end tests over a real TCP socket.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use starhold::resources::dispatcher::Dispatcher;
use starhold::resources::gateway::Gateway;
use starhold::resources::registry::Registry;
use starhold::resources::session::{LocalSession, SessionDirectory};
use starhold::resources::simclock::ManualClock;
use starhold::resources::simconfig::SimConfig;
use starhold::scenario::{DemoScenario, seed_demo};
use starhold::server::{ServerHandle, SimServer};
use starhold::systems::actions::ActionTable;

struct Harness {
    handle: ServerHandle,
    demo: DemoScenario,
    session: LocalSession,
}

fn start(auto_claim: bool) -> Harness {
    let mut registry = Registry::new(SimConfig::new(), Arc::new(ManualClock::new(0)));
    let demo = seed_demo(&mut registry).unwrap();
    let dispatcher = Arc::new(Dispatcher::start(registry, ActionTable::with_builtin()));
    let session = LocalSession::register("test-server", Arc::new(SessionDirectory::new()));
    let gateway = Gateway::new(Arc::new(session.clone()), dispatcher);
    let handle = SimServer::new(gateway, session.clone(), auto_claim)
        .start("127.0.0.1:0")
        .unwrap();
    Harness {
        handle,
        demo,
        session,
    }
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(handle: &ServerHandle) -> Self {
        let stream = TcpStream::connect(handle.local_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn send_line(&mut self, line: &str) -> Option<Value> {
        if writeln!(self.writer, "{}", line).is_err() || self.writer.flush().is_err() {
            return None;
        }
        let mut reply = String::new();
        match self.reader.read_line(&mut reply) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(serde_json::from_str(&reply).unwrap()),
        }
    }

    fn send(&mut self, request: Value) -> Value {
        self.send_line(&request.to_string()).unwrap()
    }
}

#[test]
fn test_inspect_and_transfer_over_tcp() {
    let harness = start(true);
    let mut client = Client::connect(&harness.handle);

    let reply = client.send(json!({
        "clientId": "pilot-1",
        "requestId": "1",
        "action": "inspect",
        "args": { "id": harness.demo.explorer },
    }));
    assert_eq!(reply["requestId"], "1");
    assert_eq!(reply["result"]["name"], "Explorer-1");
    assert!(harness.session.directory().is_connected("test-server", "pilot-1"));

    let reply = client.send(json!({
        "clientId": "pilot-1",
        "action": "transfer_resource",
        "args": {
            "sourceId": harness.demo.explorer,
            "destinationId": harness.demo.cargo_ship,
            "resourceType": "fuel",
            "amount": 30,
        },
    }));
    assert_eq!(reply["result"]["sourceLevel"], 70.0);
    assert_eq!(reply["result"]["destinationLevel"], 50.0);
    // a request id was assigned by the server
    assert!(reply["requestId"].as_str().is_some_and(|id| !id.is_empty()));
}

#[test]
fn test_malformed_line_keeps_connection_open() {
    let harness = start(true);
    let mut client = Client::connect(&harness.handle);

    let reply = client.send_line("this is not json").unwrap();
    assert_eq!(reply["error"]["kind"], "InvalidRequestError");

    let reply = client.send_line(r#"{"clientId":"c1"}"#).unwrap();
    assert_eq!(reply["error"]["kind"], "InvalidRequestError");

    let reply = client.send(json!({
        "clientId": "c1",
        "action": "multiply",
        "args": {"a": 1, "b": 2},
    }));
    assert_eq!(reply["error"]["kind"], "UnknownActionError");
}

#[test]
fn test_unclaimed_client_gets_wrong_server() {
    let harness = start(false);
    let mut client = Client::connect(&harness.handle);

    let reply = client.send(json!({
        "clientId": "stranger",
        "action": "inspect",
        "args": { "id": harness.demo.earth },
    }));
    assert_eq!(reply["wrongServer"], true);
    assert!(reply.get("result").is_none());

    // the server hangs up after a wrong-server reply
    assert!(client.send_line(r#"{"clientId":"stranger","action":"inspect","args":{}}"#).is_none());
}

#[test]
fn test_claimed_client_is_served_without_auto_claim() {
    let harness = start(false);
    harness.session.claim("known");
    let mut client = Client::connect(&harness.handle);

    let reply = client.send(json!({
        "clientId": "known",
        "action": "position",
        "args": { "id": harness.demo.mars },
    }));
    assert_eq!(reply["result"]["position"]["x"], 2.28e11);
}
