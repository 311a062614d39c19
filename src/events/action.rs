//! Request and response messages exchanged with clients.
//!
//! A request names an action and carries its arguments as free-form JSON;
//! the action table parses them into typed structs. The response is one of
//! three shapes:
//!
//! ```json
//! { "result": { ... } }
//! { "error": { "kind": "ProximityError", "message": "..." } }
//! { "wrongServer": true }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SimError;

/// One client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub client_id: String,
    /// Client-assigned id used to collapse duplicate submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub args: Value,
}

impl ActionRequest {
    pub fn new(client_id: impl Into<String>, action: impl Into<String>, args: Value) -> Self {
        Self {
            client_id: client_id.into(),
            request_id: None,
            action: action.into(),
            args,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// De-duplication key, `None` for requests without a request id.
    pub fn key(&self) -> Option<RequestKey> {
        self.request_id.as_ref().map(|request_id| RequestKey {
            client_id: self.client_id.clone(),
            request_id: request_id.clone(),
        })
    }
}

/// Identity of a request for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub client_id: String,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&SimError> for ErrorBody {
    fn from(err: &SimError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Reply sent back for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResponse {
    Result {
        result: Value,
    },
    Error {
        error: ErrorBody,
    },
    WrongServer {
        #[serde(rename = "wrongServer")]
        wrong_server: bool,
    },
}

impl ActionResponse {
    pub fn ok(result: Value) -> Self {
        ActionResponse::Result { result }
    }

    pub fn wrong_server() -> Self {
        ActionResponse::WrongServer { wrong_server: true }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ActionResponse::Result { .. })
    }

    pub fn is_wrong_server(&self) -> bool {
        matches!(self, ActionResponse::WrongServer { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            ActionResponse::Result { result } => Some(result),
            _ => None,
        }
    }

    /// Wire name of the error kind, if this is an error reply.
    pub fn error_kind(&self) -> Option<&str> {
        match self {
            ActionResponse::Error { error } => Some(error.kind.as_str()),
            _ => None,
        }
    }
}

impl From<SimError> for ActionResponse {
    fn from(err: SimError) -> Self {
        ActionResponse::Error {
            error: ErrorBody::from(&err),
        }
    }
}

impl From<Result<Value, SimError>> for ActionResponse {
    fn from(outcome: Result<Value, SimError>) -> Self {
        match outcome {
            Ok(result) => ActionResponse::ok(result),
            Err(err) => err.into(),
        }
    }
}
