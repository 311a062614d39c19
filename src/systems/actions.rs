//! Named action handlers served by the dispatcher.
//!
//! Each handler does two things with the raw JSON arguments of a request:
//! declare which entities it needs exclusive access to, and execute against
//! the registry once that access is held. Argument parsing failures surface
//! as [`SimError::InvalidArguments`] before anything is locked.
//!
//! | action              | arguments                                              | access set                    |
//! |---------------------|--------------------------------------------------------|-------------------------------|
//! | `position`          | `{id}`                                                 | `id`                          |
//! | `inspect`           | `{id}`                                                 | `id`                          |
//! | `transfer_resource` | `{sourceId, destinationId, resourceType, amount}`      | `sourceId`, `destinationId`   |
//! | `stow`              | `{containerId, entityId}`                              | `containerId`, `entityId`     |
//! | `unstow`            | `{containerId, entityId}`                              | `containerId`                 |

use log::debug;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use smallvec::smallvec;

use crate::components::identity::EntityId;
use crate::error::SimError;
use crate::resources::entitylocks::AccessSet;
use crate::resources::registry::Registry;
use crate::systems::motion::advance_to_now;
use crate::systems::storage::{add_inside, remove_inside};
use crate::systems::transfer::{self, TransferOrder, transfer_resource};

pub trait ActionHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entities the action must hold exclusively while it runs.
    fn access_set(&self, args: &Value) -> Result<AccessSet, SimError>;

    fn execute(&self, registry: &mut Registry, args: &Value) -> Result<Value, SimError>;
}

fn parse_args<T: DeserializeOwned>(action: &str, args: &Value) -> Result<T, SimError> {
    T::deserialize(args).map_err(|e| SimError::invalid_args(action, e.to_string()))
}

#[derive(Debug, Deserialize)]
struct TargetArgs {
    id: EntityId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainmentArgs {
    container_id: EntityId,
    entity_id: EntityId,
}

/// Advance an entity to now and report where it is.
pub struct PositionAction;

impl ActionHandler for PositionAction {
    fn name(&self) -> &'static str {
        "position"
    }

    fn access_set(&self, args: &Value) -> Result<AccessSet, SimError> {
        let args: TargetArgs = parse_args(self.name(), args)?;
        Ok(smallvec![args.id])
    }

    fn execute(&self, registry: &mut Registry, args: &Value) -> Result<Value, SimError> {
        let args: TargetArgs = parse_args(self.name(), args)?;
        let position = advance_to_now(registry, &args.id)?;
        Ok(json!({
            "id": args.id,
            "position": position,
            "lastUpdate": registry.last_update(&args.id)?,
        }))
    }
}

/// Full entity record, brought up to date first when it has a position.
pub struct InspectAction;

impl ActionHandler for InspectAction {
    fn name(&self) -> &'static str {
        "inspect"
    }

    fn access_set(&self, args: &Value) -> Result<AccessSet, SimError> {
        let args: TargetArgs = parse_args(self.name(), args)?;
        Ok(smallvec![args.id])
    }

    fn execute(&self, registry: &mut Registry, args: &Value) -> Result<Value, SimError> {
        let args: TargetArgs = parse_args(self.name(), args)?;
        if registry.position(&args.id)?.is_some() {
            advance_to_now(registry, &args.id)?;
        }
        let record = registry.get(&args.id)?;
        serde_json::to_value(record).map_err(|e| SimError::InvalidRequest(e.to_string()))
    }
}

pub struct TransferAction;

impl ActionHandler for TransferAction {
    fn name(&self) -> &'static str {
        transfer::ACTION_NAME
    }

    fn access_set(&self, args: &Value) -> Result<AccessSet, SimError> {
        let order: TransferOrder = parse_args(self.name(), args)?;
        Ok(smallvec![order.source_id, order.destination_id])
    }

    fn execute(&self, registry: &mut Registry, args: &Value) -> Result<Value, SimError> {
        let order: TransferOrder = parse_args(self.name(), args)?;
        let receipt = transfer_resource(registry, &order)?;
        serde_json::to_value(receipt).map_err(|e| SimError::InvalidRequest(e.to_string()))
    }
}

pub struct StowAction;

impl ActionHandler for StowAction {
    fn name(&self) -> &'static str {
        "stow"
    }

    fn access_set(&self, args: &Value) -> Result<AccessSet, SimError> {
        let args: ContainmentArgs = parse_args(self.name(), args)?;
        Ok(smallvec![args.container_id, args.entity_id])
    }

    fn execute(&self, registry: &mut Registry, args: &Value) -> Result<Value, SimError> {
        let args: ContainmentArgs = parse_args(self.name(), args)?;
        let stowed = add_inside(registry, &args.container_id, &args.entity_id)?;
        Ok(json!({ "stowed": stowed }))
    }
}

pub struct UnstowAction;

impl ActionHandler for UnstowAction {
    fn name(&self) -> &'static str {
        "unstow"
    }

    fn access_set(&self, args: &Value) -> Result<AccessSet, SimError> {
        let args: ContainmentArgs = parse_args(self.name(), args)?;
        Ok(smallvec![args.container_id])
    }

    fn execute(&self, registry: &mut Registry, args: &Value) -> Result<Value, SimError> {
        let args: ContainmentArgs = parse_args(self.name(), args)?;
        let removed = remove_inside(registry, &args.container_id, &args.entity_id)?;
        Ok(json!({ "removed": removed }))
    }
}

/// Lookup table from action name to handler.
#[derive(Default)]
pub struct ActionTable {
    handlers: FxHashMap<&'static str, Box<dyn ActionHandler>>,
}

impl ActionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding every built-in action.
    pub fn with_builtin() -> Self {
        let mut table = Self::new();
        table.register(PositionAction);
        table.register(InspectAction);
        table.register(TransferAction);
        table.register(StowAction);
        table.register(UnstowAction);
        table
    }

    /// Add a handler, replacing any previous one with the same name.
    pub fn register(&mut self, handler: impl ActionHandler + 'static) {
        debug!("Registered action '{}'", handler.name());
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn get(&self, name: &str) -> Result<&dyn ActionHandler, SimError> {
        self.handlers
            .get(name)
            .map(|h| h.as_ref())
            .ok_or_else(|| SimError::UnknownAction(name.to_string()))
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
