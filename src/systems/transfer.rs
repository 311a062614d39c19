//! Resource transfer between two nearby entities.
//!
//! The caller must already hold exclusive access to both entities (the
//! dispatcher does this for the `transfer_resource` action). Within that
//! window the transfer:
//! 1. advances both entities to the registry's "now";
//! 2. refuses if they are farther apart than the proximity threshold;
//! 3. refuses if the source holds less than the requested amount;
//! 4. debits the source once and credits the destination once.
//!
//! Every check runs before the first mutation, so a refused transfer leaves
//! both holdings untouched.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::components::cargo::Cargo;
use crate::components::identity::EntityId;
use crate::error::SimError;
use crate::resources::registry::Registry;
use crate::systems::motion::advance;

pub const ACTION_NAME: &str = "transfer_resource";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOrder {
    pub source_id: EntityId,
    pub destination_id: EntityId,
    pub resource_type: String,
    pub amount: f64,
}

impl TransferOrder {
    pub fn new(
        source_id: impl Into<EntityId>,
        destination_id: impl Into<EntityId>,
        resource_type: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            resource_type: resource_type.into(),
            amount,
        }
    }

    fn validate(&self) -> Result<(), SimError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(SimError::invalid_args(
                ACTION_NAME,
                format!("amount must be positive and finite, got {}", self.amount),
            ));
        }
        if self.source_id == self.destination_id {
            return Err(SimError::invalid_args(
                ACTION_NAME,
                "source and destination must differ",
            ));
        }
        if self.resource_type.is_empty() {
            return Err(SimError::invalid_args(ACTION_NAME, "resourceType is empty"));
        }
        Ok(())
    }
}

/// Resulting balances after a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub source_id: EntityId,
    pub destination_id: EntityId,
    pub resource_type: String,
    pub amount: f64,
    pub source_level: f64,
    pub destination_level: f64,
    pub distance: f64,
}

/// Execute `order` against the registry.
pub fn transfer_resource(
    registry: &mut Registry,
    order: &TransferOrder,
) -> Result<TransferReceipt, SimError> {
    order.validate()?;
    let source = registry.entity(&order.source_id)?;
    let destination = registry.entity(&order.destination_id)?;

    let now = registry.now();
    let source_pos = advance(registry, &order.source_id, now)?;
    let destination_pos = advance(registry, &order.destination_id, now)?;

    let distance = source_pos.distance(destination_pos);
    let limit = registry.config().proximity;
    if distance > limit {
        debug!(
            "Transfer refused: '{}' and '{}' are {} apart",
            order.source_id, order.destination_id, distance
        );
        return Err(SimError::Proximity {
            source_id: order.source_id.clone(),
            destination: order.destination_id.clone(),
            distance,
            limit,
        });
    }

    let world = registry.world_mut();
    let available = world
        .get::<Cargo>(source)
        .map(|c| c.get(&order.resource_type))
        .ok_or_else(|| SimError::NotFound(order.source_id.clone()))?;
    if world.get::<Cargo>(destination).is_none() {
        return Err(SimError::NotFound(order.destination_id.clone()));
    }

    let insufficient = || SimError::InsufficientResource {
        id: order.source_id.clone(),
        resource: order.resource_type.clone(),
        available,
        requested: order.amount,
    };
    if available < order.amount {
        return Err(insufficient());
    }

    let source_level = world
        .get_mut::<Cargo>(source)
        .and_then(|mut c| c.debit(&order.resource_type, order.amount))
        .ok_or_else(insufficient)?;
    let destination_level = world
        .get_mut::<Cargo>(destination)
        .map(|mut c| c.credit(&order.resource_type, order.amount))
        .ok_or_else(|| SimError::NotFound(order.destination_id.clone()))?;

    info!(
        "Transferred {} {} from '{}' to '{}'",
        order.amount, order.resource_type, order.source_id, order.destination_id
    );

    Ok(TransferReceipt {
        source_id: order.source_id.clone(),
        destination_id: order.destination_id.clone(),
        resource_type: order.resource_type.clone(),
        amount: order.amount,
        source_level,
        destination_level,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::components::identity::EntityKind;
    use crate::math::Vec3;
    use crate::resources::registry::EntityOverrides;
    use crate::resources::simclock::ManualClock;
    use crate::resources::simconfig::SimConfig;

    fn registry() -> Registry {
        Registry::new(SimConfig::new(), Arc::new(ManualClock::new(0)))
    }

    fn ship_at(reg: &mut Registry, x: f64, fuel: f64) -> EntityId {
        reg.spawn(
            EntityKind::Ship,
            EntityOverrides::default()
                .position(Vec3::new(x, 0.0, 0.0))
                .resource("fuel", fuel),
        )
        .unwrap()
    }

    #[test]
    fn test_transfer_moves_exact_amount() {
        let mut reg = registry();
        let a = ship_at(&mut reg, 0.0, 100.0);
        let b = ship_at(&mut reg, 500.0, 0.0);

        let receipt =
            transfer_resource(&mut reg, &TransferOrder::new(a.clone(), b.clone(), "fuel", 30.0))
                .unwrap();
        assert_eq!(receipt.source_level, 70.0);
        assert_eq!(receipt.destination_level, 30.0);
        assert_eq!(receipt.distance, 500.0);
        assert_eq!(reg.resource_level(&a, "fuel").unwrap(), 70.0);
        assert_eq!(reg.resource_level(&b, "fuel").unwrap(), 30.0);
    }

    #[test]
    fn test_insufficient_balance() {
        let mut reg = registry();
        let a = ship_at(&mut reg, 0.0, 70.0);
        let b = ship_at(&mut reg, 500.0, 30.0);

        let err =
            transfer_resource(&mut reg, &TransferOrder::new(a.clone(), b.clone(), "fuel", 80.0))
                .unwrap_err();
        assert_eq!(err.kind(), "InsufficientResourceError");
        assert_eq!(reg.resource_level(&a, "fuel").unwrap(), 70.0);
        assert_eq!(reg.resource_level(&b, "fuel").unwrap(), 30.0);
    }

    #[test]
    fn test_too_far_apart() {
        let mut reg = registry();
        let a = ship_at(&mut reg, 0.0, 100.0);
        let b = ship_at(&mut reg, 2000.5, 0.0);

        let err =
            transfer_resource(&mut reg, &TransferOrder::new(a.clone(), b.clone(), "fuel", 1.0))
                .unwrap_err();
        assert!(matches!(err, SimError::Proximity { limit, .. } if limit == 2000.0));
        assert_eq!(reg.resource_level(&a, "fuel").unwrap(), 100.0);
        assert_eq!(reg.resource_level(&b, "fuel").unwrap(), 0.0);
    }

    #[test]
    fn test_exactly_at_threshold_is_allowed() {
        let mut reg = registry();
        let a = ship_at(&mut reg, 0.0, 10.0);
        let b = ship_at(&mut reg, 2000.0, 0.0);
        assert!(transfer_resource(&mut reg, &TransferOrder::new(a, b, "fuel", 10.0)).is_ok());
    }

    #[test]
    fn test_invalid_orders() {
        let mut reg = registry();
        let a = ship_at(&mut reg, 0.0, 10.0);
        let b = ship_at(&mut reg, 10.0, 0.0);

        for order in [
            TransferOrder::new(a.clone(), b.clone(), "fuel", 0.0),
            TransferOrder::new(a.clone(), b.clone(), "fuel", -5.0),
            TransferOrder::new(a.clone(), b.clone(), "fuel", f64::NAN),
            TransferOrder::new(a.clone(), a.clone(), "fuel", 1.0),
            TransferOrder::new(a.clone(), b.clone(), "", 1.0),
        ] {
            let err = transfer_resource(&mut reg, &order).unwrap_err();
            assert_eq!(err.kind(), "InvalidArgumentsError");
        }
        assert_eq!(reg.resource_level(&a, "fuel").unwrap(), 10.0);
    }

    #[test]
    fn test_unknown_destination() {
        let mut reg = registry();
        let a = ship_at(&mut reg, 0.0, 10.0);
        let ghost = EntityId::from("ship-0-000000");
        let err = transfer_resource(&mut reg, &TransferOrder::new(a, ghost.clone(), "fuel", 1.0))
            .unwrap_err();
        assert_eq!(err, SimError::NotFound(ghost));
    }

    #[test]
    fn test_component_cannot_trade() {
        let mut reg = registry();
        let a = ship_at(&mut reg, 0.0, 10.0);
        let part = reg
            .spawn(EntityKind::ShipComponent, EntityOverrides::default())
            .unwrap();
        let err = transfer_resource(&mut reg, &TransferOrder::new(a.clone(), part, "fuel", 1.0))
            .unwrap_err();
        assert_eq!(err.kind(), "NoPositionError");
        assert_eq!(reg.resource_level(&a, "fuel").unwrap(), 10.0);
    }
}
