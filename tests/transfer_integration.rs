//! Resource transfer through the dispatcher: the documented fuel example,
//! refusals without mutation, conservation and concurrent credits.

use std::sync::Arc;
use std::thread;

use serde_json::json;

use starhold::components::identity::{EntityId, EntityKind};
use starhold::events::action::{ActionRequest, ActionResponse};
use starhold::math::Vec3;
use starhold::resources::dispatcher::Dispatcher;
use starhold::resources::registry::{EntityOverrides, Registry};
use starhold::resources::simclock::ManualClock;
use starhold::resources::simconfig::SimConfig;
use starhold::systems::actions::ActionTable;

fn registry() -> Registry {
    Registry::new(SimConfig::new(), Arc::new(ManualClock::new(0)))
}

fn start(registry: Registry) -> Dispatcher {
    Dispatcher::start(registry, ActionTable::with_builtin())
}

fn ship(registry: &mut Registry, x: f64, y: f64, fuel: f64) -> EntityId {
    registry
        .spawn(
            EntityKind::Ship,
            EntityOverrides::default()
                .position(Vec3::new(x, y, 0.0))
                .resource("fuel", fuel),
        )
        .unwrap()
}

fn fuel(dispatcher: &Dispatcher, id: &EntityId) -> f64 {
    dispatcher.with_registry(|reg| reg.resource_level(id, "fuel").unwrap())
}

fn transfer(from: &EntityId, to: &EntityId, amount: f64) -> ActionRequest {
    ActionRequest::new(
        "pilot",
        "transfer_resource",
        json!({
            "sourceId": from,
            "destinationId": to,
            "resourceType": "fuel",
            "amount": amount,
        }),
    )
}

// ==================== DOCUMENTED EXAMPLE ====================

#[test]
fn test_fuel_example() {
    let mut reg = registry();
    let a = ship(&mut reg, 0.0, 0.0, 100.0);
    let b = ship(&mut reg, 500.0, 0.0, 0.0);
    let d = start(reg);

    let response = d.dispatch(transfer(&a, &b, 30.0));
    let result = response.result().unwrap();
    assert_eq!(result["sourceLevel"], 70.0);
    assert_eq!(result["destinationLevel"], 30.0);

    let response = d.dispatch(transfer(&a, &b, 80.0));
    assert_eq!(response.error_kind(), Some("InsufficientResourceError"));
    assert_eq!(fuel(&d, &a), 70.0);
    assert_eq!(fuel(&d, &b), 30.0);
}

#[test]
fn test_out_of_range_changes_nothing() {
    let mut reg = registry();
    let a = ship(&mut reg, 0.0, 0.0, 100.0);
    let b = ship(&mut reg, 1_500.0, 1_500.0, 0.0);
    let d = start(reg);

    let response = d.dispatch(transfer(&a, &b, 1.0));
    assert_eq!(response.error_kind(), Some("ProximityError"));
    assert_eq!(fuel(&d, &a), 100.0);
    assert_eq!(fuel(&d, &b), 0.0);
}

#[test]
fn test_repeated_overdraw_never_goes_negative() {
    let mut reg = registry();
    let a = ship(&mut reg, 0.0, 0.0, 25.0);
    let b = ship(&mut reg, 10.0, 0.0, 0.0);
    let d = start(reg);

    let outcomes: Vec<ActionResponse> = (0..5).map(|_| d.dispatch(transfer(&a, &b, 10.0))).collect();
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 2);
    assert_eq!(fuel(&d, &a), 5.0);
    assert_eq!(fuel(&d, &b), 20.0);
}

#[test]
fn test_missing_arguments() {
    let d = start(registry());
    let response = d.dispatch(ActionRequest::new(
        "pilot",
        "transfer_resource",
        json!({"sourceId": "ship-1"}),
    ));
    assert_eq!(response.error_kind(), Some("InvalidArgumentsError"));
    assert_eq!(d.executed(), 0);
}

// ==================== CONCURRENCY ====================

#[test]
fn test_concurrent_credits_are_not_lost() {
    let mut reg = registry();
    let x = ship(&mut reg, 0.0, 0.0, 0.0);
    let donors: Vec<EntityId> = (0..4)
        .map(|i| ship(&mut reg, 100.0 * i as f64, 50.0, 1_000.0))
        .collect();
    let d = Arc::new(start(reg));

    let handles: Vec<_> = donors
        .iter()
        .cloned()
        .map(|donor| {
            let d = Arc::clone(&d);
            let x = x.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    assert!(d.dispatch(transfer(&donor, &x, 2.0)).is_ok());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(fuel(&d, &x), 4.0 * 50.0 * 2.0);
    for donor in &donors {
        assert_eq!(fuel(&d, donor), 900.0);
    }
}

#[test]
fn test_random_traffic_conserves_totals() {
    let mut reg = registry();
    let fleet: Vec<EntityId> = (0..5)
        .map(|i| ship(&mut reg, 200.0 * i as f64, 0.0, 50.0))
        .collect();
    let fleet = Arc::new(fleet);
    let d = Arc::new(start(reg));

    let handles: Vec<_> = (0..6)
        .map(|seed| {
            let d = Arc::clone(&d);
            let fleet = Arc::clone(&fleet);
            thread::spawn(move || {
                let mut rng = fastrand::Rng::with_seed(seed);
                for _ in 0..100 {
                    let from = rng.usize(..fleet.len());
                    let to = (from + 1 + rng.usize(..fleet.len() - 1)) % fleet.len();
                    let amount = rng.u32(1..=20) as f64;
                    let response = d.dispatch(transfer(&fleet[from], &fleet[to], amount));
                    assert!(
                        response.is_ok()
                            || response.error_kind() == Some("InsufficientResourceError"),
                        "unexpected {:?}",
                        response
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let levels: Vec<f64> = fleet.iter().map(|id| fuel(&d, id)).collect();
    assert!(levels.iter().all(|level| *level >= 0.0));
    assert_eq!(levels.iter().sum::<f64>(), 250.0);
}
