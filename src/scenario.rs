//! Sample star system used by `--seed-demo` and by tests.
//!
//! Two bodies (a star-class "Earth" and the planet "Mars"), two ships parked
//! a thousand units apart and two ship components stowed in the explorer.
//! Both ships feel Earth's gravity; Mars feels nothing and stays put.

use log::info;

use crate::components::identity::{EntityId, EntityKind};
use crate::components::storage::Capacity;
use crate::error::SimError;
use crate::math::Vec3;
use crate::resources::registry::{EntityOverrides, Registry};
use crate::systems::storage::add_inside;

/// Distance of the parked ships from Earth.
const PARKING_ORBIT: f64 = 7.0e9;

/// Ids of everything [`seed_demo`] creates.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoScenario {
    pub earth: EntityId,
    pub mars: EntityId,
    pub explorer: EntityId,
    pub cargo_ship: EntityId,
    pub cargo_bay: EntityId,
    pub thrusters: EntityId,
}

impl DemoScenario {
    pub fn all(&self) -> [&EntityId; 6] {
        [
            &self.earth,
            &self.mars,
            &self.explorer,
            &self.cargo_ship,
            &self.cargo_bay,
            &self.thrusters,
        ]
    }
}

pub fn seed_demo(registry: &mut Registry) -> Result<DemoScenario, SimError> {
    let earth = registry.spawn(
        EntityKind::Star,
        EntityOverrides::default()
            .name("Earth")
            .mass(5e24)
            .resource("water", 1000.0),
    )?;
    let mars = registry.spawn(
        EntityKind::Planet,
        EntityOverrides::default()
            .name("Mars")
            .position(Vec3::new(2.28e11, 1.0e10, 0.0))
            .mass(6.39e23)
            .resource("ore", 500.0),
    )?;

    let explorer = registry.spawn(
        EntityKind::Ship,
        EntityOverrides::default()
            .name("Explorer-1")
            .position(Vec3::new(PARKING_ORBIT, 0.0, 0.0))
            .mass(1e4)
            .capacity(Capacity::Limited(10))
            .resource("fuel", 100.0),
    )?;
    let cargo_ship = registry.spawn(
        EntityKind::Ship,
        EntityOverrides::default()
            .name("Cargo-Ship-1")
            .position(Vec3::new(PARKING_ORBIT + 800.0, 600.0, 0.0))
            .mass(5e4)
            .capacity(Capacity::Limited(20))
            .resource("fuel", 20.0)
            .resource("ore", 250.0),
    )?;

    let cargo_bay = registry.spawn(
        EntityKind::ShipComponent,
        EntityOverrides::default().name("Cargo Bay").mass(1e3),
    )?;
    let thrusters = registry.spawn(
        EntityKind::ShipComponent,
        EntityOverrides::default().name("Thrusters"),
    )?;

    add_inside(registry, &explorer, &cargo_bay)?;
    add_inside(registry, &explorer, &thrusters)?;

    registry.add_gravity_influence(&explorer, &earth)?;
    registry.add_gravity_influence(&cargo_ship, &earth)?;

    info!(
        "Seeded demo system: {} entities (Earth '{}', Explorer-1 '{}', Cargo-Ship-1 '{}')",
        registry.len(),
        earth,
        explorer,
        cargo_ship
    );

    Ok(DemoScenario {
        earth,
        mars,
        explorer,
        cargo_ship,
        cargo_bay,
        thrusters,
    })
}
