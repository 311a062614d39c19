//! Per-entity resource holdings (fuel, ore, water, ...).
//!
//! Quantities are never negative; a missing key reads as zero.

use bevy_ecs::prelude::Component;
use rustc_hash::FxHashMap;

#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct Cargo {
    pub amounts: FxHashMap<String, f64>,
}

impl Cargo {
    pub fn new(amounts: FxHashMap<String, f64>) -> Self {
        Self { amounts }
    }

    /// Quantity held of `resource`, zero if absent.
    pub fn get(&self, resource: &str) -> f64 {
        self.amounts.get(resource).copied().unwrap_or(0.0)
    }

    /// Add `amount` of `resource` and return the new level.
    pub fn credit(&mut self, resource: &str, amount: f64) -> f64 {
        let level = self.amounts.entry(resource.to_string()).or_insert(0.0);
        *level += amount;
        *level
    }

    /// Remove `amount` of `resource` and return the new level.
    ///
    /// Returns `None` without touching the holding when there is not enough.
    pub fn debit(&mut self, resource: &str, amount: f64) -> Option<f64> {
        let available = self.get(resource);
        if available < amount {
            return None;
        }
        let level = (available - amount).max(0.0);
        self.amounts.insert(resource.to_string(), level);
        Some(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resource_reads_zero() {
        let cargo = Cargo::default();
        assert_eq!(cargo.get("fuel"), 0.0);
    }

    #[test]
    fn test_credit_then_debit() {
        let mut cargo = Cargo::default();
        assert_eq!(cargo.credit("fuel", 100.0), 100.0);
        assert_eq!(cargo.debit("fuel", 30.0), Some(70.0));
        assert_eq!(cargo.get("fuel"), 70.0);
    }

    #[test]
    fn test_debit_more_than_available_is_refused() {
        let mut cargo = Cargo::default();
        cargo.credit("ore", 5.0);
        assert_eq!(cargo.debit("ore", 5.000001), None);
        assert_eq!(cargo.get("ore"), 5.0);
        assert_eq!(cargo.debit("water", 1.0), None);
        assert!(!cargo.amounts.contains_key("water"));
    }

    #[test]
    fn test_debit_everything() {
        let mut cargo = Cargo::default();
        cargo.credit("ore", 5.0);
        assert_eq!(cargo.debit("ore", 5.0), Some(0.0));
    }
}
