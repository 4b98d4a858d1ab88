//! Per-entity resistances and vulnerabilities.
//!
//! Each damage type carries independent percent and flat entries for both
//! resistance and vulnerability. Entries may be permanent or timed; timed
//! entries expire through `tick()`, which runs at round boundaries.
//!
//! Application order is fixed: percent composition first, then flat
//! components, then a clamp at zero:
//!
//! `a' = max(0, a * (1 - resistance + vulnerability) - flat_res + flat_vuln)`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::damage::DamageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResistanceKind {
    Percent,
    Flat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TypeEntries {
    percent: Vec<f64>,
    flat: Vec<f64>,
}

impl TypeEntries {
    fn list_mut(&mut self, kind: ResistanceKind) -> &mut Vec<f64> {
        match kind {
            ResistanceKind::Percent => &mut self.percent,
            ResistanceKind::Flat => &mut self.flat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TemporaryEntry {
    damage_type: DamageType,
    kind: ResistanceKind,
    value: f64,
    remaining_ticks: i64,
    is_vulnerability: bool,
}

/// Resolved totals for one damage type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResistanceTotals {
    pub percent_resistance: f64,
    pub flat_resistance: f64,
    pub percent_vulnerability: f64,
    pub flat_vulnerability: f64,
}

impl ResistanceTotals {
    /// Apply these totals to a damage amount.
    pub fn apply(&self, amount: f64) -> f64 {
        let after_percent =
            amount * (1.0 - self.percent_resistance + self.percent_vulnerability);
        (after_percent - self.flat_resistance + self.flat_vulnerability).max(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResistanceStore {
    resistances: BTreeMap<DamageType, TypeEntries>,
    vulnerabilities: BTreeMap<DamageType, TypeEntries>,
    temporary: Vec<TemporaryEntry>,
}

impl ResistanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resistance entry. `duration` in ticks for a temporary entry,
    /// `None` for permanent.
    pub fn add_resistance(
        &mut self,
        damage_type: DamageType,
        value: f64,
        kind: ResistanceKind,
        duration: Option<i64>,
    ) {
        self.resistances
            .entry(damage_type)
            .or_default()
            .list_mut(kind)
            .push(value);
        if let Some(ticks) = duration {
            assert!(ticks > 0, "temporary resistance with non-positive duration");
            self.temporary.push(TemporaryEntry {
                damage_type,
                kind,
                value,
                remaining_ticks: ticks,
                is_vulnerability: false,
            });
        }
    }

    pub fn add_vulnerability(
        &mut self,
        damage_type: DamageType,
        value: f64,
        kind: ResistanceKind,
        duration: Option<i64>,
    ) {
        self.vulnerabilities
            .entry(damage_type)
            .or_default()
            .list_mut(kind)
            .push(value);
        if let Some(ticks) = duration {
            assert!(ticks > 0, "temporary vulnerability with non-positive duration");
            self.temporary.push(TemporaryEntry {
                damage_type,
                kind,
                value,
                remaining_ticks: ticks,
                is_vulnerability: true,
            });
        }
    }

    /// Remove one matching entry, if present.
    pub fn remove_resistance(&mut self, damage_type: DamageType, value: f64, kind: ResistanceKind) {
        if let Some(entries) = self.resistances.get_mut(&damage_type) {
            let list = entries.list_mut(kind);
            if let Some(pos) = list.iter().position(|&v| v == value) {
                list.remove(pos);
            }
        }
    }

    pub fn remove_vulnerability(
        &mut self,
        damage_type: DamageType,
        value: f64,
        kind: ResistanceKind,
    ) {
        if let Some(entries) = self.vulnerabilities.get_mut(&damage_type) {
            let list = entries.list_mut(kind);
            if let Some(pos) = list.iter().position(|&v| v == value) {
                list.remove(pos);
            }
        }
    }

    /// Advance temporary entries by one tick, removing the expired ones from
    /// their backing lists.
    pub fn tick(&mut self) {
        let mut still_active = Vec::with_capacity(self.temporary.len());
        let mut expired = Vec::new();
        for mut entry in self.temporary.drain(..) {
            entry.remaining_ticks -= 1;
            if entry.remaining_ticks > 0 {
                still_active.push(entry);
            } else {
                expired.push(entry);
            }
        }
        self.temporary = still_active;
        for entry in expired {
            if entry.is_vulnerability {
                self.remove_vulnerability(entry.damage_type, entry.value, entry.kind);
            } else {
                self.remove_resistance(entry.damage_type, entry.value, entry.kind);
            }
        }
    }

    /// Sum of percent resistances, clamped into [0, 1].
    pub fn total_resistance(&self, damage_type: DamageType) -> f64 {
        let sum: f64 = self
            .resistances
            .get(&damage_type)
            .map(|e| e.percent.iter().sum())
            .unwrap_or(0.0);
        sum.clamp(0.0, 1.0)
    }

    pub fn total_flat_resistance(&self, damage_type: DamageType) -> f64 {
        self.resistances
            .get(&damage_type)
            .map(|e| e.flat.iter().sum())
            .unwrap_or(0.0)
    }

    /// Sum of percent vulnerabilities, floored at 0 but deliberately NOT
    /// capped at 1: stacked vulnerability can exceed a doubling.
    pub fn total_vulnerability(&self, damage_type: DamageType) -> f64 {
        let sum: f64 = self
            .vulnerabilities
            .get(&damage_type)
            .map(|e| e.percent.iter().sum())
            .unwrap_or(0.0);
        sum.max(0.0)
    }

    pub fn total_flat_vulnerability(&self, damage_type: DamageType) -> f64 {
        self.vulnerabilities
            .get(&damage_type)
            .map(|e| e.flat.iter().sum())
            .unwrap_or(0.0)
    }

    /// Resolved totals for one damage type.
    pub fn totals(&self, damage_type: DamageType) -> ResistanceTotals {
        ResistanceTotals {
            percent_resistance: self.total_resistance(damage_type),
            flat_resistance: self.total_flat_resistance(damage_type),
            percent_vulnerability: self.total_vulnerability(damage_type),
            flat_vulnerability: self.total_flat_vulnerability(damage_type),
        }
    }

    /// Snapshot of totals across every damage type that has any entry.
    pub fn profile(&self) -> BTreeMap<DamageType, ResistanceTotals> {
        let mut profile = BTreeMap::new();
        for &dt in self.resistances.keys().chain(self.vulnerabilities.keys()) {
            profile.entry(dt).or_insert_with(|| self.totals(dt));
        }
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_query_permanent() {
        let mut store = ResistanceStore::new();
        store.add_resistance(DamageType::Fire, 0.5, ResistanceKind::Percent, None);
        store.add_vulnerability(DamageType::Ice, 0.2, ResistanceKind::Percent, None);
        assert_eq!(store.total_resistance(DamageType::Fire), 0.5);
        assert_eq!(store.total_vulnerability(DamageType::Ice), 0.2);
        assert_eq!(store.total_resistance(DamageType::Ice), 0.0);
    }

    #[test]
    fn test_flat_and_percent_tracked_separately() {
        let mut store = ResistanceStore::new();
        store.add_resistance(DamageType::Fire, 0.3, ResistanceKind::Percent, None);
        store.add_resistance(DamageType::Fire, 5.0, ResistanceKind::Flat, None);
        store.add_vulnerability(DamageType::Fire, 0.2, ResistanceKind::Percent, None);
        store.add_vulnerability(DamageType::Fire, 2.0, ResistanceKind::Flat, None);

        let totals = store.totals(DamageType::Fire);
        assert_eq!(totals.percent_resistance, 0.3);
        assert_eq!(totals.flat_resistance, 5.0);
        assert_eq!(totals.percent_vulnerability, 0.2);
        assert_eq!(totals.flat_vulnerability, 2.0);
    }

    #[test]
    fn test_percent_resistance_clamps_to_one() {
        let mut store = ResistanceStore::new();
        store.add_resistance(DamageType::Fire, 0.7, ResistanceKind::Percent, None);
        store.add_resistance(DamageType::Fire, 0.6, ResistanceKind::Percent, None);
        assert_eq!(store.total_resistance(DamageType::Fire), 1.0);
    }

    #[test]
    fn test_vulnerability_can_exceed_one() {
        let mut store = ResistanceStore::new();
        store.add_vulnerability(DamageType::Fire, 0.8, ResistanceKind::Percent, None);
        store.add_vulnerability(DamageType::Fire, 0.4, ResistanceKind::Percent, None);
        assert!((store.total_vulnerability(DamageType::Fire) - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_application_formula() {
        // 30% resistance, 20% vulnerability: 10 * 0.9 = 9
        let totals = ResistanceTotals {
            percent_resistance: 0.3,
            percent_vulnerability: 0.2,
            ..Default::default()
        };
        assert!((totals.apply(10.0) - 9.0).abs() < 1e-9);

        // Flat subtracts after percent, clamped at zero
        let totals = ResistanceTotals {
            percent_resistance: 0.5,
            flat_resistance: 10.0,
            ..Default::default()
        };
        assert_eq!(totals.apply(10.0), 0.0);

        let totals = ResistanceTotals {
            flat_vulnerability: 3.0,
            ..Default::default()
        };
        assert_eq!(totals.apply(10.0), 13.0);
    }

    #[test]
    fn test_temporary_expiry() {
        let mut store = ResistanceStore::new();
        store.add_resistance(DamageType::Fire, 0.5, ResistanceKind::Percent, Some(2));
        assert_eq!(store.total_resistance(DamageType::Fire), 0.5);
        store.tick();
        assert_eq!(store.total_resistance(DamageType::Fire), 0.5);
        store.tick();
        assert_eq!(store.total_resistance(DamageType::Fire), 0.0);
    }

    #[test]
    fn test_remove_only_one_matching_entry() {
        let mut store = ResistanceStore::new();
        store.add_resistance(DamageType::Fire, 0.2, ResistanceKind::Percent, None);
        store.add_resistance(DamageType::Fire, 0.2, ResistanceKind::Percent, None);
        store.remove_resistance(DamageType::Fire, 0.2, ResistanceKind::Percent);
        assert_eq!(store.total_resistance(DamageType::Fire), 0.2);
    }

    #[test]
    #[should_panic(expected = "non-positive duration")]
    fn test_negative_duration_panics() {
        let mut store = ResistanceStore::new();
        store.add_resistance(DamageType::Fire, 0.5, ResistanceKind::Percent, Some(0));
    }
}
