use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed set of damage types the engine understands.
///
/// The ordering (via `Ord`) is only used to keep composition iteration and
/// serialization deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Physical,
    Magical,
    Fire,
    Ice,
    Lightning,
    Poison,
    Holy,
    Dark,
}

impl DamageType {
    pub const ALL: [DamageType; 8] = [
        DamageType::Physical,
        DamageType::Magical,
        DamageType::Fire,
        DamageType::Ice,
        DamageType::Lightning,
        DamageType::Poison,
        DamageType::Holy,
        DamageType::Dark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DamageType::Physical => "physical",
            DamageType::Magical => "magical",
            DamageType::Fire => "fire",
            DamageType::Ice => "ice",
            DamageType::Lightning => "lightning",
            DamageType::Poison => "poison",
            DamageType::Holy => "holy",
            DamageType::Dark => "dark",
        }
    }
}

impl std::fmt::Display for DamageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A composition of damage amounts keyed by type.
///
/// Example: `{fire: 10, physical: 5}`. Amounts are kept as `f64` while the
/// damage pipeline runs; the final stage floors the per-type amounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageComposition {
    #[serde(flatten)]
    amounts: BTreeMap<DamageType, f64>,
}

impl DamageComposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a single-type composition.
    pub fn of(damage_type: DamageType, amount: f64) -> Self {
        let mut comp = Self::new();
        comp.add(damage_type, amount);
        comp
    }

    pub fn add(&mut self, damage_type: DamageType, amount: f64) {
        *self.amounts.entry(damage_type).or_insert(0.0) += amount;
    }

    pub fn get(&self, damage_type: DamageType) -> f64 {
        self.amounts.get(&damage_type).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, damage_type: DamageType, amount: f64) {
        self.amounts.insert(damage_type, amount);
    }

    pub fn total(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Per-key sum of two compositions.
    pub fn combine(&self, other: &DamageComposition) -> DamageComposition {
        let mut result = self.clone();
        for (&dt, &amt) in other.amounts.iter() {
            result.add(dt, amt);
        }
        result
    }

    /// True once every non-zero amount has been removed.
    pub fn is_empty(&self) -> bool {
        self.amounts.values().all(|&a| a == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DamageType, f64)> + '_ {
        self.amounts.iter().map(|(&dt, &amt)| (dt, amt))
    }

    pub fn types(&self) -> Vec<DamageType> {
        self.amounts.keys().copied().collect()
    }

    /// Floor every amount to a whole number, clamping at zero, and return the
    /// aggregate total.
    pub fn floored_total(&self) -> i64 {
        self.amounts
            .values()
            .map(|&a| a.max(0.0).floor() as i64)
            .sum()
    }
}

/// Per (attacker-type, defender-type) damage multiplier table.
///
/// Unset pairs default to 1.0. The version counter is bumped on every write
/// so snapshots can declare which table they were produced against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessMatrix {
    matrix: BTreeMap<DamageType, BTreeMap<DamageType, f64>>,
    version: u32,
}

impl Default for EffectivenessMatrix {
    fn default() -> Self {
        Self {
            matrix: BTreeMap::new(),
            version: 1,
        }
    }
}

impl EffectivenessMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_effectiveness(
        &mut self,
        attacker_type: DamageType,
        defender_type: DamageType,
        multiplier: f64,
    ) {
        self.matrix
            .entry(attacker_type)
            .or_default()
            .insert(defender_type, multiplier);
        self.version += 1;
    }

    pub fn get_effectiveness(&self, attacker_type: DamageType, defender_type: DamageType) -> f64 {
        self.matrix
            .get(&attacker_type)
            .and_then(|row| row.get(&defender_type))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Multiply each component of a composition by its effectiveness against
    /// the defender's type, returning a new composition.
    pub fn apply_to_composition(
        &self,
        composition: &DamageComposition,
        defender_type: DamageType,
    ) -> DamageComposition {
        let mut result = DamageComposition::new();
        for (dt, amt) in composition.iter() {
            result.add(dt, amt * self.get_effectiveness(dt, defender_type));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_total() {
        let mut comp = DamageComposition::new();
        comp.add(DamageType::Fire, 10.0);
        comp.add(DamageType::Physical, 5.0);
        assert_eq!(comp.total(), 15.0);
        assert_eq!(comp.get(DamageType::Fire), 10.0);
        assert_eq!(comp.get(DamageType::Physical), 5.0);
    }

    #[test]
    fn test_combine() {
        let comp1 = DamageComposition::of(DamageType::Fire, 10.0);
        let mut comp2 = DamageComposition::of(DamageType::Fire, 5.0);
        comp2.add(DamageType::Physical, 3.0);
        let combined = comp1.combine(&comp2);
        assert_eq!(combined.get(DamageType::Fire), 15.0);
        assert_eq!(combined.get(DamageType::Physical), 3.0);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut comp = DamageComposition::of(DamageType::Fire, 7.0);
        comp.add(DamageType::Poison, 2.0);
        let json = serde_json::to_string(&comp).unwrap();
        assert_eq!(json, r#"{"fire":7.0,"poison":2.0}"#);
        let back: DamageComposition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, comp);
    }

    #[test]
    fn test_is_empty() {
        let mut comp = DamageComposition::new();
        assert!(comp.is_empty());
        comp.add(DamageType::Fire, 1.0);
        assert!(!comp.is_empty());
        comp.set(DamageType::Fire, 0.0);
        assert!(comp.is_empty());
    }

    #[test]
    fn test_matrix_defaults_and_versioning() {
        let mut matrix = EffectivenessMatrix::new();
        assert_eq!(matrix.get_effectiveness(DamageType::Fire, DamageType::Ice), 1.0);
        assert_eq!(matrix.version(), 1);

        matrix.set_effectiveness(DamageType::Fire, DamageType::Ice, 2.0);
        matrix.set_effectiveness(DamageType::Fire, DamageType::Fire, 0.5);
        assert_eq!(matrix.version(), 3);
        assert_eq!(matrix.get_effectiveness(DamageType::Fire, DamageType::Ice), 2.0);
    }

    #[test]
    fn test_matrix_application() {
        let mut matrix = EffectivenessMatrix::new();
        matrix.set_effectiveness(DamageType::Fire, DamageType::Ice, 2.0);

        let comp = DamageComposition::of(DamageType::Fire, 10.0);
        let boosted = matrix.apply_to_composition(&comp, DamageType::Ice);
        assert_eq!(boosted.get(DamageType::Fire), 20.0);

        matrix.set_effectiveness(DamageType::Fire, DamageType::Fire, 0.5);
        let halved = matrix.apply_to_composition(&comp, DamageType::Fire);
        assert_eq!(halved.get(DamageType::Fire), 5.0);
    }
}
