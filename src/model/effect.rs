use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::damage::DamageType;

/// Broad classification of a status effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Buff,
    Debuff,
    Condition,
}

/// How an effect's remaining duration is measured.
///
/// `Rounds` durations tick at combat-round boundaries; `Minutes` and `Hours`
/// only advance through explicit `advance_time` calls on the session.
/// `Permanent` never expires and `Special` expires only by explicit removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationKind {
    Rounds,
    Minutes,
    Hours,
    Permanent,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierOp {
    Add,
    Multiply,
    Set,
}

/// A single attribute modification carried by a status effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeModifier {
    pub attribute: String,
    pub value: f64,
    #[serde(default = "default_op")]
    pub operator: ModifierOp,
}

fn default_op() -> ModifierOp {
    ModifierOp::Add
}

impl AttributeModifier {
    pub fn apply(&self, base_value: f64) -> f64 {
        match self.operator {
            ModifierOp::Add => base_value + self.value,
            ModifierOp::Multiply => base_value * self.value,
            ModifierOp::Set => self.value,
        }
    }
}

/// A registered status effect definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EffectKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modifiers: Vec<AttributeModifier>,
    pub duration_kind: DurationKind,
    pub duration_value: i64,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    #[serde(default)]
    pub immunities_granted: BTreeSet<String>,
    #[serde(default)]
    pub resistances_granted: BTreeMap<DamageType, f64>,
    /// Free-form tag for effects the host treats specially, e.g.
    /// `crit_immunity`.
    #[serde(default)]
    pub custom_logic: Option<String>,
}

fn default_max_stacks() -> u32 {
    1
}

impl StatusEffectDefinition {
    /// Minimal definition with no modifiers, used heavily by tests.
    pub fn simple(id: &str, kind: EffectKind, duration_kind: DurationKind, value: i64) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            description: String::new(),
            modifiers: Vec::new(),
            duration_kind,
            duration_value: value,
            stackable: false,
            max_stacks: 1,
            immunities_granted: BTreeSet::new(),
            resistances_granted: BTreeMap::new(),
            custom_logic: None,
        }
    }
}
