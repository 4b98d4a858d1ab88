//! Configuration catalogs supplied by the host at session construction.
//!
//! The engine treats feat and status-effect catalogs as opaque data: parsed
//! once, validated against each other, then immutable for the session's
//! lifetime. Catalog problems are fatal at construction; a session is never
//! built over a half-valid catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::ConfigError;
use crate::model::combatant::SlotKind;
use crate::model::damage::{DamageComposition, DamageType};
use crate::status::StatusEffectRegistry;

/// Who a feat may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Enemy,
    Ally,
    #[serde(rename = "self")]
    SelfOnly,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRule {
    #[serde(rename = "type")]
    pub kind: TargetKind,
}

impl Default for TargetRule {
    fn default() -> Self {
        Self {
            kind: TargetKind::Enemy,
        }
    }
}

/// A feat: weapon, spell, or item definition from the host's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatDefinition {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_action_type")]
    pub action_type: SlotKind,
    #[serde(default)]
    pub mp_cost: u32,
    #[serde(default)]
    pub requires_weapon: bool,
    #[serde(default)]
    pub combat_irrelevant: bool,
    #[serde(default)]
    pub target: TargetRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_damage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_type: Option<DamageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_damage: Option<DamageComposition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_healing: Option<f64>,
    /// Registry id of a status effect applied to targets on commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_condition: Option<String>,
    /// Overrides the status effect's own duration when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_duration: Option<i64>,
    /// Spells with a DC let each target make a saving throw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_dc: Option<i32>,
    #[serde(default)]
    pub half_on_save: bool,
}

fn default_action_type() -> SlotKind {
    SlotKind::Action
}

/// Immutable feat catalog keyed by feat id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatCatalog {
    feats: BTreeMap<u32, FeatDefinition>,
}

impl FeatCatalog {
    /// Build and validate a catalog. Every `status_condition` must name an
    /// effect registered in the status registry.
    pub fn from_definitions(
        definitions: Vec<FeatDefinition>,
        registry: &StatusEffectRegistry,
    ) -> Result<Self, ConfigError> {
        let mut feats = BTreeMap::new();
        for feat in definitions {
            if feats.contains_key(&feat.id) {
                return Err(ConfigError::DuplicateFeat(feat.id));
            }
            if let Some(effect_id) = &feat.status_condition {
                if !registry.contains(effect_id) {
                    return Err(ConfigError::UnknownStatusCondition {
                        feat: feat.name.clone(),
                        effect_id: effect_id.clone(),
                    });
                }
            }
            feats.insert(feat.id, feat);
        }
        Ok(Self { feats })
    }

    /// Parse a catalog from the host's raw JSON array.
    pub fn from_json(
        value: serde_json::Value,
        registry: &StatusEffectRegistry,
    ) -> Result<Self, ConfigError> {
        let definitions: Vec<FeatDefinition> = serde_json::from_value(value)
            .map_err(|e| ConfigError::InvalidDefinition(e.to_string()))?;
        Self::from_definitions(definitions, registry)
    }

    pub fn get(&self, feat_id: u32) -> Option<&FeatDefinition> {
        self.feats.get(&feat_id)
    }

    pub fn len(&self) -> usize {
        self.feats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::effect::{DurationKind, EffectKind, StatusEffectDefinition};

    fn registry() -> StatusEffectRegistry {
        StatusEffectRegistry::from_definitions(vec![StatusEffectDefinition::simple(
            "burning",
            EffectKind::Debuff,
            DurationKind::Rounds,
            3,
        )])
        .unwrap()
    }

    #[test]
    fn test_catalog_parses_from_json() {
        let catalog = FeatCatalog::from_json(
            serde_json::json!([
                {
                    "id": 1,
                    "name": "Shortsword",
                    "base_damage": 6.0,
                    "damage_type": "physical"
                },
                {
                    "id": 2,
                    "name": "Firebolt",
                    "mp_cost": 3,
                    "base_damage": 10.0,
                    "damage_type": "fire",
                    "status_condition": "burning",
                    "save_dc": 13,
                    "half_on_save": true
                }
            ]),
            &registry(),
        )
        .unwrap();

        let sword = catalog.get(1).unwrap();
        assert_eq!(sword.action_type, SlotKind::Action);
        assert_eq!(sword.mp_cost, 0);
        assert_eq!(sword.base_damage, Some(6.0));

        let firebolt = catalog.get(2).unwrap();
        assert_eq!(firebolt.status_condition.as_deref(), Some("burning"));
        assert!(firebolt.half_on_save);
    }

    #[test]
    fn test_unknown_status_condition_fatal() {
        let result = FeatCatalog::from_json(
            serde_json::json!([
                {"id": 1, "name": "Cursed Blade", "status_condition": "doom"}
            ]),
            &registry(),
        );
        assert_eq!(
            result,
            Err(ConfigError::UnknownStatusCondition {
                feat: "Cursed Blade".to_string(),
                effect_id: "doom".to_string(),
            })
        );
    }

    #[test]
    fn test_duplicate_feat_id_fatal() {
        let result = FeatCatalog::from_json(
            serde_json::json!([
                {"id": 1, "name": "A"},
                {"id": 1, "name": "B"}
            ]),
            &registry(),
        );
        assert_eq!(result, Err(ConfigError::DuplicateFeat(1)));
    }

    #[test]
    fn test_malformed_catalog_fatal() {
        let result = FeatCatalog::from_json(serde_json::json!({"not": "an array"}), &registry());
        assert!(matches!(result, Err(ConfigError::InvalidDefinition(_))));
    }
}
