//! Status effect registry and per-target active instances.
//!
//! The registry is loaded once at session construction and immutable for the
//! session's lifetime. Instances track stacks and remaining duration per
//! target; duration ticks are keyed to the effect's duration kind (rounds
//! tick at round boundaries, minutes/hours through explicit time advance).

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::ConfigError;
use crate::model::combatant::CombatantId;
use crate::model::damage::DamageType;
use crate::model::effect::{DurationKind, ModifierOp, StatusEffectDefinition};

/// Registered effect definitions, keyed by effect id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectRegistry {
    effects: BTreeMap<String, StatusEffectDefinition>,
}

impl StatusEffectRegistry {
    pub fn from_definitions(
        definitions: Vec<StatusEffectDefinition>,
    ) -> Result<Self, ConfigError> {
        let mut effects = BTreeMap::new();
        for def in definitions {
            if effects.contains_key(&def.id) {
                return Err(ConfigError::DuplicateEffect(def.id));
            }
            effects.insert(def.id.clone(), def);
        }
        Ok(Self { effects })
    }

    pub fn get(&self, effect_id: &str) -> Option<&StatusEffectDefinition> {
        self.effects.get(effect_id)
    }

    pub fn contains(&self, effect_id: &str) -> bool {
        self.effects.contains_key(effect_id)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// An active effect on a specific target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectInstance {
    pub id: u64,
    pub effect_id: String,
    pub target_id: CombatantId,
    pub start_time: u64,
    pub current_stacks: u32,
    pub remaining_duration: i64,
}

impl StatusEffectInstance {
    /// Total modification this instance contributes to `attribute`,
    /// accounting for stacks. Multiplicative modifiers combine per stack as
    /// `(factor - 1) * stacks + 1`; everything else scales linearly.
    pub fn total_modifier(&self, definition: &StatusEffectDefinition, attribute: &str) -> f64 {
        let mut total = 0.0;
        for modifier in &definition.modifiers {
            if modifier.attribute != attribute {
                continue;
            }
            if modifier.operator == ModifierOp::Multiply {
                total += (modifier.value - 1.0) * f64::from(self.current_stacks) + 1.0;
            } else {
                total += modifier.value * f64::from(self.current_stacks);
            }
        }
        total
    }
}

/// An instance that expired during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiredEffect {
    pub target_id: CombatantId,
    pub effect_id: String,
    pub instance_id: u64,
}

/// Per-target active effect instances and the operations over them.
///
/// Pure state: the registry is passed into each operation so the session can
/// share one immutable registry across snapshots and sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectSystem {
    active: BTreeMap<CombatantId, Vec<StatusEffectInstance>>,
    next_instance_id: u64,
}

impl StatusEffectSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instances(&self, target_id: CombatantId) -> &[StatusEffectInstance] {
        self.active.get(&target_id).map_or(&[], Vec::as_slice)
    }

    pub fn has_effect(&self, target_id: CombatantId, effect_id: &str) -> bool {
        self.instances(target_id)
            .iter()
            .any(|inst| inst.effect_id == effect_id)
    }

    /// Whether any active effect on the target carries the given custom-logic
    /// tag (e.g. `crit_immunity`).
    pub fn has_custom_logic(
        &self,
        registry: &StatusEffectRegistry,
        target_id: CombatantId,
        tag: &str,
    ) -> bool {
        self.instances(target_id).iter().any(|inst| {
            registry
                .get(&inst.effect_id)
                .and_then(|def| def.custom_logic.as_deref())
                .map_or(false, |t| t == tag)
        })
    }

    /// Apply an effect to a target.
    ///
    /// Returns the instance id, or `None` when an active effect grants
    /// immunity, the id is unknown, or a stackable effect is already at its
    /// stack cap.
    pub fn apply_effect(
        &mut self,
        registry: &StatusEffectRegistry,
        target_id: CombatantId,
        effect_id: &str,
        now: u64,
    ) -> Option<u64> {
        let definition = registry.get(effect_id)?;

        // Immunity granted by any already-active effect blocks application.
        if self.get_immunities(registry, target_id).contains(effect_id) {
            debug!("effect {} blocked by immunity on {}", effect_id, target_id);
            return None;
        }

        let instances = self.active.entry(target_id).or_default();
        if let Some(existing) = instances
            .iter_mut()
            .find(|inst| inst.effect_id == effect_id)
        {
            if definition.stackable {
                if existing.current_stacks >= definition.max_stacks {
                    return None;
                }
                existing.current_stacks += 1;
                assert!(
                    existing.current_stacks <= definition.max_stacks,
                    "stack count above max_stacks for effect {}",
                    effect_id
                );
                return Some(existing.id);
            }
            // Non-stackable: refresh duration and start time.
            existing.remaining_duration = definition.duration_value;
            existing.start_time = now;
            return Some(existing.id);
        }

        self.next_instance_id += 1;
        let instance = StatusEffectInstance {
            id: self.next_instance_id,
            effect_id: effect_id.to_string(),
            target_id,
            start_time: now,
            current_stacks: 1,
            remaining_duration: definition.duration_value,
        };
        let id = instance.id;
        instances.push(instance);
        Some(id)
    }

    /// Remove an effect instance. With `remove_all_stacks` false and more
    /// than one stack, a single stack is peeled off instead.
    pub fn remove_effect(
        &mut self,
        target_id: CombatantId,
        instance_id: u64,
        remove_all_stacks: bool,
    ) -> bool {
        let Some(instances) = self.active.get_mut(&target_id) else {
            return false;
        };
        let Some(pos) = instances.iter().position(|inst| inst.id == instance_id) else {
            return false;
        };
        if !remove_all_stacks && instances[pos].current_stacks > 1 {
            instances[pos].current_stacks -= 1;
            return true;
        }
        instances.remove(pos);
        if instances.is_empty() {
            self.active.remove(&target_id);
        }
        true
    }

    /// Advance durations of every instance whose duration kind matches,
    /// returning the instances that expired. Permanent and special durations
    /// never tick.
    pub fn tick(
        &mut self,
        registry: &StatusEffectRegistry,
        kind: DurationKind,
        time_passed: i64,
    ) -> Vec<ExpiredEffect> {
        assert!(time_passed > 0, "tick with non-positive duration");
        if matches!(kind, DurationKind::Permanent | DurationKind::Special) {
            return Vec::new();
        }

        let mut expired = Vec::new();
        let targets: Vec<CombatantId> = self.active.keys().copied().collect();
        for target_id in targets {
            let instances = self.active.get_mut(&target_id).unwrap();
            let mut remaining = Vec::with_capacity(instances.len());
            for mut inst in instances.drain(..) {
                let matches_kind = registry
                    .get(&inst.effect_id)
                    .map_or(false, |def| def.duration_kind == kind);
                if matches_kind {
                    inst.remaining_duration -= time_passed;
                    if inst.remaining_duration <= 0 {
                        expired.push(ExpiredEffect {
                            target_id,
                            effect_id: inst.effect_id.clone(),
                            instance_id: inst.id,
                        });
                        continue;
                    }
                }
                remaining.push(inst);
            }
            if remaining.is_empty() {
                self.active.remove(&target_id);
            } else {
                *self.active.get_mut(&target_id).unwrap() = remaining;
            }
        }
        expired
    }

    /// Final value of `attribute` after all active modifiers on the target.
    ///
    /// Additive modifiers accumulate first, multiplicative modifiers combine
    /// as a product, and a `set` modifier short-circuits: the first one found
    /// in instance order wins outright.
    pub fn calculate_modified_value(
        &self,
        registry: &StatusEffectRegistry,
        target_id: CombatantId,
        attribute: &str,
        base_value: f64,
    ) -> f64 {
        let instances = self.instances(target_id);
        if instances.is_empty() {
            return base_value;
        }

        let mut modified = base_value;
        let mut multiplicative = 1.0;

        for instance in instances {
            let Some(definition) = registry.get(&instance.effect_id) else {
                continue;
            };
            for modifier in &definition.modifiers {
                if modifier.attribute != attribute {
                    continue;
                }
                match modifier.operator {
                    ModifierOp::Multiply => {
                        multiplicative *= instance.total_modifier(definition, attribute);
                    }
                    ModifierOp::Add => {
                        modified += instance.total_modifier(definition, attribute);
                    }
                    ModifierOp::Set => {
                        return instance.total_modifier(definition, attribute);
                    }
                }
            }
        }

        modified * multiplicative
    }

    /// Union of immunities granted by active effects on the target.
    pub fn get_immunities(
        &self,
        registry: &StatusEffectRegistry,
        target_id: CombatantId,
    ) -> BTreeSet<String> {
        let mut immunities = BTreeSet::new();
        for instance in self.instances(target_id) {
            if let Some(definition) = registry.get(&instance.effect_id) {
                immunities.extend(definition.immunities_granted.iter().cloned());
            }
        }
        immunities
    }

    /// Resistances granted by active effects. Where several effects grant
    /// resistance to the same type, the minimum value wins (the source
    /// convention: lower is stronger).
    pub fn get_resistances(
        &self,
        registry: &StatusEffectRegistry,
        target_id: CombatantId,
    ) -> BTreeMap<DamageType, f64> {
        let mut resistances: BTreeMap<DamageType, f64> = BTreeMap::new();
        for instance in self.instances(target_id) {
            let Some(definition) = registry.get(&instance.effect_id) else {
                continue;
            };
            for (&damage_type, &value) in &definition.resistances_granted {
                resistances
                    .entry(damage_type)
                    .and_modify(|existing| {
                        if value < *existing {
                            *existing = value;
                        }
                    })
                    .or_insert(value);
            }
        }
        resistances
    }

    /// Override the remaining duration of a specific instance. Feats may
    /// carry an `effect_duration` that supersedes the definition's own.
    pub fn override_duration(
        &mut self,
        target_id: CombatantId,
        instance_id: u64,
        duration: i64,
    ) -> bool {
        if let Some(instances) = self.active.get_mut(&target_id) {
            if let Some(instance) = instances.iter_mut().find(|i| i.id == instance_id) {
                instance.remaining_duration = duration;
                return true;
            }
        }
        false
    }

    /// Current stack count for an effect on a target, zero when absent.
    pub fn stacks(&self, target_id: CombatantId, effect_id: &str) -> u32 {
        self.instances(target_id)
            .iter()
            .find(|i| i.effect_id == effect_id)
            .map_or(0, |i| i.current_stacks)
    }

    /// Drop every instance on a target (used when a combatant is removed).
    pub fn clear_target(&mut self, target_id: CombatantId) {
        self.active.remove(&target_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::effect::{AttributeModifier, EffectKind};

    fn registry_with(defs: Vec<StatusEffectDefinition>) -> StatusEffectRegistry {
        StatusEffectRegistry::from_definitions(defs).unwrap()
    }

    fn stacking_attack_buff() -> StatusEffectDefinition {
        let mut def = StatusEffectDefinition::simple(
            "war_chant",
            EffectKind::Buff,
            DurationKind::Rounds,
            5,
        );
        def.stackable = true;
        def.max_stacks = 3;
        def.modifiers = vec![AttributeModifier {
            attribute: "attack".to_string(),
            value: 2.0,
            operator: ModifierOp::Add,
        }];
        def
    }

    #[test]
    fn test_apply_and_stack_to_cap() {
        let registry = registry_with(vec![stacking_attack_buff()]);
        let mut system = StatusEffectSystem::new();

        let first = system.apply_effect(&registry, 1, "war_chant", 0);
        assert!(first.is_some());
        // Five applications, capped at three stacks
        for _ in 0..4 {
            system.apply_effect(&registry, 1, "war_chant", 0);
        }
        let instances = system.instances(1);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].current_stacks, 3);

        // base 10 + 2 per stack
        let modified = system.calculate_modified_value(&registry, 1, "attack", 10.0);
        assert_eq!(modified, 16.0);
    }

    #[test]
    fn test_nonstackable_refreshes_duration() {
        let registry = registry_with(vec![StatusEffectDefinition::simple(
            "chill",
            EffectKind::Debuff,
            DurationKind::Rounds,
            3,
        )]);
        let mut system = StatusEffectSystem::new();
        let id = system.apply_effect(&registry, 1, "chill", 0).unwrap();
        system.tick(&registry, DurationKind::Rounds, 2);
        assert_eq!(system.instances(1)[0].remaining_duration, 1);

        let refreshed = system.apply_effect(&registry, 1, "chill", 9).unwrap();
        assert_eq!(refreshed, id);
        assert_eq!(system.instances(1)[0].remaining_duration, 3);
        assert_eq!(system.instances(1)[0].start_time, 9);
    }

    #[test]
    fn test_immunity_blocks_application() {
        let mut ward = StatusEffectDefinition::simple(
            "poison_ward",
            EffectKind::Buff,
            DurationKind::Rounds,
            10,
        );
        ward.immunities_granted.insert("poisoned".to_string());
        let registry = registry_with(vec![
            ward,
            StatusEffectDefinition::simple("poisoned", EffectKind::Condition, DurationKind::Rounds, 3),
        ]);

        let mut system = StatusEffectSystem::new();
        system.apply_effect(&registry, 1, "poison_ward", 0).unwrap();
        assert!(system.apply_effect(&registry, 1, "poisoned", 0).is_none());
        assert!(!system.has_effect(1, "poisoned"));
    }

    #[test]
    fn test_tick_expires_matching_kind_only() {
        let registry = registry_with(vec![
            StatusEffectDefinition::simple("blessed", EffectKind::Buff, DurationKind::Rounds, 1),
            StatusEffectDefinition::simple("cursed", EffectKind::Debuff, DurationKind::Minutes, 1),
            StatusEffectDefinition::simple("marked", EffectKind::Condition, DurationKind::Permanent, 0),
        ]);
        let mut system = StatusEffectSystem::new();
        system.apply_effect(&registry, 1, "blessed", 0);
        system.apply_effect(&registry, 1, "cursed", 0);
        system.apply_effect(&registry, 1, "marked", 0);

        let expired = system.tick(&registry, DurationKind::Rounds, 1);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].effect_id, "blessed");
        assert!(system.has_effect(1, "cursed"));
        assert!(system.has_effect(1, "marked"));

        // Permanent never ticks even when asked directly
        assert!(system.tick(&registry, DurationKind::Permanent, 1).is_empty());
    }

    #[test]
    fn test_remove_single_stack() {
        let registry = registry_with(vec![stacking_attack_buff()]);
        let mut system = StatusEffectSystem::new();
        let id = system.apply_effect(&registry, 1, "war_chant", 0).unwrap();
        system.apply_effect(&registry, 1, "war_chant", 0);

        assert!(system.remove_effect(1, id, false));
        assert_eq!(system.instances(1)[0].current_stacks, 1);
        assert!(system.remove_effect(1, id, false));
        assert!(system.instances(1).is_empty());
    }

    #[test]
    fn test_set_operator_short_circuits() {
        let mut pin = StatusEffectDefinition::simple(
            "petrified",
            EffectKind::Condition,
            DurationKind::Special,
            0,
        );
        pin.modifiers = vec![AttributeModifier {
            attribute: "speed".to_string(),
            value: 0.0,
            operator: ModifierOp::Set,
        }];
        let mut haste = StatusEffectDefinition::simple(
            "hasted",
            EffectKind::Buff,
            DurationKind::Rounds,
            3,
        );
        haste.modifiers = vec![AttributeModifier {
            attribute: "speed".to_string(),
            value: 2.0,
            operator: ModifierOp::Multiply,
        }];
        let registry = registry_with(vec![pin, haste]);

        let mut system = StatusEffectSystem::new();
        system.apply_effect(&registry, 1, "petrified", 0);
        system.apply_effect(&registry, 1, "hasted", 0);
        // First set in instance order wins regardless of later modifiers
        assert_eq!(
            system.calculate_modified_value(&registry, 1, "speed", 6.0),
            0.0
        );
    }

    #[test]
    fn test_multiplicative_stacking_convention() {
        let mut frenzy = StatusEffectDefinition::simple(
            "frenzy",
            EffectKind::Buff,
            DurationKind::Rounds,
            3,
        );
        frenzy.stackable = true;
        frenzy.max_stacks = 3;
        frenzy.modifiers = vec![AttributeModifier {
            attribute: "damage".to_string(),
            value: 1.2,
            operator: ModifierOp::Multiply,
        }];
        let registry = registry_with(vec![frenzy]);
        let mut system = StatusEffectSystem::new();
        system.apply_effect(&registry, 1, "frenzy", 0);
        system.apply_effect(&registry, 1, "frenzy", 0);

        // (1.2 - 1) * 2 + 1 = 1.4
        let modified = system.calculate_modified_value(&registry, 1, "damage", 10.0);
        assert!((modified - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_granted_resistances_take_minimum() {
        let mut minor = StatusEffectDefinition::simple(
            "minor_ward",
            EffectKind::Buff,
            DurationKind::Rounds,
            3,
        );
        minor.resistances_granted.insert(DamageType::Fire, 0.5);
        let mut major = StatusEffectDefinition::simple(
            "major_ward",
            EffectKind::Buff,
            DurationKind::Rounds,
            3,
        );
        major.resistances_granted.insert(DamageType::Fire, 0.2);
        let registry = registry_with(vec![minor, major]);

        let mut system = StatusEffectSystem::new();
        system.apply_effect(&registry, 1, "minor_ward", 0);
        system.apply_effect(&registry, 1, "major_ward", 0);

        let resistances = system.get_resistances(&registry, 1);
        assert_eq!(resistances.get(&DamageType::Fire), Some(&0.2));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let result = StatusEffectRegistry::from_definitions(vec![
            StatusEffectDefinition::simple("dup", EffectKind::Buff, DurationKind::Rounds, 1),
            StatusEffectDefinition::simple("dup", EffectKind::Buff, DurationKind::Rounds, 2),
        ]);
        assert_eq!(result, Err(ConfigError::DuplicateEffect("dup".to_string())));
    }
}
