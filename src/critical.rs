//! Critical hit chance, multiplier, immunity, and side-effect hooks.

use crate::model::combatant::{Combatant, CombatantId};
use crate::rng::CombatRng;
use crate::status::{StatusEffectRegistry, StatusEffectSystem};

/// A natural roll at or above this confirms a critical before the chance
/// roll is even consulted. Weapon bonuses (pike) lower the threshold.
pub const CRITICAL_RANGE: u32 = 20;

/// Custom-logic tag that makes a status effect grant crit immunity.
pub const CRIT_IMMUNITY_TAG: &str = "crit_immunity";

/// Side effect produced by a registered crit hook.
#[derive(Debug, Clone, PartialEq)]
pub struct CritSideEffect {
    pub effect_id: String,
    /// Applied to the attacker instead of the target when set.
    pub on_attacker: bool,
}

type CritEffectFn =
    Box<dyn Fn(CombatantId, CombatantId) -> Option<CritSideEffect> + Send + Sync>;

/// Bonuses flowing into the critical computation for one attack.
#[derive(Debug, Clone, Copy, Default)]
pub struct CritContext {
    pub crit_bonus: f64,
    pub crit_mult_bonus: f64,
    pub critical_range_bonus: u32,
    pub ignore_crit_immunity: bool,
}

#[derive(Default)]
pub struct CriticalResolver {
    effect_registry: Vec<CritEffectFn>,
}

impl std::fmt::Debug for CriticalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriticalResolver")
            .field("registered_effects", &self.effect_registry.len())
            .finish()
    }
}

impl CriticalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Critical chance for an attack, clamped into [0.01, 0.50].
    pub fn critical_chance(&self, attacker: &Combatant, ctx: &CritContext) -> f64 {
        (attacker.skills.critical_chance + ctx.crit_bonus).clamp(0.01, 0.50)
    }

    /// Critical damage multiplier, never below 1.0.
    pub fn critical_multiplier(&self, attacker: &Combatant, ctx: &CritContext) -> f64 {
        (attacker.skills.critical_damage + ctx.crit_mult_bonus).max(1.0)
    }

    /// Whether the target is immune to criticals via a `crit_immunity`
    /// status, unless the context overrides immunity.
    pub fn is_immune(
        &self,
        registry: &StatusEffectRegistry,
        status: &StatusEffectSystem,
        target_id: CombatantId,
        ctx: &CritContext,
    ) -> bool {
        if ctx.ignore_crit_immunity {
            return false;
        }
        status.has_custom_logic(registry, target_id, CRIT_IMMUNITY_TAG)
    }

    /// A d20 attack confirms a critical when the natural roll reaches the
    /// (possibly weapon-lowered) critical range, or the chance roll lands.
    pub fn confirm_critical(
        &self,
        rng: &mut CombatRng,
        attacker: &Combatant,
        natural_roll: u32,
        ctx: &CritContext,
    ) -> bool {
        let threshold = CRITICAL_RANGE.saturating_sub(ctx.critical_range_bonus);
        if natural_roll >= threshold {
            return true;
        }
        rng.uniform01() < self.critical_chance(attacker, ctx)
    }

    /// Register a hook fired on every confirmed critical.
    pub fn register_effect<F>(&mut self, effect_fn: F)
    where
        F: Fn(CombatantId, CombatantId) -> Option<CritSideEffect> + Send + Sync + 'static,
    {
        self.effect_registry.push(Box::new(effect_fn));
    }

    /// Invoke every registered hook for a confirmed crit, collecting the
    /// effects they produce, in registration order.
    pub fn trigger_effects(
        &self,
        attacker_id: CombatantId,
        target_id: CombatantId,
    ) -> Vec<CritSideEffect> {
        self.effect_registry
            .iter()
            .filter_map(|f| f(attacker_id, target_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::HexCoord;
    use crate::model::effect::{DurationKind, EffectKind, StatusEffectDefinition};

    fn attacker_with_crit(chance: f64, damage: f64) -> Combatant {
        let mut c = Combatant::new(1, "attacker", 0, 30, HexCoord::new(0, 0));
        c.skills.critical_chance = chance;
        c.skills.critical_damage = damage;
        c
    }

    #[test]
    fn test_chance_clamps() {
        let resolver = CriticalResolver::new();
        let ctx = CritContext::default();

        let low = attacker_with_crit(0.0, 1.5);
        assert_eq!(resolver.critical_chance(&low, &ctx), 0.01);

        let high = attacker_with_crit(0.9, 1.5);
        assert_eq!(resolver.critical_chance(&high, &ctx), 0.50);

        let bonus_ctx = CritContext {
            crit_bonus: 0.10,
            ..Default::default()
        };
        let mid = attacker_with_crit(0.05, 1.5);
        assert!((resolver.critical_chance(&mid, &bonus_ctx) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_multiplier_floor() {
        let resolver = CriticalResolver::new();
        let ctx = CritContext::default();
        let weak = attacker_with_crit(0.05, 0.5);
        assert_eq!(resolver.critical_multiplier(&weak, &ctx), 1.0);

        let strong = attacker_with_crit(0.05, 3.0);
        assert_eq!(resolver.critical_multiplier(&strong, &ctx), 3.0);
    }

    #[test]
    fn test_natural_twenty_confirms() {
        let resolver = CriticalResolver::new();
        let mut rng = CombatRng::seed_from(1);
        let attacker = attacker_with_crit(0.01, 1.5);
        assert!(resolver.confirm_critical(&mut rng, &attacker, 20, &CritContext::default()));
    }

    #[test]
    fn test_range_bonus_lowers_threshold() {
        let resolver = CriticalResolver::new();
        let attacker = attacker_with_crit(0.01, 1.5);
        let ctx = CritContext {
            critical_range_bonus: 1,
            ..Default::default()
        };
        let mut rng = CombatRng::seed_from(1);
        assert!(resolver.confirm_critical(&mut rng, &attacker, 19, &ctx));
    }

    #[test]
    fn test_immunity_from_status_tag() {
        let mut def = StatusEffectDefinition::simple(
            "stone_skin",
            EffectKind::Buff,
            DurationKind::Rounds,
            5,
        );
        def.custom_logic = Some(CRIT_IMMUNITY_TAG.to_string());
        let registry = StatusEffectRegistry::from_definitions(vec![def]).unwrap();
        let mut status = StatusEffectSystem::new();
        status.apply_effect(&registry, 2, "stone_skin", 0);

        let resolver = CriticalResolver::new();
        let ctx = CritContext::default();
        assert!(resolver.is_immune(&registry, &status, 2, &ctx));
        assert!(!resolver.is_immune(&registry, &status, 3, &ctx));

        let override_ctx = CritContext {
            ignore_crit_immunity: true,
            ..Default::default()
        };
        assert!(!resolver.is_immune(&registry, &status, 2, &override_ctx));
    }

    #[test]
    fn test_registered_effects_fire_in_order() {
        let mut resolver = CriticalResolver::new();
        resolver.register_effect(|_, _| {
            Some(CritSideEffect {
                effect_id: "bleeding".to_string(),
                on_attacker: false,
            })
        });
        resolver.register_effect(|_, _| None);
        resolver.register_effect(|_, _| {
            Some(CritSideEffect {
                effect_id: "inspired".to_string(),
                on_attacker: true,
            })
        });

        let effects = resolver.trigger_effects(1, 2);
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].effect_id, "bleeding");
        assert_eq!(effects[1].effect_id, "inspired");
    }
}
