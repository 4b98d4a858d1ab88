//! Event-driven damage pipeline.
//!
//! A [`DamageEvent`] runs through six fixed stages; each stage holds
//! registered modifier functions sorted by priority (lower first, with
//! registration order breaking ties). Modifiers read and mutate the event's
//! damage value and typed context. The engine registers its own default
//! modifiers at priority 10; hosts may register more around them.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::combatant::CombatantId;
use crate::model::damage::{DamageComposition, DamageType, EffectivenessMatrix};
use crate::resistance::ResistanceTotals;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    PreCalculation,
    TypeModification,
    ResistanceApplication,
    CriticalCalculation,
    PostCalculation,
    FinalDamage,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::PreCalculation,
        Stage::TypeModification,
        Stage::ResistanceApplication,
        Stage::CriticalCalculation,
        Stage::PostCalculation,
        Stage::FinalDamage,
    ];

    fn index(self) -> usize {
        match self {
            Stage::PreCalculation => 0,
            Stage::TypeModification => 1,
            Stage::ResistanceApplication => 2,
            Stage::CriticalCalculation => 3,
            Stage::PostCalculation => 4,
            Stage::FinalDamage => 5,
        }
    }
}

/// Damage flowing through the pipeline: a bare scalar before type promotion,
/// a typed composition after.
#[derive(Debug, Clone, PartialEq)]
pub enum DamageValue {
    Scalar(f64),
    Composition(DamageComposition),
}

impl DamageValue {
    pub fn as_composition(&self) -> Option<&DamageComposition> {
        match self {
            DamageValue::Composition(comp) => Some(comp),
            DamageValue::Scalar(_) => None,
        }
    }
}

/// Typed context bag for one pipeline run. The resolver seeds this with
/// everything the default modifiers need; custom modifiers may use the
/// remaining knobs.
#[derive(Debug, Clone, Default)]
pub struct DamageContext {
    pub defender_type: Option<DamageType>,
    pub effectiveness: Option<Arc<EffectivenessMatrix>>,
    /// Resolved resistance totals from the target's resistance store. When
    /// absent, the resistance stage falls back to `status_resistances`.
    pub resistance_profile: Option<BTreeMap<DamageType, ResistanceTotals>>,
    /// Percent resistances granted by status effects (fallback path).
    pub status_resistances: BTreeMap<DamageType, f64>,
    pub crit_immune: bool,
    /// The attacker's resolved critical multiplier.
    pub critical_multiplier: f64,
    /// Output of the CriticalCalculation stage.
    pub multiplier: f64,
    /// Weapon multipliers, applied at FinalDamage.
    pub damage_multiplier: f64,
    /// The attacker's flanking bonus against this target; folded into
    /// `damage_multiplier` by the PostCalculation flanking hook.
    pub flanking_multiplier: f64,
    /// Fraction of the target's flat resistance ignored.
    pub armor_penetration: f64,
}

impl DamageContext {
    pub fn new() -> Self {
        Self {
            critical_multiplier: 1.0,
            multiplier: 1.0,
            damage_multiplier: 1.0,
            flanking_multiplier: 1.0,
            ..Default::default()
        }
    }
}

/// Final damage figures produced by the FinalDamage stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageOutcome {
    pub composition: DamageComposition,
    pub multiplier: f64,
    pub total: i64,
}

#[derive(Debug)]
pub struct DamageEvent {
    pub attacker_id: CombatantId,
    pub target_id: CombatantId,
    pub base_damage: DamageValue,
    /// Bootstrap type when the base damage is scalar.
    pub damage_type: Option<DamageType>,
    pub bonus_damage: Option<DamageComposition>,
    pub is_critical: bool,
    pub modified_damage: DamageValue,
    pub stage: Stage,
    pub log: Vec<(Stage, String)>,
    pub delayed: bool,
    /// Rounds until a delayed composition lands as damage-over-time.
    pub delay_duration: Option<i64>,
    pub result: Option<DamageOutcome>,
    pub context: DamageContext,
}

impl DamageEvent {
    pub fn new(
        attacker_id: CombatantId,
        target_id: CombatantId,
        base_damage: DamageValue,
        damage_type: Option<DamageType>,
        is_critical: bool,
        context: DamageContext,
    ) -> Self {
        let modified = base_damage.clone();
        Self {
            attacker_id,
            target_id,
            base_damage,
            damage_type,
            bonus_damage: None,
            is_critical,
            modified_damage: modified,
            stage: Stage::PreCalculation,
            log: Vec::new(),
            delayed: false,
            delay_duration: None,
            result: None,
            context,
        }
    }

    pub fn add_log(&mut self, stage: Stage, info: String) {
        self.log.push((stage, info));
    }
}

pub type ModifierResult = Result<(), String>;
type ModifierFn = Box<dyn Fn(&mut DamageEvent) -> ModifierResult + Send + Sync>;

struct RegisteredModifier {
    priority: i32,
    seq: u32,
    name: &'static str,
    func: ModifierFn,
}

/// Ordered, priority-sorted modifier stages transforming a damage event from
/// raw to final.
pub struct DamagePipeline {
    hooks: [Vec<RegisteredModifier>; 6],
    next_seq: u32,
}

impl std::fmt::Debug for DamagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<usize> = self.hooks.iter().map(Vec::len).collect();
        f.debug_struct("DamagePipeline")
            .field("modifiers_per_stage", &counts)
            .finish()
    }
}

impl Default for DamagePipeline {
    fn default() -> Self {
        Self::with_default_modifiers()
    }
}

impl DamagePipeline {
    /// An empty pipeline with no modifiers at all.
    pub fn empty() -> Self {
        Self {
            hooks: Default::default(),
            next_seq: 0,
        }
    }

    /// A pipeline carrying the engine's default modifiers at priority 10.
    pub fn with_default_modifiers() -> Self {
        let mut pipeline = Self::empty();
        pipeline.register_modifier(
            Stage::TypeModification,
            10,
            "default_type_modification",
            default_type_modification,
        );
        pipeline.register_modifier(
            Stage::ResistanceApplication,
            10,
            "default_resistance_application",
            default_resistance_application,
        );
        pipeline.register_modifier(
            Stage::CriticalCalculation,
            10,
            "default_critical_calculation",
            default_critical_calculation,
        );
        pipeline.register_modifier(Stage::PostCalculation, 10, "flanking_bonus", flanking_bonus);
        pipeline.register_modifier(Stage::FinalDamage, 10, "default_final_damage", default_final_damage);
        pipeline
    }

    /// Register a modifier for a stage. Lower priority runs first;
    /// registration order breaks ties.
    pub fn register_modifier<F>(&mut self, stage: Stage, priority: i32, name: &'static str, func: F)
    where
        F: Fn(&mut DamageEvent) -> ModifierResult + Send + Sync + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        let list = &mut self.hooks[stage.index()];
        list.push(RegisteredModifier {
            priority,
            seq,
            name,
            func: Box::new(func),
        });
        list.sort_by_key(|m| (m.priority, m.seq));
    }

    /// Run the event through every stage. An erroring modifier aborts the
    /// run; the caller treats the action as a spent no-op.
    pub fn run(&self, event: &mut DamageEvent) -> ModifierResult {
        for stage in Stage::ALL {
            event.stage = stage;
            for modifier in &self.hooks[stage.index()] {
                (modifier.func)(event).map_err(|e| format!("{}: {}", modifier.name, e))?;
                event.add_log(stage, format!("Modifier {} applied", modifier.name));
            }
            debug!("stage {:?} complete: {:?}", stage, event.modified_damage);
        }
        Ok(())
    }
}

/// Promote scalar damage to a typed composition (default physical), merge
/// bonus damage, and apply the effectiveness matrix when a defender type is
/// known.
fn default_type_modification(event: &mut DamageEvent) -> ModifierResult {
    if let DamageValue::Scalar(amount) = event.modified_damage {
        let damage_type = event.damage_type.unwrap_or(DamageType::Physical);
        let mut comp = DamageComposition::of(damage_type, amount);
        if let Some(bonus) = &event.bonus_damage {
            comp = comp.combine(bonus);
        }
        event.modified_damage = DamageValue::Composition(comp);
    }

    if let (Some(matrix), Some(defender_type)) =
        (event.context.effectiveness.clone(), event.context.defender_type)
    {
        if let DamageValue::Composition(comp) = &event.modified_damage {
            event.modified_damage =
                DamageValue::Composition(matrix.apply_to_composition(comp, defender_type));
        }
    }
    Ok(())
}

/// Apply the target's resistances: percent first, flat after, clamped at
/// zero. Uses the resolved store profile when present, otherwise the
/// status-granted percent resistances.
fn default_resistance_application(event: &mut DamageEvent) -> ModifierResult {
    let DamageValue::Composition(comp) = &event.modified_damage else {
        return Ok(());
    };

    let armor_penetration = event.context.armor_penetration.clamp(0.0, 1.0);
    let mut result = DamageComposition::new();
    for (damage_type, amount) in comp.iter() {
        let mut totals = match &event.context.resistance_profile {
            Some(profile) => profile.get(&damage_type).copied().unwrap_or_default(),
            None => ResistanceTotals {
                percent_resistance: event
                    .context
                    .status_resistances
                    .get(&damage_type)
                    .copied()
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0),
                ..Default::default()
            },
        };
        totals.flat_resistance *= 1.0 - armor_penetration;
        result.set(damage_type, totals.apply(amount));
    }
    event.modified_damage = DamageValue::Composition(result);
    Ok(())
}

/// Resolve the crit multiplier into the context: immunity pins it at 1.0.
fn default_critical_calculation(event: &mut DamageEvent) -> ModifierResult {
    event.context.multiplier = if event.context.crit_immune {
        1.0
    } else if event.is_critical {
        event.context.critical_multiplier
    } else {
        1.0
    };
    Ok(())
}

/// Fold the attacker's flanking bonus into the damage multiplier.
fn flanking_bonus(event: &mut DamageEvent) -> ModifierResult {
    event.context.damage_multiplier *= event.context.flanking_multiplier;
    Ok(())
}

/// Multiply through, floor each amount, clamp at zero, aggregate the total.
fn default_final_damage(event: &mut DamageEvent) -> ModifierResult {
    let DamageValue::Composition(comp) = &event.modified_damage else {
        return Err("damage was never promoted to a composition".to_string());
    };

    let factor = event.context.multiplier * event.context.damage_multiplier;
    let mut finalized = DamageComposition::new();
    for (damage_type, amount) in comp.iter() {
        finalized.set(damage_type, (amount * factor).max(0.0).floor());
    }
    let total = finalized.floored_total();
    event.result = Some(DamageOutcome {
        composition: finalized,
        multiplier: event.context.multiplier,
        total,
    });
    Ok(())
}
