//! Action interpretation: reference validation, the slot/cost preamble, and
//! dispatch into the per-kind resolvers.
//!
//! `validate` runs before anything is logged or mutated and catches host
//! mistakes (unknown ids) as errors. `resolve` then interprets the action
//! against the session, returning a rules outcome; rule failures leave the
//! session untouched except for the attempt log entry.

use log::debug;

use crate::config::FeatDefinition;
use crate::critical::CritContext;
use crate::dice::ability_modifier;
use crate::errors::EngineError;
use crate::events::LogEntry;
use crate::model::action::{Action, ActionOutcome};
use crate::model::combatant::{CombatantId, SlotKind};
use crate::model::damage::DamageType;
use crate::pipeline::{DamageContext, DamageEvent, DamageOutcome};
use crate::resolvers;
use crate::session::CombatSession;

/// Base damage when a combatant attacks with nothing equipped.
pub(crate) const DEFAULT_ATTACK_DAMAGE: f64 = 10.0;

/// Check every id the action references before any state change.
pub(crate) fn validate(session: &CombatSession, action: &Action) -> Result<(), EngineError> {
    match action {
        Action::Attack {
            actor_id,
            target_id,
            weapon_id,
            ..
        } => {
            if !session.combatants.contains_key(target_id) {
                return Err(EngineError::UnknownTarget(*target_id));
            }
            let actor = &session.combatants[actor_id];
            if let Some(feat_id) = (*weapon_id).or(actor.weapon_id) {
                if session.feats.get(feat_id).is_none() {
                    return Err(EngineError::UnknownFeat(feat_id));
                }
            }
            Ok(())
        }
        Action::Spell {
            spell_id, targets, ..
        } => {
            if session.feats.get(*spell_id).is_none() {
                return Err(EngineError::UnknownFeat(*spell_id));
            }
            if targets.is_empty() {
                return Err(EngineError::MalformedAction(
                    "spell with no targets".to_string(),
                ));
            }
            for target_id in targets {
                if !session.combatants.contains_key(target_id) {
                    return Err(EngineError::UnknownTarget(*target_id));
                }
            }
            Ok(())
        }
        Action::UseItem {
            item_id, targets, ..
        } => {
            if session.feats.get(*item_id).is_none() {
                return Err(EngineError::UnknownFeat(*item_id));
            }
            for target_id in targets {
                if !session.combatants.contains_key(target_id) {
                    return Err(EngineError::UnknownTarget(*target_id));
                }
            }
            Ok(())
        }
        Action::Move { path, .. } => {
            if path.is_empty() {
                return Err(EngineError::MalformedAction(
                    "movement with empty path".to_string(),
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Interpret a validated action. Returns the rules outcome; the session
/// advances the turn afterwards for outcomes that spend it.
pub(crate) fn resolve(session: &mut CombatSession, action: &Action) -> ActionOutcome {
    match action {
        Action::Attack {
            actor_id,
            target_id,
            weapon_id,
            advantage,
            disadvantage,
        } => resolvers::attack::resolve_attack(
            session,
            *actor_id,
            *target_id,
            *weapon_id,
            *advantage,
            *disadvantage,
        ),
        Action::Spell {
            actor_id,
            spell_id,
            targets,
            advantage,
            disadvantage,
            mp_cost,
        } => resolvers::attack::resolve_spell(
            session,
            *actor_id,
            *spell_id,
            targets,
            *advantage,
            *disadvantage,
            *mp_cost,
        ),
        Action::Move { actor_id, path } => {
            resolvers::movement::resolve_move(session, *actor_id, path)
        }
        Action::UseItem {
            actor_id,
            item_id,
            targets,
        } => resolvers::attack::resolve_item(session, *actor_id, *item_id, targets),
        Action::Ready { actor_id } | Action::Delay { actor_id } => {
            session.initiative.ready_action(*actor_id);
            ActionOutcome::Committed
        }
        Action::Dodge { actor_id } => resolve_dodge(session, *actor_id),
        Action::DeathSave { actor_id } => resolve_death_save(session, *actor_id),
        Action::EndTurn { .. } => ActionOutcome::Committed,
        Action::Abort { .. } => {
            session.abort();
            ActionOutcome::Terminated
        }
    }
}

/// First half of the preamble: report a spent slot or missing mana without
/// consuming anything. Runs before target validation so the slot check is
/// the first failure a host sees.
pub(crate) fn peek_slot_and_mp(
    session: &CombatSession,
    actor_id: CombatantId,
    slot: SlotKind,
    mp_cost: u32,
) -> Option<ActionOutcome> {
    let actor = &session.combatants[&actor_id];
    if !actor.slots.available(slot) {
        return Some(ActionOutcome::SlotUsed { slot });
    }
    if actor.mp < mp_cost {
        return Some(ActionOutcome::InsufficientMp {
            required: mp_cost,
            available: actor.mp,
        });
    }
    None
}

/// The common preamble: the slot must be free and the mana must be there.
/// Nothing is consumed unless both checks pass.
pub(crate) fn consume_slot_and_mp(
    session: &mut CombatSession,
    actor_id: CombatantId,
    slot: SlotKind,
    mp_cost: u32,
) -> Option<ActionOutcome> {
    let actor = session.combatants.get_mut(&actor_id).expect("actor exists");
    if !actor.slots.available(slot) {
        return Some(ActionOutcome::SlotUsed { slot });
    }
    if actor.mp < mp_cost {
        return Some(ActionOutcome::InsufficientMp {
            required: mp_cost,
            available: actor.mp,
        });
    }
    let consumed = actor.slots.consume(slot);
    debug_assert!(consumed);
    let spent = actor.use_mp(mp_cost);
    debug_assert!(spent);
    None
}

/// Seed a typed pipeline context for an attack or spell against a target.
///
/// The resistance profile comes from the target's store, with status-granted
/// percent resistances (minimum per type) folded in as additional entries.
pub(crate) fn build_damage_context(
    session: &CombatSession,
    attacker_id: CombatantId,
    target_id: CombatantId,
    crit_ctx: &CritContext,
    damage_multiplier: f64,
    armor_penetration: f64,
) -> DamageContext {
    let attacker = &session.combatants[&attacker_id];
    let target = &session.combatants[&target_id];

    let mut profile = target.resistances.profile();
    let granted = session.status.get_resistances(&session.registry, target_id);
    for (damage_type, value) in granted {
        let totals = profile.entry(damage_type).or_default();
        totals.percent_resistance = (totals.percent_resistance + value).clamp(0.0, 1.0);
    }

    let mut context = DamageContext::new();
    context.defender_type = target.creature_type;
    context.effectiveness = Some(session.matrix.clone());
    context.resistance_profile = Some(profile);
    context.crit_immune =
        session
            .crit
            .is_immune(&session.registry, &session.status, target_id, crit_ctx);
    context.critical_multiplier = session.crit.critical_multiplier(attacker, crit_ctx);
    context.damage_multiplier = damage_multiplier;
    context.armor_penetration = armor_penetration;
    context
}

/// Run a damage event through the pipeline. A modifier failure logs and
/// converts the action into a spent no-op.
pub(crate) fn run_pipeline(
    session: &mut CombatSession,
    mut event: DamageEvent,
) -> Result<(DamageOutcome, bool, Option<i64>), ActionOutcome> {
    match session.pipeline.run(&mut event) {
        Ok(()) => {
            let outcome = event
                .result
                .take()
                .expect("pipeline completed without a result");
            Ok((outcome, event.delayed, event.delay_duration))
        }
        Err(reason) => {
            debug!("pipeline failed: {}", reason);
            session.push_log(LogEntry::PipelineFailed {
                actor_id: event.attacker_id,
                reason: reason.clone(),
            });
            Err(ActionOutcome::PipelineFailed { reason })
        }
    }
}

/// Apply final damage to a target: clamp HP, mark defeat, re-check
/// termination. Returns the damage actually dealt.
pub(crate) fn apply_damage(
    session: &mut CombatSession,
    target_id: CombatantId,
    total: i64,
) -> u32 {
    let target = session
        .combatants
        .get_mut(&target_id)
        .expect("damage target exists");
    let dealt = target.take_damage(total);
    if target.hp == 0 && !target.defeated {
        target.defeated = true;
        session.push_log(LogEntry::Defeated {
            participant_id: target_id,
        });
        session.check_termination();
    }
    dealt
}

/// Apply a feat's status condition to a target, honouring the feat's
/// duration override, and record it.
pub(crate) fn apply_feat_status(
    session: &mut CombatSession,
    feat: &FeatDefinition,
    target_id: CombatantId,
) -> Option<String> {
    let effect_id = feat.status_condition.as_deref()?;
    let now = session.clock;
    let registry = session.registry.clone();
    let instance = session
        .status
        .apply_effect(&registry, target_id, effect_id, now)?;
    if let Some(duration) = feat.effect_duration {
        session.status.override_duration(target_id, instance, duration);
    }
    let stacks = session.status.stacks(target_id, effect_id);
    session.push_log(LogEntry::StatusApplied {
        target_id,
        effect_id: effect_id.to_string(),
        stacks,
    });
    Some(effect_id.to_string())
}

/// Either land the pipeline result now or queue it as damage-over-time.
pub(crate) fn deliver_damage(
    session: &mut CombatSession,
    target_id: CombatantId,
    outcome: &DamageOutcome,
    delayed: bool,
    delay_duration: Option<i64>,
) {
    match delay_duration {
        Some(rounds) if delayed && rounds > 0 => {
            session.dot_queue.push(crate::session::DelayedDamage {
                target_id,
                composition: outcome.composition.clone(),
                remaining_rounds: rounds,
            });
        }
        _ => {
            apply_damage(session, target_id, outcome.total);
        }
    }
}

/// Attack bonus for a melee swing: skill plus strength modifier, then any
/// `attack` status modifiers.
pub(crate) fn melee_attack_bonus(session: &CombatSession, attacker_id: CombatantId) -> i32 {
    let attacker = &session.combatants[&attacker_id];
    let base =
        attacker.skills.melee_attack + ability_modifier(attacker.attributes.strength);
    session
        .status
        .calculate_modified_value(&session.registry, attacker_id, "attack", f64::from(base))
        .floor() as i32
}

/// Trigger registered critical side effects and apply what they produce.
pub(crate) fn trigger_crit_effects(
    session: &mut CombatSession,
    attacker_id: CombatantId,
    target_id: CombatantId,
    applied: &mut Vec<String>,
) {
    let effects = session.crit.trigger_effects(attacker_id, target_id);
    let registry = session.registry.clone();
    let now = session.clock;
    for effect in effects {
        let recipient = if effect.on_attacker {
            attacker_id
        } else {
            target_id
        };
        if session
            .status
            .apply_effect(&registry, recipient, &effect.effect_id, now)
            .is_some()
        {
            let stacks = session.status.stacks(recipient, &effect.effect_id);
            session.push_log(LogEntry::StatusApplied {
                target_id: recipient,
                effect_id: effect.effect_id.clone(),
                stacks,
            });
            applied.push(effect.effect_id);
        }
    }
}

/// The weapon profile an attack uses: feat id, base damage, type, bonus
/// composition. Falls back to the equipped weapon, then bare hands.
pub(crate) struct WeaponProfile {
    pub feat_id: Option<u32>,
    pub base_damage: f64,
    pub damage_type: DamageType,
    pub bonus_damage: Option<crate::model::damage::DamageComposition>,
}

pub(crate) fn attack_feat(
    session: &CombatSession,
    actor_id: CombatantId,
    weapon_id: Option<u32>,
) -> WeaponProfile {
    let actor = &session.combatants[&actor_id];
    match weapon_id.or(actor.weapon_id).and_then(|id| session.feats.get(id)) {
        Some(feat) => WeaponProfile {
            feat_id: Some(feat.id),
            base_damage: feat.base_damage.unwrap_or(DEFAULT_ATTACK_DAMAGE),
            damage_type: feat.damage_type.unwrap_or(DamageType::Physical),
            bonus_damage: feat.bonus_damage.clone(),
        },
        None => WeaponProfile {
            feat_id: None,
            base_damage: DEFAULT_ATTACK_DAMAGE,
            damage_type: DamageType::Physical,
            bonus_damage: None,
        },
    }
}

fn resolve_dodge(session: &mut CombatSession, actor_id: CombatantId) -> ActionOutcome {
    if let Some(outcome) = consume_slot_and_mp(session, actor_id, SlotKind::Action, 0) {
        return outcome;
    }
    let round = session.initiative.round_number();
    let actor = session.combatants.get_mut(&actor_id).expect("actor exists");
    actor.dodging_until_round = Some(round + 1);
    session.push_log(LogEntry::ActionResolved {
        actor_id,
        target_id: None,
        feat_id: None,
        slot: SlotKind::Action,
        composition: None,
        multiplier: 1.0,
        total_damage: 0,
        statuses_applied: vec!["dodging".to_string()],
    });
    ActionOutcome::Committed
}

/// A defeated combatant fights for its life: d20 against DC 10, a natural
/// 20 brings it back up with a single hit point.
fn resolve_death_save(session: &mut CombatSession, actor_id: CombatantId) -> ActionOutcome {
    let actor = &session.combatants[&actor_id];
    if !actor.defeated {
        return ActionOutcome::InvalidTarget {
            reason: "only a defeated combatant can make death saves".to_string(),
        };
    }
    let save = crate::dice::saving_throw(&mut session.rng, 0, 10, false, false);
    session.push_log(LogEntry::SavingThrow {
        target_id: actor_id,
        natural_roll: save.natural,
        total: save.total,
        dc: save.dc,
        success: save.success,
    });
    if save.natural == 20 {
        let actor = session.combatants.get_mut(&actor_id).expect("actor exists");
        actor.hp = 1;
        actor.defeated = false;
        session.push_log(LogEntry::HealingApplied {
            target_id: actor_id,
            amount: 1,
        });
    }
    ActionOutcome::Committed
}
