//! Attack, spell, and item resolution.
//!
//! All damage flows through the pipeline; these functions validate the
//! target geometry, run the slot/mana preamble, seed the pipeline context,
//! and turn the result into log entries and state changes.

use crate::action_resolver::{
    apply_feat_status, attack_feat, build_damage_context, consume_slot_and_mp, deliver_damage,
    melee_attack_bonus, peek_slot_and_mp, run_pipeline, trigger_crit_effects,
};
use crate::config::{FeatDefinition, TargetKind};
use crate::critical::CritContext;
use crate::dice;
use crate::events::LogEntry;
use crate::flanking;
use crate::model::action::ActionOutcome;
use crate::model::combatant::{CombatantId, SlotKind};
use crate::pipeline::{DamageContext, DamageEvent, DamageValue};
use crate::reach::{self, AttackKind, ReachViolation};
use crate::session::CombatSession;

pub(crate) fn resolve_attack(
    session: &mut CombatSession,
    actor_id: CombatantId,
    target_id: CombatantId,
    weapon_id: Option<u32>,
    advantage: bool,
    disadvantage: bool,
) -> ActionOutcome {
    if target_id == actor_id {
        return ActionOutcome::InvalidTarget {
            reason: "cannot attack self".to_string(),
        };
    }
    let target = &session.combatants[&target_id];
    if !target.is_alive() {
        return ActionOutcome::InvalidTarget {
            reason: "target is already defeated".to_string(),
        };
    }
    let target_position = target.position;
    let target_ac = target.armor_class;
    let round = session.round_number();
    let target_dodging = target
        .dodging_until_round
        .map_or(false, |until| until >= round);

    // Slot and mana availability are checked first, but only committed once
    // the target geometry holds up.
    let profile = attack_feat(session, actor_id, weapon_id);
    let (slot, mp_cost) = match profile.feat_id.and_then(|id| session.feats.get(id)) {
        Some(feat) if feat.combat_irrelevant => {
            return ActionOutcome::InvalidTarget {
                reason: "feat is not usable in combat".to_string(),
            }
        }
        Some(feat) => (feat.action_type, feat.mp_cost),
        None => (SlotKind::Action, 0),
    };
    if let Some(outcome) = peek_slot_and_mp(session, actor_id, slot, mp_cost) {
        return outcome;
    }

    let actor = &session.combatants[&actor_id];
    if let Err(violation) = reach::check_attack_valid(&session.grid, actor, target_position) {
        return match violation {
            ReachViolation::NoLineOfSight => ActionOutcome::NoLineOfSight,
            other => ActionOutcome::InvalidTarget {
                reason: other.to_string(),
            },
        };
    }

    if let Some(outcome) = consume_slot_and_mp(session, actor_id, slot, mp_cost) {
        return outcome;
    }

    // Pre-attack flanking update on the target.
    if let Some(flankers) = flanking::refresh_flanking(&mut session.combatants, target_id) {
        session.push_log(LogEntry::FlankingChanged { target_id, flankers });
    }

    let weapon_kind = session.combatants[&actor_id].reach_weapon;
    let effects = reach::weapon_effects(weapon_kind, AttackKind::Standard);
    let crit_ctx = CritContext {
        critical_range_bonus: effects.critical_range_bonus,
        ..Default::default()
    };

    let roll = dice::roll_d20_with(&mut session.rng, advantage, disadvantage || target_dodging);
    let natural = roll.natural;
    let fumble = natural == 1;
    let attack_bonus = melee_attack_bonus(session, actor_id);
    let total_roll = natural as i32 + attack_bonus;

    let is_critical = !fumble
        && session.crit.confirm_critical(
            &mut session.rng,
            &session.combatants[&actor_id],
            natural,
            &crit_ctx,
        );
    let hit = !fumble && total_roll >= target_ac;

    if let Some(actor) = session.combatants.get_mut(&actor_id) {
        actor.face_towards(target_position);
    }

    if !hit {
        session.push_log(LogEntry::AttackMissed {
            attacker_id: actor_id,
            target_id,
            natural_roll: natural,
            total_roll,
            target_ac,
            fumble,
        });
        return ActionOutcome::Committed;
    }

    let flanking_multiplier = flanking::flanking_multiplier(&session.combatants[&actor_id], target_id);
    let mut context = build_damage_context(
        session,
        actor_id,
        target_id,
        &crit_ctx,
        effects.damage_multiplier,
        effects.armor_penetration,
    );
    context.flanking_multiplier = flanking_multiplier;

    let mut event = DamageEvent::new(
        actor_id,
        target_id,
        DamageValue::Scalar(profile.base_damage),
        Some(profile.damage_type),
        is_critical,
        context,
    );
    event.bonus_damage = profile.bonus_damage.clone();

    let (damage, delayed, delay_duration) = match run_pipeline(session, event) {
        Ok(result) => result,
        Err(outcome) => return outcome,
    };
    deliver_damage(session, target_id, &damage, delayed, delay_duration);

    let mut statuses_applied = Vec::new();
    if is_critical {
        trigger_crit_effects(session, actor_id, target_id, &mut statuses_applied);
    }
    if let Some(feat) = profile.feat_id.and_then(|id| session.feats.get(id)).cloned() {
        if let Some(effect_id) = apply_feat_status(session, &feat, target_id) {
            statuses_applied.push(effect_id);
        }
    }

    session.push_log(LogEntry::ActionResolved {
        actor_id,
        target_id: Some(target_id),
        feat_id: profile.feat_id,
        slot,
        composition: Some(damage.composition.clone()),
        multiplier: damage.multiplier,
        total_damage: damage.total,
        statuses_applied,
    });
    ActionOutcome::Committed
}

pub(crate) fn resolve_spell(
    session: &mut CombatSession,
    actor_id: CombatantId,
    spell_id: u32,
    targets: &[CombatantId],
    advantage: bool,
    disadvantage: bool,
    mp_cost: Option<u32>,
) -> ActionOutcome {
    let feat = session.feats.get(spell_id).expect("validated feat").clone();
    if feat.combat_irrelevant {
        return ActionOutcome::InvalidTarget {
            reason: "feat is not usable in combat".to_string(),
        };
    }
    let actor = &session.combatants[&actor_id];
    if feat.requires_weapon && actor.weapon_id.is_none() {
        return ActionOutcome::InvalidTarget {
            reason: "feat requires an equipped weapon".to_string(),
        };
    }
    let actor_position = actor.position;
    let actor_team = actor.team;

    let cost = mp_cost.unwrap_or(feat.mp_cost);
    if let Some(outcome) = peek_slot_and_mp(session, actor_id, feat.action_type, cost) {
        return outcome;
    }

    for &target_id in targets {
        let target = &session.combatants[&target_id];
        if !target.is_alive() {
            return ActionOutcome::InvalidTarget {
                reason: format!("target {} is already defeated", target_id),
            };
        }
        match feat.target.kind {
            TargetKind::Enemy if target.team == actor_team => {
                return ActionOutcome::InvalidTarget {
                    reason: "feat may only target enemies".to_string(),
                }
            }
            TargetKind::Ally if target.team != actor_team => {
                return ActionOutcome::InvalidTarget {
                    reason: "feat may only target allies".to_string(),
                }
            }
            TargetKind::SelfOnly if target_id != actor_id => {
                return ActionOutcome::InvalidTarget {
                    reason: "feat may only target self".to_string(),
                }
            }
            _ => {}
        }
        if !session.grid.line_of_sight(actor_position, target.position) {
            return ActionOutcome::NoLineOfSight;
        }
    }

    if let Some(outcome) = consume_slot_and_mp(session, actor_id, feat.action_type, cost) {
        return outcome;
    }

    for &target_id in targets {
        if let Some(flankers) = flanking::refresh_flanking(&mut session.combatants, target_id) {
            session.push_log(LogEntry::FlankingChanged { target_id, flankers });
        }

        // Saving throw when the spell allows one.
        let mut saved = false;
        if let Some(dc) = feat.save_dc {
            let target = &session.combatants[&target_id];
            let save_bonus = target.skills.magic_defense
                + dice::ability_modifier(target.attributes.wisdom);
            let save = dice::saving_throw(&mut session.rng, save_bonus, dc, advantage, disadvantage);
            session.push_log(LogEntry::SavingThrow {
                target_id,
                natural_roll: save.natural,
                total: save.total,
                dc: save.dc,
                success: save.success,
            });
            saved = save.success;
            if saved && !feat.half_on_save {
                continue;
            }
        }

        let mut statuses_applied = Vec::new();
        let mut composition = None;
        let mut multiplier = 1.0;
        let mut total_damage = 0;

        if let Some(base) = feat.base_damage {
            let mut context = build_damage_context(
                session,
                actor_id,
                target_id,
                &CritContext::default(),
                1.0,
                0.0,
            );
            if saved {
                context.damage_multiplier *= 0.5;
            }
            let mut event = DamageEvent::new(
                actor_id,
                target_id,
                DamageValue::Scalar(base),
                feat.damage_type,
                false,
                context,
            );
            event.bonus_damage = feat.bonus_damage.clone();

            match run_pipeline(session, event) {
                Ok((damage, delayed, delay_duration)) => {
                    deliver_damage(session, target_id, &damage, delayed, delay_duration);
                    multiplier = damage.multiplier;
                    total_damage = damage.total;
                    composition = Some(damage.composition);
                }
                Err(outcome) => return outcome,
            }
        }

        apply_healing(session, &feat, target_id);
        if !saved {
            if let Some(effect_id) = apply_feat_status(session, &feat, target_id) {
                statuses_applied.push(effect_id);
            }
        }

        session.push_log(LogEntry::ActionResolved {
            actor_id,
            target_id: Some(target_id),
            feat_id: Some(spell_id),
            slot: feat.action_type,
            composition,
            multiplier,
            total_damage,
            statuses_applied,
        });
    }

    ActionOutcome::Committed
}

pub(crate) fn resolve_item(
    session: &mut CombatSession,
    actor_id: CombatantId,
    item_id: u32,
    targets: &[CombatantId],
) -> ActionOutcome {
    let feat = session.feats.get(item_id).expect("validated feat").clone();
    if feat.combat_irrelevant {
        return ActionOutcome::InvalidTarget {
            reason: "feat is not usable in combat".to_string(),
        };
    }

    if let Some(outcome) = peek_slot_and_mp(session, actor_id, feat.action_type, feat.mp_cost) {
        return outcome;
    }

    // An item with no explicit targets is used on oneself.
    let targets: Vec<CombatantId> = if targets.is_empty() {
        vec![actor_id]
    } else {
        targets.to_vec()
    };
    for &target_id in &targets {
        if !session.combatants[&target_id].is_alive() {
            return ActionOutcome::InvalidTarget {
                reason: format!("target {} is already defeated", target_id),
            };
        }
    }

    if let Some(outcome) = consume_slot_and_mp(session, actor_id, feat.action_type, feat.mp_cost) {
        return outcome;
    }

    for &target_id in &targets {
        let mut statuses_applied = Vec::new();
        let mut composition = None;
        let mut total_damage = 0;

        if let Some(base) = feat.base_damage {
            let context = build_damage_context(
                session,
                actor_id,
                target_id,
                &CritContext::default(),
                1.0,
                0.0,
            );
            let mut event = DamageEvent::new(
                actor_id,
                target_id,
                DamageValue::Scalar(base),
                feat.damage_type,
                false,
                context,
            );
            event.bonus_damage = feat.bonus_damage.clone();
            match run_pipeline(session, event) {
                Ok((damage, delayed, delay_duration)) => {
                    deliver_damage(session, target_id, &damage, delayed, delay_duration);
                    total_damage = damage.total;
                    composition = Some(damage.composition);
                }
                Err(outcome) => return outcome,
            }
        }

        apply_healing(session, &feat, target_id);
        if let Some(effect_id) = apply_feat_status(session, &feat, target_id) {
            statuses_applied.push(effect_id);
        }

        session.push_log(LogEntry::ActionResolved {
            actor_id,
            target_id: Some(target_id),
            feat_id: Some(item_id),
            slot: feat.action_type,
            composition,
            multiplier: 1.0,
            total_damage,
            statuses_applied,
        });
    }

    ActionOutcome::Committed
}

/// Healing from a feat: base healing scaled by the target's
/// `healing_received` modifiers, floored, clamped to max HP.
pub(crate) fn apply_healing(
    session: &mut CombatSession,
    feat: &FeatDefinition,
    target_id: CombatantId,
) {
    let Some(base) = feat.base_healing else {
        return;
    };
    let healing_mod = session.status.calculate_modified_value(
        &session.registry,
        target_id,
        "healing_received",
        0.0,
    );
    let total = (base * (1.0 + healing_mod)).floor().max(0.0) as i64;
    let target = session
        .combatants
        .get_mut(&target_id)
        .expect("healing target exists");
    let healed = target.heal(total);
    if healed > 0 {
        session.push_log(LogEntry::HealingApplied {
            target_id,
            amount: healed,
        });
    }
}

/// Execute one opportunity attack against a mover. Damage runs through the
/// pipeline at the opportunity multiplier; the reaction is spent whether or
/// not the pipeline succeeds.
pub(crate) fn execute_opportunity_attack(
    session: &mut CombatSession,
    attacker_id: CombatantId,
    mover_id: CombatantId,
) {
    let weapon_kind = session.combatants[&attacker_id].reach_weapon;
    let profile = attack_feat(session, attacker_id, None);
    let effects = reach::weapon_effects(weapon_kind, AttackKind::Opportunity);
    let multiplier = crate::opportunity::damage_multiplier(weapon_kind);

    let context: DamageContext = build_damage_context(
        session,
        attacker_id,
        mover_id,
        &CritContext::default(),
        multiplier,
        effects.armor_penetration,
    );
    let mut event = DamageEvent::new(
        attacker_id,
        mover_id,
        DamageValue::Scalar(profile.base_damage),
        Some(profile.damage_type),
        false,
        context,
    );
    event.bonus_damage = profile.bonus_damage;

    crate::opportunity::mark_used(
        session
            .combatants
            .get_mut(&attacker_id)
            .expect("attacker exists"),
    );

    if let Ok((damage, delayed, delay_duration)) = run_pipeline(session, event) {
        deliver_damage(session, mover_id, &damage, delayed, delay_duration);
        let remaining = session.combatants[&mover_id].hp;
        session.push_log(LogEntry::OpportunityResolved {
            attacker_id,
            mover_id,
            damage: damage.total,
            mover_remaining_hp: remaining,
        });
    }
}
