//! Opportunity attack triggering along movement paths.
//!
//! Each combatant gets at most one opportunity attack per round, tracked by
//! the `used_opportunity_attack` marker and cleared at round start. A
//! trigger fires when a mover leaves an attacker's reach: inside range at a
//! segment's start, outside at its end. Triggers execute in path-segment
//! order; execution itself lives in the movement resolver.

use std::collections::BTreeMap;

use crate::grid::HexCoord;
use crate::model::combatant::{Combatant, CombatantId, ReachWeaponKind};
use crate::reach;

/// Damage fraction for a standard opportunity attack.
pub const OPPORTUNITY_DAMAGE_MULTIPLIER: f64 = 0.75;

/// One triggered opportunity attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpportunityTrigger {
    pub attacker_id: CombatantId,
    /// Position the mover occupied when the attack triggered.
    pub trigger_position: HexCoord,
    /// Index of the path segment that provoked the attack.
    pub segment: usize,
}

/// Compute the opportunity attacks a movement path provokes, in segment
/// order. Attackers that are defeated, have spent their reaction, or have
/// already made an opportunity attack this round never trigger.
///
/// Each attacker appears at most once even if the path weaves through its
/// reach repeatedly.
pub fn check_triggers(
    combatants: &BTreeMap<CombatantId, Combatant>,
    mover_id: CombatantId,
    path: &[HexCoord],
) -> Vec<OpportunityTrigger> {
    if path.len() < 2 {
        return Vec::new();
    }

    let mut triggers: Vec<OpportunityTrigger> = Vec::new();
    for segment in 0..path.len() - 1 {
        let start = path[segment];
        let end = path[segment + 1];
        for attacker in combatants.values() {
            if attacker.id == mover_id || !attacker.can_make_opportunity_attack() {
                continue;
            }
            if triggers.iter().any(|t| t.attacker_id == attacker.id) {
                continue;
            }
            let range = reach::attack_range(attacker);
            let start_distance = attacker.position.distance(start);
            let end_distance = attacker.position.distance(end);
            if start_distance <= range && end_distance > range {
                triggers.push(OpportunityTrigger {
                    attacker_id: attacker.id,
                    trigger_position: start,
                    segment,
                });
            }
        }
    }
    triggers
}

/// Damage multiplier for an opportunity attack with the given weapon.
/// The spear is the exception: it strikes harder, not softer, on reactions.
pub fn damage_multiplier(weapon: Option<ReachWeaponKind>) -> f64 {
    match weapon {
        Some(ReachWeaponKind::Spear) => {
            reach::weapon_effects(weapon, reach::AttackKind::Opportunity).damage_multiplier
        }
        _ => OPPORTUNITY_DAMAGE_MULTIPLIER,
    }
}

/// Mark an attacker's opportunity attack as spent; consumes the reaction.
pub fn mark_used(attacker: &mut Combatant) {
    attacker.used_opportunity_attack = true;
    attacker.slots.reaction = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: CombatantId, q: i32, r: i32) -> Combatant {
        Combatant::new(id, &format!("c{}", id), 0, 20, HexCoord::new(q, r))
    }

    fn roster(combatants: Vec<Combatant>) -> BTreeMap<CombatantId, Combatant> {
        combatants.into_iter().map(|c| (c.id, c)).collect()
    }

    fn straight_path(len: i32) -> Vec<HexCoord> {
        (0..=len).map(|q| HexCoord::new(q, 0)).collect()
    }

    #[test]
    fn test_leaving_reach_triggers_once() {
        let combatants = roster(vec![place(1, 0, 0), place(2, 1, 0)]);
        let triggers = check_triggers(&combatants, 1, &straight_path(3));
        assert_eq!(triggers.len(), 1);
        // Attacker at (1,0), reach 1: the (2,0)->(3,0) segment moves the
        // mover from distance 1 to distance 2.
        assert_eq!(triggers[0].attacker_id, 2);
        assert_eq!(triggers[0].trigger_position, HexCoord::new(2, 0));
        assert_eq!(triggers[0].segment, 2);
    }

    #[test]
    fn test_used_marker_suppresses_trigger() {
        let mut combatants = roster(vec![place(1, 0, 0), place(2, 1, 0)]);
        mark_used(combatants.get_mut(&2).unwrap());
        assert!(check_triggers(&combatants, 1, &straight_path(3)).is_empty());
    }

    #[test]
    fn test_defeated_attacker_never_triggers() {
        let mut combatants = roster(vec![place(1, 0, 0), place(2, 1, 0)]);
        combatants.get_mut(&2).unwrap().defeated = true;
        assert!(check_triggers(&combatants, 1, &straight_path(3)).is_empty());
    }

    #[test]
    fn test_moving_within_reach_never_triggers() {
        let mut threat = place(2, 1, 0);
        threat.reach_weapon = Some(ReachWeaponKind::Pike);
        let combatants = roster(vec![place(1, 0, 0), threat]);
        // Pike reach 3: the whole path stays inside it.
        let triggers = check_triggers(&combatants, 1, &straight_path(3));
        assert!(triggers.is_empty());
    }

    #[test]
    fn test_reach_weapon_extends_trigger_distance() {
        let mut threat = place(2, 0, 1);
        threat.reach_weapon = Some(ReachWeaponKind::Spear);
        let combatants = roster(vec![place(1, 0, 0), threat]);
        let triggers = check_triggers(&combatants, 1, &straight_path(4));
        assert_eq!(triggers.len(), 1);
        // Spear reach 2: leaving happens on the (2,0)->(3,0) segment.
        assert_eq!(triggers[0].trigger_position, HexCoord::new(2, 0));
    }

    #[test]
    fn test_multiple_attackers_in_segment_order() {
        let combatants = roster(vec![place(1, 0, 0), place(2, 1, 0), place(3, 3, 0)]);
        let triggers = check_triggers(&combatants, 1, &straight_path(5));
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].attacker_id, 2);
        assert_eq!(triggers[1].attacker_id, 3);
        assert!(triggers[0].segment < triggers[1].segment);
    }

    #[test]
    fn test_damage_multipliers() {
        assert_eq!(damage_multiplier(None), 0.75);
        assert_eq!(damage_multiplier(Some(ReachWeaponKind::Halberd)), 0.75);
        assert_eq!(damage_multiplier(Some(ReachWeaponKind::Spear)), 1.5);
    }
}
