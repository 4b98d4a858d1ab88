//! Weapon reach: attack ranges, minimum range, threatened hexes, and the
//! per-weapon-type bonus table.

use serde::{Deserialize, Serialize};

use crate::grid::{HexCoord, HexGrid};
use crate::model::combatant::{Combatant, ReachWeaponKind};

/// The kind of attack being made, for weapon-effect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackKind {
    Standard,
    Opportunity,
    Charge,
}

/// Modifiers a reach weapon contributes to an attack. Values are fixed per
/// weapon type; see `weapon_effects`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponEffects {
    pub damage_multiplier: f64,
    pub armor_penetration: f64,
    pub critical_range_bonus: u32,
    pub status_effect_chance: f64,
    pub pull_strength: u32,
}

impl Default for WeaponEffects {
    fn default() -> Self {
        Self {
            damage_multiplier: 1.0,
            armor_penetration: 0.0,
            critical_range_bonus: 0,
            status_effect_chance: 0.0,
            pull_strength: 0,
        }
    }
}

/// Why a target cannot be attacked from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReachViolation {
    OutOfRange { distance: u32, range: u32 },
    TooClose,
    NoLineOfSight,
}

impl std::fmt::Display for ReachViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReachViolation::OutOfRange { distance, range } => write!(
                f,
                "Target is out of range ({} hexes, range is {})",
                distance, range
            ),
            ReachViolation::TooClose => write!(f, "Target is too close for this reach weapon"),
            ReachViolation::NoLineOfSight => write!(f, "No clear line of sight to target"),
        }
    }
}

/// Attack range in hexes for a combatant's equipped reach weapon.
pub fn attack_range(combatant: &Combatant) -> u32 {
    match combatant.reach_weapon {
        None => 1,
        Some(ReachWeaponKind::Spear) => 2,
        Some(ReachWeaponKind::Halberd) => 2,
        Some(ReachWeaponKind::Pike) => 3,
        Some(ReachWeaponKind::Whip) => 2,
    }
}

/// Only the pike cannot strike adjacent targets.
pub fn has_minimum_range(combatant: &Combatant) -> bool {
    combatant.reach_weapon == Some(ReachWeaponKind::Pike)
}

/// Validate an attack from `attacker` against a target position: distance,
/// minimum range, and line of sight, in that order.
pub fn check_attack_valid(
    grid: &HexGrid,
    attacker: &Combatant,
    target_position: HexCoord,
) -> Result<(), ReachViolation> {
    let range = attack_range(attacker);
    let distance = attacker.position.distance(target_position);

    if distance > range {
        return Err(ReachViolation::OutOfRange { distance, range });
    }
    if has_minimum_range(attacker) && distance < 2 {
        return Err(ReachViolation::TooClose);
    }
    if !grid.line_of_sight(attacker.position, target_position) {
        return Err(ReachViolation::NoLineOfSight);
    }
    Ok(())
}

/// All hexes this combatant threatens: within range, line of sight from its
/// position, and outside any minimum range.
pub fn threatened_hexes(grid: &HexGrid, combatant: &Combatant) -> Vec<HexCoord> {
    let range = attack_range(combatant) as i32;
    let minimum = has_minimum_range(combatant);
    let pos = combatant.position;

    let mut threatened = Vec::new();
    for dq in -range..=range {
        for dr in -range..=range {
            let candidate = HexCoord::new(pos.q + dq, pos.r + dr);
            let distance = pos.distance(candidate);
            if distance == 0 || distance > range as u32 {
                continue;
            }
            if minimum && distance < 2 {
                continue;
            }
            if grid.line_of_sight(pos, candidate) {
                threatened.push(candidate);
            }
        }
    }
    threatened
}

/// The fixed per-weapon bonus table.
pub fn weapon_effects(weapon: Option<ReachWeaponKind>, attack_kind: AttackKind) -> WeaponEffects {
    let mut effects = WeaponEffects::default();
    match weapon {
        None => {}
        Some(ReachWeaponKind::Spear) => {
            effects.damage_multiplier = 1.2;
            if attack_kind == AttackKind::Opportunity {
                effects.damage_multiplier = 1.5;
            }
        }
        Some(ReachWeaponKind::Halberd) => {
            effects.armor_penetration = 0.2;
            if attack_kind == AttackKind::Charge {
                effects.damage_multiplier = 1.3;
            }
        }
        Some(ReachWeaponKind::Pike) => {
            effects.damage_multiplier = 1.1;
            effects.critical_range_bonus = 1;
        }
        Some(ReachWeaponKind::Whip) => {
            effects.status_effect_chance = 0.2;
            effects.pull_strength = 1;
        }
    }
    effects
}
