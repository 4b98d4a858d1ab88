use serde::{Deserialize, Serialize};

use crate::grid::HexCoord;
use crate::resistance::ResistanceStore;

pub type CombatantId = u32;
pub type TeamId = u32;

/// Base ability scores. Modifiers derive as `(score - 10) / 2`, floored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// Learned combat skills and derived offensive/defensive numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatSkills {
    pub melee_attack: i32,
    pub ranged_attack: i32,
    pub magic_attack: i32,
    pub physical_defense: i32,
    pub magic_defense: i32,
    pub dodge: i32,
    /// Clamped into [0.01, 0.50] when resolved.
    pub critical_chance: f64,
    /// Never resolved below 1.0.
    pub critical_damage: f64,
}

impl Default for CombatSkills {
    fn default() -> Self {
        Self {
            melee_attack: 0,
            ranged_attack: 0,
            magic_attack: 0,
            physical_defense: 0,
            magic_defense: 0,
            dodge: 0,
            critical_chance: 0.05,
            critical_damage: 1.5,
        }
    }
}

/// The per-turn slot an action consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Action,
    Bonus,
    Movement,
    Free,
    Reaction,
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SlotKind::Action => "action",
            SlotKind::Bonus => "bonus",
            SlotKind::Movement => "movement",
            SlotKind::Free => "free",
            SlotKind::Reaction => "reaction",
        };
        f.write_str(s)
    }
}

/// Per-round action economy record. `free` permits two consumptions; every
/// other slot flips once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSlots {
    pub action: bool,
    pub bonus: bool,
    pub movement: bool,
    pub free: u8,
    pub reaction: bool,
}

impl ActionSlots {
    pub const MAX_FREE: u8 = 2;

    /// Whether the slot could be consumed without consuming it.
    pub fn available(&self, slot: SlotKind) -> bool {
        match slot {
            SlotKind::Action => !self.action,
            SlotKind::Bonus => !self.bonus,
            SlotKind::Movement => !self.movement,
            SlotKind::Free => self.free < Self::MAX_FREE,
            SlotKind::Reaction => !self.reaction,
        }
    }

    /// Consume a slot. Returns false (and changes nothing) if already spent.
    pub fn consume(&mut self, slot: SlotKind) -> bool {
        match slot {
            SlotKind::Action => {
                if self.action {
                    return false;
                }
                self.action = true;
            }
            SlotKind::Bonus => {
                if self.bonus {
                    return false;
                }
                self.bonus = true;
            }
            SlotKind::Movement => {
                if self.movement {
                    return false;
                }
                self.movement = true;
            }
            SlotKind::Free => {
                if self.free >= Self::MAX_FREE {
                    return false;
                }
                self.free += 1;
            }
            SlotKind::Reaction => {
                if self.reaction {
                    return false;
                }
                self.reaction = true;
            }
        }
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reach weapon classes with non-default threat ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReachWeaponKind {
    Spear,
    Halberd,
    Pike,
    Whip,
}

/// A participant in combat.
///
/// Combatants are owned by the session and referenced everywhere else by id.
/// Rich status effects live in the session's status system; the boolean
/// markers here (`defeated`, `used_opportunity_attack`, ...) are the cheap
/// per-combatant flags the rules consult constantly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub team: TeamId,
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub max_mp: u32,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub skills: CombatSkills,
    #[serde(default = "default_armor_class")]
    pub armor_class: i32,
    #[serde(default)]
    pub initiative_bonus: i32,
    #[serde(default)]
    pub resistances: ResistanceStore,
    /// Elemental affinity used as the defender type in the effectiveness
    /// matrix (an ice elemental takes doubled fire damage, and so on).
    #[serde(default)]
    pub creature_type: Option<crate::model::damage::DamageType>,
    pub position: HexCoord,
    #[serde(default)]
    pub facing: u8,
    #[serde(default = "default_movement")]
    pub movement_points: u32,
    /// Feat id of the equipped weapon, used by basic attacks and opportunity
    /// attacks.
    #[serde(default)]
    pub weapon_id: Option<u32>,
    #[serde(default)]
    pub reach_weapon: Option<ReachWeaponKind>,
    #[serde(default)]
    pub slots: ActionSlots,
    #[serde(default)]
    pub defeated: bool,
    #[serde(default)]
    pub used_opportunity_attack: bool,
    /// Round number until which incoming attacks roll with disadvantage.
    #[serde(default)]
    pub dodging_until_round: Option<u32>,
    /// Flanking is transient: recomputed before attacks and after movement.
    #[serde(default)]
    pub flanking: Option<FlankingStatus>,
}

fn default_armor_class() -> i32 {
    10
}

fn default_movement() -> u32 {
    6
}

/// Transient flanking marker: this combatant is flanking `target_id` and its
/// damage against that target is multiplied by `magnitude`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlankingStatus {
    pub target_id: CombatantId,
    pub magnitude: f64,
}

impl Combatant {
    pub fn new(id: CombatantId, name: &str, team: TeamId, hp: u32, position: HexCoord) -> Self {
        Self {
            id,
            name: name.to_string(),
            team,
            hp,
            max_hp: hp,
            mp: 0,
            max_mp: 0,
            attributes: Attributes::default(),
            skills: CombatSkills::default(),
            armor_class: default_armor_class(),
            initiative_bonus: 0,
            resistances: ResistanceStore::new(),
            creature_type: None,
            position,
            facing: 0,
            movement_points: default_movement(),
            weapon_id: None,
            reach_weapon: None,
            slots: ActionSlots::default(),
            defeated: false,
            used_opportunity_attack: false,
            dodging_until_round: None,
            flanking: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.defeated && self.hp > 0
    }

    /// Spend mana. Returns false without mutation when short.
    pub fn use_mp(&mut self, amount: u32) -> bool {
        if self.mp < amount {
            return false;
        }
        self.mp -= amount;
        true
    }

    /// Reduce HP, clamping at zero. Returns the damage actually dealt.
    pub fn take_damage(&mut self, amount: i64) -> u32 {
        let amount = amount.clamp(0, i64::from(u32::MAX)) as u32;
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        dealt
    }

    /// Restore HP up to the maximum. Returns the amount actually healed.
    pub fn heal(&mut self, amount: i64) -> u32 {
        let amount = amount.clamp(0, i64::from(u32::MAX)) as u32;
        let healed = amount.min(self.max_hp - self.hp);
        self.hp += healed;
        healed
    }

    pub fn can_make_opportunity_attack(&self) -> bool {
        self.is_alive() && !self.used_opportunity_attack && !self.slots.reaction
    }

    /// Reset per-round flags at the start of a new round.
    pub fn reset_round(&mut self) {
        self.slots.reset();
        self.used_opportunity_attack = false;
        self.flanking = None;
    }

    pub fn face_towards(&mut self, target: HexCoord) {
        self.facing = self.position.facing_towards(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_consumption_is_once_per_round() {
        let mut slots = ActionSlots::default();
        assert!(slots.consume(SlotKind::Action));
        assert!(!slots.consume(SlotKind::Action));
        assert!(slots.consume(SlotKind::Bonus));
        assert!(!slots.consume(SlotKind::Bonus));
        slots.reset();
        assert!(slots.consume(SlotKind::Action));
    }

    #[test]
    fn test_free_slot_allows_two() {
        let mut slots = ActionSlots::default();
        assert!(slots.consume(SlotKind::Free));
        assert!(slots.consume(SlotKind::Free));
        assert!(!slots.consume(SlotKind::Free));
    }

    #[test]
    fn test_take_damage_clamps_at_zero() {
        let mut c = Combatant::new(1, "test", 0, 10, HexCoord::new(0, 0));
        assert_eq!(c.take_damage(4), 4);
        assert_eq!(c.hp, 6);
        assert_eq!(c.take_damage(100), 6);
        assert_eq!(c.hp, 0);
        assert_eq!(c.take_damage(-5), 0);
    }

    #[test]
    fn test_heal_clamps_at_max() {
        let mut c = Combatant::new(1, "test", 0, 20, HexCoord::new(0, 0));
        c.hp = 5;
        assert_eq!(c.heal(10), 10);
        assert_eq!(c.heal(100), 5);
        assert_eq!(c.hp, 20);
    }

    #[test]
    fn test_mp_spend() {
        let mut c = Combatant::new(1, "caster", 0, 10, HexCoord::new(0, 0));
        c.mp = 3;
        c.max_mp = 10;
        assert!(!c.use_mp(4));
        assert_eq!(c.mp, 3);
        assert!(c.use_mp(3));
        assert_eq!(c.mp, 0);
    }

    #[test]
    fn test_round_reset_clears_markers() {
        let mut c = Combatant::new(1, "test", 0, 10, HexCoord::new(0, 0));
        c.slots.consume(SlotKind::Action);
        c.used_opportunity_attack = true;
        c.flanking = Some(FlankingStatus {
            target_id: 2,
            magnitude: 1.5,
        });
        c.reset_round();
        assert!(c.slots.available(SlotKind::Action));
        assert!(!c.used_opportunity_attack);
        assert!(c.flanking.is_none());
    }
}
