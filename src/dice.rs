//! d20 roll helpers: advantage/disadvantage resolution and saving throws.

use crate::rng::CombatRng;
use serde::{Deserialize, Serialize};

/// Outcome of a d20 roll after advantage/disadvantage resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct D20Roll {
    pub natural: u32,
    pub advantage: bool,
    pub disadvantage: bool,
}

/// Roll a d20 honouring advantage/disadvantage. Both present cancel out to a
/// normal roll; advantage takes the max of two dice, disadvantage the min.
pub fn roll_d20_with(rng: &mut CombatRng, advantage: bool, disadvantage: bool) -> D20Roll {
    let has_advantage = advantage && !disadvantage;
    let has_disadvantage = disadvantage && !advantage;

    let natural = if has_advantage {
        let roll1 = rng.roll_d20();
        let roll2 = rng.roll_d20();
        roll1.max(roll2)
    } else if has_disadvantage {
        let roll1 = rng.roll_d20();
        let roll2 = rng.roll_d20();
        roll1.min(roll2)
    } else {
        rng.roll_d20()
    };

    D20Roll {
        natural,
        advantage: has_advantage,
        disadvantage: has_disadvantage,
    }
}

/// Result of a saving throw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaveResult {
    pub natural: u32,
    pub total: i32,
    pub dc: i32,
    pub success: bool,
}

/// Roll a saving throw: `d20 + save_bonus` against a DC. A natural 20 always
/// succeeds and a natural 1 always fails, regardless of modifiers.
pub fn saving_throw(
    rng: &mut CombatRng,
    save_bonus: i32,
    dc: i32,
    advantage: bool,
    disadvantage: bool,
) -> SaveResult {
    let roll = roll_d20_with(rng, advantage, disadvantage);
    let natural = roll.natural;
    let total = natural as i32 + save_bonus;

    let success = match natural {
        20 => true,
        1 => false,
        _ => total >= dc,
    };

    SaveResult {
        natural,
        total,
        dc,
        success,
    }
}

/// Ability modifier: `(score - 10) / 2` with floor division, so a score of 9
/// gives -1 rather than 0.
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}
