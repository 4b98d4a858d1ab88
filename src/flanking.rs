//! Flanking detection and the transient bonuses it grants.
//!
//! A combatant flanks a target when it and a partner stand adjacent to the
//! target on exactly opposite sides. Flanking markers are transient: they
//! are recomputed for a target before any attack on it and for everyone
//! after any movement, so stale markers never survive a position change.

use std::collections::BTreeMap;

use crate::grid::HexCoord;
use crate::model::combatant::{Combatant, CombatantId, FlankingStatus};

/// Damage multiplier a flanker enjoys against the flanked target.
pub const FLANKING_MAGNITUDE: f64 = 1.5;

/// True when `a` and `b` occupy exactly opposite hexes adjacent to `target`.
pub fn is_flanking_pair(a: HexCoord, b: HexCoord, target: HexCoord) -> bool {
    if a.distance(target) != 1 || b.distance(target) != 1 {
        return false;
    }
    a.q + b.q == 2 * target.q && a.r + b.r == 2 * target.r
}

/// Ids of every combatant flanking `target_id` with some partner. Both
/// members of each opposing pair count as flankers.
pub fn flanking_participants(
    combatants: &BTreeMap<CombatantId, Combatant>,
    target_id: CombatantId,
) -> Vec<CombatantId> {
    let Some(target) = combatants.get(&target_id) else {
        return Vec::new();
    };

    let mut flankers = Vec::new();
    let others: Vec<&Combatant> = combatants
        .values()
        .filter(|c| c.id != target_id && c.is_alive())
        .collect();

    for first in &others {
        for second in &others {
            if second.id <= first.id {
                continue;
            }
            if is_flanking_pair(first.position, second.position, target.position) {
                if !flankers.contains(&first.id) {
                    flankers.push(first.id);
                }
                if !flankers.contains(&second.id) {
                    flankers.push(second.id);
                }
            }
        }
    }
    flankers.sort_unstable();
    flankers
}

/// Recompute flanking for one target: strip every marker scoped to it, then
/// install fresh markers on the current flankers. Returns the new flanker
/// set when it changed, for logging.
pub fn refresh_flanking(
    combatants: &mut BTreeMap<CombatantId, Combatant>,
    target_id: CombatantId,
) -> Option<Vec<CombatantId>> {
    let flankers = flanking_participants(combatants, target_id);

    let mut changed = false;
    for combatant in combatants.values_mut() {
        let currently = combatant
            .flanking
            .map_or(false, |f| f.target_id == target_id);
        let should = flankers.contains(&combatant.id);
        if currently != should {
            changed = true;
        }
        if currently && !should {
            combatant.flanking = None;
        } else if should {
            combatant.flanking = Some(FlankingStatus {
                target_id,
                magnitude: FLANKING_MAGNITUDE,
            });
        }
    }

    changed.then_some(flankers)
}

/// Recompute flanking against every living combatant, called after movement.
pub fn refresh_all(
    combatants: &mut BTreeMap<CombatantId, Combatant>,
) -> Vec<(CombatantId, Vec<CombatantId>)> {
    let ids: Vec<CombatantId> = combatants.keys().copied().collect();
    let mut changes = Vec::new();
    for target_id in ids {
        if let Some(flankers) = refresh_flanking(combatants, target_id) {
            changes.push((target_id, flankers));
        }
    }
    changes
}

/// The damage multiplier `attacker` gets against `target_id` from flanking.
pub fn flanking_multiplier(attacker: &Combatant, target_id: CombatantId) -> f64 {
    match attacker.flanking {
        Some(status) if status.target_id == target_id => status.magnitude,
        _ => 1.0,
    }
}
