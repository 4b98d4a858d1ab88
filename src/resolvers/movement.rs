//! Movement resolution: path validation, opportunity attacks along the way,
//! occupancy and flanking updates.

use crate::action_resolver::{consume_slot_and_mp, peek_slot_and_mp};
use crate::events::LogEntry;
use crate::flanking;
use crate::grid::HexCoord;
use crate::model::action::ActionOutcome;
use crate::model::combatant::{CombatantId, SlotKind};
use crate::opportunity;
use crate::resolvers::attack::execute_opportunity_attack;
use crate::session::CombatSession;

pub(crate) fn resolve_move(
    session: &mut CombatSession,
    actor_id: CombatantId,
    path: &[HexCoord],
) -> ActionOutcome {
    let actor = &session.combatants[&actor_id];
    let start = actor.position;

    if path.first() != Some(&start) {
        return ActionOutcome::InvalidTarget {
            reason: "path must start at the mover's position".to_string(),
        };
    }
    if path.len() < 2 {
        return ActionOutcome::InvalidTarget {
            reason: "path has no steps".to_string(),
        };
    }
    if let Some(outcome) = peek_slot_and_mp(session, actor_id, SlotKind::Movement, 0) {
        return outcome;
    }

    // Walk the path: every step adjacent, passable, unoccupied, and inside
    // the movement budget. Difficult terrain halves the budget on entry.
    let mut budget = session.movement_budget(actor) as i64;
    for window in path.windows(2) {
        let (from, to) = (window[0], window[1]);
        if from.distance(to) != 1 {
            return ActionOutcome::InvalidTarget {
                reason: "path steps must be adjacent hexes".to_string(),
            };
        }
        let terrain = session.grid.terrain(to);
        if terrain.impassable {
            return ActionOutcome::InvalidTarget {
                reason: "path crosses impassable terrain".to_string(),
            };
        }
        if session.grid.is_occupied(to) {
            return ActionOutcome::InvalidTarget {
                reason: "path crosses an occupied hex".to_string(),
            };
        }
        budget -= 1;
        if budget < 0 {
            return ActionOutcome::InvalidTarget {
                reason: "path exceeds movement budget".to_string(),
            };
        }
        if terrain.difficult {
            budget /= 2;
        }
    }

    if let Some(outcome) = consume_slot_and_mp(session, actor_id, SlotKind::Movement, 0) {
        return outcome;
    }

    // Opportunity attacks trigger in path-segment order; one defeating the
    // mover strands it at the trigger hex.
    let triggers = opportunity::check_triggers(&session.combatants, actor_id, path);
    for trigger in triggers {
        session.push_log(LogEntry::OpportunityTriggered {
            attacker_id: trigger.attacker_id,
            mover_id: actor_id,
            trigger_position: trigger.trigger_position,
        });
        execute_opportunity_attack(session, trigger.attacker_id, actor_id);

        if !session.combatants[&actor_id].is_alive() {
            finish_move(session, actor_id, start, trigger.trigger_position, path);
            return ActionOutcome::DefeatedMidMove;
        }
    }

    let destination = *path.last().expect("non-empty path");
    finish_move(session, actor_id, start, destination, path);
    ActionOutcome::Committed
}

/// Land the mover on its final hex, update facing along the last travelled
/// segment, and refresh flanking for everyone.
fn finish_move(
    session: &mut CombatSession,
    actor_id: CombatantId,
    start: HexCoord,
    destination: HexCoord,
    path: &[HexCoord],
) {
    if destination != start {
        session.grid.move_occupant(start, destination, actor_id);
        let facing = path
            .iter()
            .position(|&p| p == destination)
            .and_then(|idx| idx.checked_sub(1))
            .map(|prev| path[prev].facing_towards(destination));
        let actor = session.combatants.get_mut(&actor_id).expect("mover exists");
        actor.position = destination;
        if let Some(facing) = facing {
            actor.facing = facing;
        }
        session.push_log(LogEntry::Moved {
            mover_id: actor_id,
            from: start,
            to: destination,
        });
    }

    for (target_id, flankers) in flanking::refresh_all(&mut session.combatants) {
        session.push_log(LogEntry::FlankingChanged {
            target_id,
            flankers,
        });
    }
}
