use serde::{Deserialize, Serialize};

use crate::grid::HexCoord;
use crate::model::combatant::{CombatantId, SlotKind};

/// An action submitted by the host for the current actor.
///
/// Wire encoding is a tagged union keyed by `kind`, matching the JSON shape
/// hosts produce: `{"kind": "attack", "actor_id": 1, "target_id": 2, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Attack {
        actor_id: CombatantId,
        target_id: CombatantId,
        /// Feat id of the weapon; the actor's equipped weapon when omitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weapon_id: Option<u32>,
        #[serde(default)]
        advantage: bool,
        #[serde(default)]
        disadvantage: bool,
    },
    Spell {
        actor_id: CombatantId,
        spell_id: u32,
        targets: Vec<CombatantId>,
        #[serde(default)]
        advantage: bool,
        #[serde(default)]
        disadvantage: bool,
        /// Overrides the catalog's mana cost when present (upcasting).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mp_cost: Option<u32>,
    },
    Move {
        actor_id: CombatantId,
        path: Vec<HexCoord>,
    },
    UseItem {
        actor_id: CombatantId,
        item_id: u32,
        targets: Vec<CombatantId>,
    },
    Ready {
        actor_id: CombatantId,
    },
    Delay {
        actor_id: CombatantId,
    },
    Dodge {
        actor_id: CombatantId,
    },
    DeathSave {
        actor_id: CombatantId,
    },
    EndTurn {
        actor_id: CombatantId,
    },
    Abort {
        actor_id: CombatantId,
    },
}

impl Action {
    pub fn actor_id(&self) -> CombatantId {
        match self {
            Action::Attack { actor_id, .. }
            | Action::Spell { actor_id, .. }
            | Action::Move { actor_id, .. }
            | Action::UseItem { actor_id, .. }
            | Action::Ready { actor_id }
            | Action::Delay { actor_id }
            | Action::Dodge { actor_id }
            | Action::DeathSave { actor_id }
            | Action::EndTurn { actor_id }
            | Action::Abort { actor_id } => *actor_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Attack { .. } => "attack",
            Action::Spell { .. } => "spell",
            Action::Move { .. } => "move",
            Action::UseItem { .. } => "use_item",
            Action::Ready { .. } => "ready",
            Action::Delay { .. } => "delay",
            Action::Dodge { .. } => "dodge",
            Action::DeathSave { .. } => "death_save",
            Action::EndTurn { .. } => "end_turn",
            Action::Abort { .. } => "abort",
        }
    }
}

/// How an action resolved. Rule failures are outcomes, not errors: the host
/// learns why and the session state (except for a spent action on pipeline
/// failure) is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Committed,
    SlotUsed {
        slot: SlotKind,
    },
    InsufficientMp {
        required: u32,
        available: u32,
    },
    InvalidTarget {
        reason: String,
    },
    NoLineOfSight,
    PipelineFailed {
        reason: String,
    },
    DefeatedMidMove,
    Terminated,
}

impl ActionOutcome {
    /// Whether the action spent the actor's turn (the session advances the
    /// tracker after these).
    pub fn spends_turn(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Committed
                | ActionOutcome::PipelineFailed { .. }
                | ActionOutcome::DefeatedMidMove
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_wire_shape() {
        let action: Action = serde_json::from_value(serde_json::json!({
            "kind": "attack",
            "actor_id": 1,
            "target_id": 2,
            "weapon_id": 10
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::Attack {
                actor_id: 1,
                target_id: 2,
                weapon_id: Some(10),
                advantage: false,
                disadvantage: false,
            }
        );
        assert_eq!(action.actor_id(), 1);
        assert_eq!(action.kind(), "attack");
    }

    #[test]
    fn test_move_path_wire_shape() {
        let action: Action = serde_json::from_value(serde_json::json!({
            "kind": "move",
            "actor_id": 3,
            "path": [[0, 0], [1, 0], [2, 0]]
        }))
        .unwrap();
        match action {
            Action::Move { actor_id, path } => {
                assert_eq!(actor_id, 3);
                assert_eq!(path.len(), 3);
                assert_eq!(path[2], HexCoord::new(2, 0));
            }
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<Action, _> = serde_json::from_value(serde_json::json!({
            "kind": "teleport",
            "actor_id": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_outcome_wire_shape() {
        let outcome = ActionOutcome::InsufficientMp {
            required: 5,
            available: 2,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "insufficient_mp");
        assert_eq!(json["required"], 5);
    }

    #[test]
    fn test_turn_spending_outcomes() {
        assert!(ActionOutcome::Committed.spends_turn());
        assert!(ActionOutcome::PipelineFailed {
            reason: "x".into()
        }
        .spends_turn());
        assert!(!ActionOutcome::SlotUsed {
            slot: SlotKind::Action
        }
        .spends_turn());
        assert!(!ActionOutcome::NoLineOfSight.spends_turn());
    }
}
