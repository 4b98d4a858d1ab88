//! Append-only combat log records.
//!
//! Every `step` appends zero or more entries; the session hands the delta to
//! the host alongside the outcome. Entries are plain data and serialize with
//! the rest of the session state.

use serde::{Deserialize, Serialize};

use crate::grid::HexCoord;
use crate::model::combatant::{CombatantId, SlotKind, TeamId};
use crate::model::damage::DamageComposition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    InitiativeRolled {
        participant_id: CombatantId,
        base_roll: u32,
        dexterity_mod: i32,
        bonus: i32,
        total: i32,
    },
    RoundStarted {
        round: u32,
    },
    TurnStarted {
        participant_id: CombatantId,
        round: u32,
    },
    ActionAttempted {
        actor_id: CombatantId,
        kind: String,
    },
    ActionResolved {
        actor_id: CombatantId,
        target_id: Option<CombatantId>,
        feat_id: Option<u32>,
        slot: SlotKind,
        composition: Option<DamageComposition>,
        multiplier: f64,
        total_damage: i64,
        statuses_applied: Vec<String>,
    },
    AttackMissed {
        attacker_id: CombatantId,
        target_id: CombatantId,
        natural_roll: u32,
        total_roll: i32,
        target_ac: i32,
        fumble: bool,
    },
    SavingThrow {
        target_id: CombatantId,
        natural_roll: u32,
        total: i32,
        dc: i32,
        success: bool,
    },
    Moved {
        mover_id: CombatantId,
        from: HexCoord,
        to: HexCoord,
    },
    OpportunityTriggered {
        attacker_id: CombatantId,
        mover_id: CombatantId,
        trigger_position: HexCoord,
    },
    OpportunityResolved {
        attacker_id: CombatantId,
        mover_id: CombatantId,
        damage: i64,
        mover_remaining_hp: u32,
    },
    StatusApplied {
        target_id: CombatantId,
        effect_id: String,
        stacks: u32,
    },
    StatusExpired {
        target_id: CombatantId,
        effect_id: String,
    },
    FlankingChanged {
        target_id: CombatantId,
        flankers: Vec<CombatantId>,
    },
    HealingApplied {
        target_id: CombatantId,
        amount: u32,
    },
    DamageOverTime {
        target_id: CombatantId,
        composition: DamageComposition,
        total: i64,
    },
    PipelineFailed {
        actor_id: CombatantId,
        reason: String,
    },
    Defeated {
        participant_id: CombatantId,
    },
    CombatEnded {
        winning_team: Option<TeamId>,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::damage::DamageType;

    #[test]
    fn test_log_entry_wire_shape() {
        let entry = LogEntry::ActionResolved {
            actor_id: 1,
            target_id: Some(2),
            feat_id: Some(10),
            slot: SlotKind::Action,
            composition: Some(DamageComposition::of(DamageType::Physical, 10.0)),
            multiplier: 1.0,
            total_damage: 10,
            statuses_applied: vec![],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "action_resolved");
        assert_eq!(json["composition"]["physical"], 10.0);

        let back: LogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_combat_ended_roundtrip() {
        let entry = LogEntry::CombatEnded {
            winning_team: Some(0),
            reason: "last team standing".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
