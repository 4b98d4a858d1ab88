//! Initiative order, turn advancement, and ready/delay handling.
//!
//! Initiative is `d20 + dexterity modifier + bonus`, ordered descending with
//! dexterity as the tiebreaker and insertion order after that. The tracker
//! owns the ordered id sequence plus the round/turn counters; every roll
//! flows through the session RNG so equal seeds reproduce equal orders.

use serde::{Deserialize, Serialize};

use crate::dice::ability_modifier;
use crate::model::combatant::CombatantId;
use crate::rng::CombatRng;

/// Descriptor for one participant entering initiative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDescriptor {
    pub id: CombatantId,
    pub dexterity: i32,
    pub initiative_bonus: i32,
}

/// A rolled initiative entry, retained for tiebreaks and mid-combat inserts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub participant_id: CombatantId,
    pub initiative: i32,
    pub dexterity: i32,
    /// Arrival order; the final tiebreak.
    pub seq: u32,
}

/// One participant's roll breakdown, surfaced into the combat log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitiativeRoll {
    pub participant_id: CombatantId,
    pub base_roll: u32,
    pub dexterity_mod: i32,
    pub bonus: i32,
    pub total: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiativeTracker {
    entries: Vec<InitiativeEntry>,
    order: Vec<CombatantId>,
    turn_index: usize,
    round_number: u32,
    next_seq: u32,
    rolls: Vec<InitiativeRoll>,
}

impl InitiativeTracker {
    /// Roll initiative for every descriptor and build the ordered sequence.
    ///
    /// Panics on a duplicate participant id: that is a corrupt roster, not
    /// a rules failure.
    pub fn roll(rng: &mut CombatRng, participants: &[ParticipantDescriptor]) -> Self {
        let mut tracker = Self {
            entries: Vec::with_capacity(participants.len()),
            order: Vec::with_capacity(participants.len()),
            turn_index: 0,
            round_number: 1,
            next_seq: 0,
            rolls: Vec::with_capacity(participants.len()),
        };

        for descriptor in participants {
            assert!(
                !tracker.contains(descriptor.id),
                "duplicate participant id {} in initiative roster",
                descriptor.id
            );
            let entry = tracker.roll_entry(rng, descriptor);
            tracker.entries.push(entry);
        }
        tracker.sort_order();
        tracker
    }

    fn roll_entry(
        &mut self,
        rng: &mut CombatRng,
        descriptor: &ParticipantDescriptor,
    ) -> InitiativeEntry {
        let base_roll = rng.roll_d20();
        let dexterity_mod = ability_modifier(descriptor.dexterity);
        let total = base_roll as i32 + dexterity_mod + descriptor.initiative_bonus;
        self.rolls.push(InitiativeRoll {
            participant_id: descriptor.id,
            base_roll,
            dexterity_mod,
            bonus: descriptor.initiative_bonus,
            total,
        });
        let seq = self.next_seq;
        self.next_seq += 1;
        InitiativeEntry {
            participant_id: descriptor.id,
            initiative: total,
            dexterity: descriptor.dexterity,
            seq,
        }
    }

    /// Sort descending by (initiative, dexterity), insertion order last.
    fn sort_order(&mut self) {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| {
            b.initiative
                .cmp(&a.initiative)
                .then(b.dexterity.cmp(&a.dexterity))
                .then(a.seq.cmp(&b.seq))
        });
        self.order = sorted.iter().map(|e| e.participant_id).collect();
    }

    pub fn contains(&self, id: CombatantId) -> bool {
        self.entries.iter().any(|e| e.participant_id == id)
    }

    pub fn order(&self) -> &[CombatantId] {
        &self.order
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    /// Roll breakdowns recorded at construction (and for inserts).
    pub fn rolls(&self) -> &[InitiativeRoll] {
        &self.rolls
    }

    /// The participant whose turn it is.
    pub fn current(&self) -> Option<CombatantId> {
        self.order.get(self.turn_index).copied()
    }

    /// Advance to the next participant. Returns true when the order wrapped
    /// and a new round began.
    pub fn advance_turn(&mut self) -> bool {
        if self.order.is_empty() {
            return false;
        }
        self.turn_index += 1;
        if self.turn_index >= self.order.len() {
            self.turn_index = 0;
            self.round_number += 1;
            return true;
        }
        false
    }

    /// Move the current participant to the end of the order without touching
    /// the turn index; the next `current()` call returns the new incumbent.
    pub fn ready_action(&mut self, participant_id: CombatantId) -> bool {
        if self.current() != Some(participant_id) {
            return false;
        }
        self.order.retain(|&id| id != participant_id);
        self.order.push(participant_id);
        true
    }

    /// Identical to `ready_action` under the current rules; kept separate so
    /// the two can diverge later.
    pub fn delay_action(&mut self, participant_id: CombatantId) -> bool {
        self.ready_action(participant_id)
    }

    /// Insert a participant mid-combat. Without an explicit position, the
    /// slot is found by descending initiative comparison.
    pub fn insert(
        &mut self,
        rng: &mut CombatRng,
        descriptor: ParticipantDescriptor,
        position: Option<usize>,
    ) -> i32 {
        assert!(
            !self.contains(descriptor.id),
            "duplicate participant id {} inserted into initiative",
            descriptor.id
        );
        let entry = self.roll_entry(rng, &descriptor);
        let initiative = entry.initiative;
        self.entries.push(entry);

        let position = position.unwrap_or_else(|| {
            self.order
                .iter()
                .position(|&id| {
                    let other = self
                        .entries
                        .iter()
                        .find(|e| e.participant_id == id)
                        .expect("ordered id without entry");
                    initiative > other.initiative
                })
                .unwrap_or(self.order.len())
        });
        self.order.insert(position.min(self.order.len()), descriptor.id);
        initiative
    }

    /// Remove a participant from the order. If the turn index falls off the
    /// end, wrap to the top and begin a new round.
    pub fn remove(&mut self, participant_id: CombatantId) -> bool {
        let Some(pos) = self.order.iter().position(|&id| id == participant_id) else {
            return false;
        };
        self.order.remove(pos);
        self.entries.retain(|e| e.participant_id != participant_id);
        if pos < self.turn_index {
            self.turn_index -= 1;
        }
        if self.turn_index >= self.order.len() {
            self.turn_index = 0;
            self.round_number += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors(n: u32) -> Vec<ParticipantDescriptor> {
        (1..=n)
            .map(|id| ParticipantDescriptor {
                id,
                dexterity: 10,
                initiative_bonus: 0,
            })
            .collect()
    }

    fn forced_tracker(rolls: &[u32], participants: &[ParticipantDescriptor]) -> InitiativeTracker {
        let mut rng = CombatRng::seed_from(0);
        rng.force_d20_rolls(rolls);
        InitiativeTracker::roll(&mut rng, participants)
    }

    #[test]
    fn test_order_descends_by_initiative() {
        let tracker = forced_tracker(&[5, 15, 10], &descriptors(3));
        assert_eq!(tracker.order(), &[2, 3, 1]);
        assert_eq!(tracker.current(), Some(2));
    }

    #[test]
    fn test_dexterity_breaks_ties() {
        let participants = vec![
            ParticipantDescriptor {
                id: 1,
                dexterity: 10,
                initiative_bonus: 0,
            },
            ParticipantDescriptor {
                id: 2,
                dexterity: 16,
                initiative_bonus: 0,
            },
        ];
        // Same total initiative: 10+0 vs 7+3
        let tracker = forced_tracker(&[10, 7], &participants);
        assert_eq!(tracker.order(), &[2, 1]);
    }

    #[test]
    fn test_insertion_order_breaks_full_ties() {
        let tracker = forced_tracker(&[10, 10, 10], &descriptors(3));
        assert_eq!(tracker.order(), &[1, 2, 3]);
    }

    #[test]
    fn test_advance_wraps_and_increments_round() {
        let mut tracker = forced_tracker(&[15, 10, 5], &descriptors(3));
        assert_eq!(tracker.round_number(), 1);
        let first = tracker.current().unwrap();

        let mut wraps = 0;
        for _ in 0..3 {
            if tracker.advance_turn() {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1);
        assert_eq!(tracker.round_number(), 2);
        assert_eq!(tracker.current(), Some(first));
    }

    #[test]
    fn test_ready_moves_to_end_without_advancing_index() {
        let mut tracker = forced_tracker(&[15, 10, 5], &descriptors(3));
        assert_eq!(tracker.order(), &[1, 2, 3]);
        assert!(tracker.ready_action(1));
        assert_eq!(tracker.order(), &[2, 3, 1]);
        // Index unchanged: the new incumbent at index 0 is up.
        assert_eq!(tracker.current(), Some(2));
        // Only the current participant may ready.
        assert!(!tracker.ready_action(3));
    }

    #[test]
    fn test_delay_matches_ready() {
        let mut a = forced_tracker(&[15, 10, 5], &descriptors(3));
        let mut b = forced_tracker(&[15, 10, 5], &descriptors(3));
        a.ready_action(1);
        b.delay_action(1);
        assert_eq!(a.order(), b.order());
    }

    #[test]
    fn test_insert_by_initiative() {
        let mut tracker = forced_tracker(&[18, 10, 4], &descriptors(3));
        let mut rng = CombatRng::seed_from(0);
        rng.force_d20_rolls(&[12]);
        tracker.insert(
            &mut rng,
            ParticipantDescriptor {
                id: 9,
                dexterity: 10,
                initiative_bonus: 0,
            },
            None,
        );
        assert_eq!(tracker.order(), &[1, 9, 2, 3]);
    }

    #[test]
    fn test_insert_at_explicit_position() {
        let mut tracker = forced_tracker(&[18, 10, 4], &descriptors(3));
        let mut rng = CombatRng::seed_from(0);
        rng.force_d20_rolls(&[1]);
        tracker.insert(
            &mut rng,
            ParticipantDescriptor {
                id: 9,
                dexterity: 10,
                initiative_bonus: 0,
            },
            Some(0),
        );
        assert_eq!(tracker.order()[0], 9);
    }

    #[test]
    fn test_remove_wraps_index_and_bumps_round() {
        let mut tracker = forced_tracker(&[15, 10, 5], &descriptors(3));
        tracker.advance_turn();
        tracker.advance_turn();
        assert_eq!(tracker.current(), Some(3));
        assert!(tracker.remove(3));
        assert_eq!(tracker.current(), Some(1));
        assert_eq!(tracker.round_number(), 2);
    }

    #[test]
    fn test_remove_before_current_keeps_actor() {
        let mut tracker = forced_tracker(&[15, 10, 5], &descriptors(3));
        tracker.advance_turn();
        assert_eq!(tracker.current(), Some(2));
        assert!(tracker.remove(1));
        assert_eq!(tracker.current(), Some(2));
        assert_eq!(tracker.round_number(), 1);
    }

    #[test]
    #[should_panic(expected = "duplicate participant id")]
    fn test_duplicate_roster_panics() {
        let mut rng = CombatRng::seed_from(0);
        let dup = vec![
            ParticipantDescriptor {
                id: 1,
                dexterity: 10,
                initiative_bonus: 0,
            };
            2
        ];
        InitiativeTracker::roll(&mut rng, &dup);
    }

    #[test]
    fn test_rolls_recorded_for_log() {
        let tracker = forced_tracker(&[15, 10], &descriptors(2));
        let rolls = tracker.rolls();
        assert_eq!(rolls.len(), 2);
        assert_eq!(rolls[0].base_roll, 15);
        assert_eq!(rolls[0].total, 15);
    }
}
