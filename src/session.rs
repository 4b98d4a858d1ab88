//! The combat session: owner of all state and the only mutation entrypoint.
//!
//! A host constructs a session from a seed, a roster, a grid, and the
//! immutable catalogs, then drives it by submitting one [`Action`] per
//! `step` call for the current actor until the session reports terminal
//! state. Registries (status effects, feats, effectiveness matrix) are
//! shared read-only; everything else is owned here.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::action_resolver;
use crate::config::FeatCatalog;
use crate::critical::CriticalResolver;
use crate::errors::{ConfigError, EngineError};
use crate::events::LogEntry;
use crate::grid::{HexCoord, HexGrid};
use crate::initiative::{InitiativeTracker, ParticipantDescriptor};
use crate::model::action::{Action, ActionOutcome};
use crate::model::combatant::{Combatant, CombatantId, TeamId};
use crate::model::damage::{DamageComposition, EffectivenessMatrix};
use crate::model::effect::DurationKind;
use crate::pipeline::DamagePipeline;
use crate::rng::CombatRng;
use crate::status::{StatusEffectRegistry, StatusEffectSystem};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Result of one `step` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(flatten)]
    pub outcome: ActionOutcome,
    pub log_delta: Vec<LogEntry>,
    pub terminal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_actor_id: Option<CombatantId>,
}

/// Validity of one potential target, from `query_valid_targets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetValidity {
    pub target_id: CombatantId,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Damage a pipeline run converted into a future damage-over-time tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedDamage {
    pub target_id: CombatantId,
    pub composition: DamageComposition,
    pub remaining_rounds: i64,
}

/// Fully serializable projection of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_version: u32,
    pub seed: u64,
    pub rng: CombatRng,
    pub round: u32,
    pub turn_index: usize,
    pub initiative: InitiativeTracker,
    pub combatants: Vec<Combatant>,
    pub grid: HexGrid,
    pub effect_instances: StatusEffectSystem,
    pub dot_queue: Vec<DelayedDamage>,
    pub clock: u64,
    pub matrix_version: u32,
    pub log_length: usize,
    pub terminal: bool,
    pub winning_team: Option<TeamId>,
}

pub struct CombatSession {
    pub(crate) rng: CombatRng,
    pub(crate) grid: HexGrid,
    pub(crate) combatants: BTreeMap<CombatantId, Combatant>,
    pub(crate) initiative: InitiativeTracker,
    pub(crate) status: StatusEffectSystem,
    pub(crate) pipeline: DamagePipeline,
    pub(crate) crit: CriticalResolver,
    pub(crate) registry: Arc<StatusEffectRegistry>,
    pub(crate) matrix: Arc<EffectivenessMatrix>,
    pub(crate) feats: Arc<FeatCatalog>,
    pub(crate) log: Vec<LogEntry>,
    /// Entries emitted before the snapshot this session was restored from.
    log_base: usize,
    pub(crate) dot_queue: Vec<DelayedDamage>,
    /// Monotone step counter, used as the status-effect clock.
    pub(crate) clock: u64,
    pub(crate) terminal: bool,
    pub(crate) winning_team: Option<TeamId>,
}

impl std::fmt::Debug for CombatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatSession")
            .field("round", &self.initiative.round_number())
            .field("turn_index", &self.initiative.turn_index())
            .field("combatants", &self.combatants.len())
            .field("terminal", &self.terminal)
            .finish()
    }
}

impl CombatSession {
    /// Build a session: place the roster, roll initiative, and open round 1.
    ///
    /// Fails when a combatant references a feat missing from the catalog.
    /// Duplicate participant ids or double-occupied hexes panic; those are
    /// corrupt rosters, not recoverable configuration.
    pub fn new(
        seed: u64,
        roster: Vec<Combatant>,
        grid: HexGrid,
        registry: Arc<StatusEffectRegistry>,
        matrix: Arc<EffectivenessMatrix>,
        feats: Arc<FeatCatalog>,
    ) -> Result<Self, ConfigError> {
        let mut rng = CombatRng::seed_from(seed);
        let mut grid = grid;

        let mut combatants = BTreeMap::new();
        let mut descriptors = Vec::with_capacity(roster.len());
        for combatant in roster {
            if let Some(weapon_id) = combatant.weapon_id {
                if feats.get(weapon_id).is_none() {
                    return Err(ConfigError::InvalidDefinition(format!(
                        "combatant {} equips unknown feat {}",
                        combatant.id, weapon_id
                    )));
                }
            }
            grid.occupy(combatant.position, combatant.id);
            descriptors.push(ParticipantDescriptor {
                id: combatant.id,
                dexterity: combatant.attributes.dexterity,
                initiative_bonus: combatant.initiative_bonus,
            });
            combatants.insert(combatant.id, combatant);
        }

        let initiative = InitiativeTracker::roll(&mut rng, &descriptors);

        let mut session = Self {
            rng,
            grid,
            combatants,
            initiative,
            status: StatusEffectSystem::new(),
            pipeline: DamagePipeline::with_default_modifiers(),
            crit: CriticalResolver::new(),
            registry,
            matrix,
            feats,
            log: Vec::new(),
            log_base: 0,
            dot_queue: Vec::new(),
            clock: 0,
            terminal: false,
            winning_team: None,
        };

        for roll in session.initiative.rolls().to_vec() {
            session.push_log(LogEntry::InitiativeRolled {
                participant_id: roll.participant_id,
                base_roll: roll.base_roll,
                dexterity_mod: roll.dexterity_mod,
                bonus: roll.bonus,
                total: roll.total,
            });
        }
        session.push_log(LogEntry::RoundStarted { round: 1 });
        if let Some(first) = session.initiative.current() {
            session.push_log(LogEntry::TurnStarted {
                participant_id: first,
                round: 1,
            });
        }
        session.check_termination();
        Ok(session)
    }

    /// Submit an action for the current actor. The only mutation entrypoint.
    pub fn step(&mut self, action: Action) -> Result<StepResult, EngineError> {
        if self.terminal {
            return Ok(StepResult {
                outcome: ActionOutcome::Terminated,
                log_delta: Vec::new(),
                terminal: true,
                next_actor_id: None,
            });
        }

        let actor_id = action.actor_id();
        if !self.combatants.contains_key(&actor_id) {
            return Err(EngineError::UnknownActor(actor_id));
        }
        if !matches!(action, Action::Abort { .. }) {
            let current = self
                .initiative
                .current()
                .ok_or(EngineError::UnknownActor(actor_id))?;
            if current != actor_id {
                return Err(EngineError::NotCurrentActor {
                    submitted: actor_id,
                    current,
                });
            }
        }
        action_resolver::validate(self, &action)?;

        self.clock += 1;
        let delta_start = self.log.len();
        self.push_log(LogEntry::ActionAttempted {
            actor_id,
            kind: action.kind().to_string(),
        });

        let outcome = action_resolver::resolve(self, &action);
        debug!("step by {}: {:?}", actor_id, outcome);

        let is_reorder = matches!(action, Action::Ready { .. } | Action::Delay { .. });
        if !self.terminal && outcome.spends_turn() {
            if is_reorder {
                // Ready/Delay shift the order under a fixed index; the next
                // incumbent is already current. Only advance when the actor
                // was last and the order did not change.
                if self.initiative.current() == Some(actor_id) {
                    self.advance_after_action();
                }
            } else {
                self.advance_after_action();
            }
        }

        Ok(StepResult {
            outcome,
            log_delta: self.log[delta_start..].to_vec(),
            terminal: self.terminal,
            next_actor_id: if self.terminal {
                None
            } else {
                self.initiative.current()
            },
        })
    }

    /// Insert a combatant mid-combat. Initiative is rolled through the
    /// session RNG unless an explicit order position is given.
    pub fn insert_combatant(
        &mut self,
        combatant: Combatant,
        position: Option<usize>,
    ) -> Result<(), ConfigError> {
        assert!(
            !self.combatants.contains_key(&combatant.id),
            "duplicate participant id {} inserted into session",
            combatant.id
        );
        if let Some(weapon_id) = combatant.weapon_id {
            if self.feats.get(weapon_id).is_none() {
                return Err(ConfigError::InvalidDefinition(format!(
                    "combatant {} equips unknown feat {}",
                    combatant.id, weapon_id
                )));
            }
        }
        self.grid.occupy(combatant.position, combatant.id);
        self.initiative.insert(
            &mut self.rng,
            ParticipantDescriptor {
                id: combatant.id,
                dexterity: combatant.attributes.dexterity,
                initiative_bonus: combatant.initiative_bonus,
            },
            position,
        );
        if let Some(roll) = self.initiative.rolls().last().copied() {
            self.push_log(LogEntry::InitiativeRolled {
                participant_id: roll.participant_id,
                base_roll: roll.base_roll,
                dexterity_mod: roll.dexterity_mod,
                bonus: roll.bonus,
                total: roll.total,
            });
        }
        self.combatants.insert(combatant.id, combatant);
        Ok(())
    }

    /// Remove a combatant entirely: from the order, the grid, and the
    /// status system. A removal that wraps the turn index opens the next
    /// round with full bookkeeping.
    pub fn remove_combatant(&mut self, id: CombatantId) -> bool {
        let Some(combatant) = self.combatants.remove(&id) else {
            return false;
        };
        self.grid.vacate(combatant.position);
        self.status.clear_target(id);
        let round_before = self.initiative.round_number();
        self.initiative.remove(id);
        if self.initiative.round_number() != round_before {
            self.on_round_start();
        }
        self.check_termination();
        true
    }

    /// Advance MINUTES/HOURS status durations outside the combat tick.
    pub fn advance_time(&mut self, kind: DurationKind, amount: i64) -> Vec<LogEntry> {
        assert!(
            matches!(kind, DurationKind::Minutes | DurationKind::Hours),
            "advance_time only drives minutes/hours durations"
        );
        let delta_start = self.log.len();
        let expired = self.status.tick(&self.registry, kind, amount);
        for e in expired {
            self.push_log(LogEntry::StatusExpired {
                target_id: e.target_id,
                effect_id: e.effect_id,
            });
        }
        self.log[delta_start..].to_vec()
    }

    /// All hexes the combatant could end a move on this turn.
    pub fn query_valid_moves(&self, id: CombatantId) -> Vec<HexCoord> {
        let Some(combatant) = self.combatants.get(&id) else {
            return Vec::new();
        };
        if !combatant.is_alive() {
            return Vec::new();
        }
        let budget = self.movement_budget(combatant);
        let mut moves: Vec<HexCoord> = self
            .grid
            .reachable_within(combatant.position, budget)
            .into_iter()
            .collect();
        moves.sort_unstable();
        moves
    }

    /// Movement budget after status modifiers (hasted, slowed, ...).
    pub(crate) fn movement_budget(&self, combatant: &Combatant) -> u32 {
        let modified = self.status.calculate_modified_value(
            &self.registry,
            combatant.id,
            "movement",
            f64::from(combatant.movement_points),
        );
        modified.max(0.0).floor() as u32
    }

    /// Attack validity of every other living combatant for the attacker.
    pub fn query_valid_targets(&self, id: CombatantId) -> Vec<TargetValidity> {
        let Some(attacker) = self.combatants.get(&id) else {
            return Vec::new();
        };
        self.combatants
            .values()
            .filter(|target| target.id != id && target.is_alive())
            .map(|target| {
                match crate::reach::check_attack_valid(&self.grid, attacker, target.position) {
                    Ok(()) => TargetValidity {
                        target_id: target.id,
                        valid: true,
                        reason: None,
                    },
                    Err(violation) => TargetValidity {
                        target_id: target.id,
                        valid: false,
                        reason: Some(violation.to_string()),
                    },
                }
            })
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            snapshot_version: SNAPSHOT_VERSION,
            seed: self.rng.seed(),
            rng: self.rng.clone(),
            round: self.initiative.round_number(),
            turn_index: self.initiative.turn_index(),
            initiative: self.initiative.clone(),
            combatants: self.combatants.values().cloned().collect(),
            grid: self.grid.clone(),
            effect_instances: self.status.clone(),
            dot_queue: self.dot_queue.clone(),
            clock: self.clock,
            matrix_version: self.matrix.version(),
            log_length: self.log_base + self.log.len(),
            terminal: self.terminal,
            winning_team: self.winning_team,
        }
    }

    /// Rebuild a session from a snapshot plus the immutable catalogs it was
    /// created against. The matrix version must match the snapshot's.
    pub fn restore(
        snapshot: Snapshot,
        registry: Arc<StatusEffectRegistry>,
        matrix: Arc<EffectivenessMatrix>,
        feats: Arc<FeatCatalog>,
    ) -> Result<Self, ConfigError> {
        if snapshot.snapshot_version != SNAPSHOT_VERSION {
            return Err(ConfigError::InvalidDefinition(format!(
                "snapshot version {} does not match engine version {}",
                snapshot.snapshot_version, SNAPSHOT_VERSION
            )));
        }
        if snapshot.matrix_version != matrix.version() {
            return Err(ConfigError::InvalidDefinition(format!(
                "snapshot was taken against matrix version {}, have {}",
                snapshot.matrix_version,
                matrix.version()
            )));
        }

        Ok(Self {
            rng: snapshot.rng,
            grid: snapshot.grid,
            combatants: snapshot
                .combatants
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            initiative: snapshot.initiative,
            status: snapshot.effect_instances,
            pipeline: DamagePipeline::with_default_modifiers(),
            crit: CriticalResolver::new(),
            registry,
            matrix,
            feats,
            log: Vec::new(),
            log_base: snapshot.log_length,
            dot_queue: snapshot.dot_queue,
            clock: snapshot.clock,
            terminal: snapshot.terminal,
            winning_team: snapshot.winning_team,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn winning_team(&self) -> Option<TeamId> {
        self.winning_team
    }

    pub fn current_actor(&self) -> Option<CombatantId> {
        self.initiative.current()
    }

    pub fn round_number(&self) -> u32 {
        self.initiative.round_number()
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    pub fn status_system(&self) -> &StatusEffectSystem {
        &self.status
    }

    pub fn effect_registry(&self) -> &StatusEffectRegistry {
        &self.registry
    }

    /// Apply a registered status effect outside action resolution
    /// (pre-combat buffs, scripted hazards). Returns the instance id, or
    /// `None` when blocked by immunity or the id is unknown.
    pub fn apply_status(&mut self, target_id: CombatantId, effect_id: &str) -> Option<u64> {
        if !self.combatants.contains_key(&target_id) {
            return None;
        }
        let now = self.clock;
        let registry = self.registry.clone();
        let instance = self
            .status
            .apply_effect(&registry, target_id, effect_id, now)?;
        let stacks = self.status.stacks(target_id, effect_id);
        self.push_log(LogEntry::StatusApplied {
            target_id,
            effect_id: effect_id.to_string(),
            stacks,
        });
        Some(instance)
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Register a custom damage-pipeline modifier around the defaults.
    pub fn pipeline_mut(&mut self) -> &mut DamagePipeline {
        &mut self.pipeline
    }

    /// Register a critical side-effect hook.
    pub fn critical_resolver_mut(&mut self) -> &mut CriticalResolver {
        &mut self.crit
    }

    /// Test affordance: force upcoming die results.
    pub fn rng_mut(&mut self) -> &mut CombatRng {
        &mut self.rng
    }

    pub(crate) fn push_log(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    /// Advance the tracker; a wrap opens the next round.
    pub(crate) fn advance_after_action(&mut self) {
        let wrapped = self.initiative.advance_turn();
        if wrapped {
            self.on_round_start();
        }
        if !self.terminal {
            if let Some(next) = self.initiative.current() {
                self.push_log(LogEntry::TurnStarted {
                    participant_id: next,
                    round: self.initiative.round_number(),
                });
            }
        }
    }

    /// New-round bookkeeping: per-round flags, duration ticks, queued
    /// damage-over-time, and a termination re-check.
    pub(crate) fn on_round_start(&mut self) {
        let round = self.initiative.round_number();
        info!("round {} begins", round);
        self.push_log(LogEntry::RoundStarted { round });

        for combatant in self.combatants.values_mut() {
            combatant.reset_round();
            if combatant
                .dodging_until_round
                .map_or(false, |until| until < round)
            {
                combatant.dodging_until_round = None;
            }
            combatant.resistances.tick();
        }

        let expired = self.status.tick(&self.registry, DurationKind::Rounds, 1);
        for e in expired {
            self.push_log(LogEntry::StatusExpired {
                target_id: e.target_id,
                effect_id: e.effect_id,
            });
        }

        self.tick_dot_queue();
        self.check_termination();
    }

    /// Count down queued delayed damage and land what is due.
    fn tick_dot_queue(&mut self) {
        let mut due = Vec::new();
        self.dot_queue.retain_mut(|entry| {
            entry.remaining_rounds -= 1;
            if entry.remaining_rounds <= 0 {
                due.push(entry.clone());
                false
            } else {
                true
            }
        });
        for entry in due {
            let total = entry.composition.floored_total();
            self.push_log(LogEntry::DamageOverTime {
                target_id: entry.target_id,
                composition: entry.composition.clone(),
                total,
            });
            action_resolver::apply_damage(self, entry.target_id, total);
        }
    }

    /// Combat ends when at most one team still has a living combatant.
    pub(crate) fn check_termination(&mut self) {
        if self.terminal {
            return;
        }
        let alive_teams: BTreeSet<TeamId> = self
            .combatants
            .values()
            .filter(|c| c.is_alive())
            .map(|c| c.team)
            .collect();
        if alive_teams.len() <= 1 {
            self.terminal = true;
            self.winning_team = alive_teams.into_iter().next();
            self.push_log(LogEntry::CombatEnded {
                winning_team: self.winning_team,
                reason: "last team standing".to_string(),
            });
        }
    }

    /// Abort the session from the outside. Used by the abort pseudo-action.
    pub(crate) fn abort(&mut self) {
        if self.terminal {
            return;
        }
        self.terminal = true;
        self.winning_team = None;
        self.push_log(LogEntry::CombatEnded {
            winning_team: None,
            reason: "aborted".to_string(),
        });
    }
}
