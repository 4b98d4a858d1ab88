//! Deterministic hex-grid tactical combat engine.
//!
//! The engine is a pure library: a host constructs a [`CombatSession`] from
//! a seed, a roster with positions, a grid, and immutable catalogs, then
//! drives it one [`Action`] per [`CombatSession::step`] call until the
//! session reports terminal state. Equal seeds and equal action sequences
//! produce equal logs and snapshots.

pub mod action_resolver;
pub mod config;
pub mod critical;
pub mod dice;
pub mod errors;
pub mod events;
pub mod flanking;
pub mod grid;
pub mod initiative;
pub mod model;
pub mod opportunity;
pub mod pipeline;
pub mod reach;
pub mod resistance;
pub mod resolvers;
pub mod rng;
pub mod session;
pub mod status;

pub use config::{FeatCatalog, FeatDefinition, TargetKind, TargetRule};
pub use errors::{ConfigError, EngineError};
pub use events::LogEntry;
pub use grid::{HexCoord, HexGrid, TerrainCell};
pub use model::action::{Action, ActionOutcome};
pub use model::combatant::{
    ActionSlots, Attributes, Combatant, CombatantId, CombatSkills, ReachWeaponKind, SlotKind,
    TeamId,
};
pub use model::damage::{DamageComposition, DamageType, EffectivenessMatrix};
pub use model::effect::{
    AttributeModifier, DurationKind, EffectKind, ModifierOp, StatusEffectDefinition,
};
pub use rng::CombatRng;
pub use session::{CombatSession, Snapshot, StepResult, TargetValidity};
pub use status::{StatusEffectRegistry, StatusEffectSystem};
