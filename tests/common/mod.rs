//! Shared fixtures for the integration tests: a small feat catalog, a
//! status-effect registry, and roster builders.
#![allow(dead_code)]

use std::sync::Arc;

use hexcombat::{
    Combatant, CombatSession, DurationKind, EffectKind, EffectivenessMatrix, FeatCatalog,
    HexCoord, HexGrid, StatusEffectDefinition, StatusEffectRegistry,
};

pub const SWORD: u32 = 1;
pub const FIRE_BLADE: u32 = 2;
pub const FIREBOLT: u32 = 3;
pub const HEALING_DRAUGHT: u32 = 4;
pub const VENOM_DART: u32 = 5;

pub fn registry() -> Arc<StatusEffectRegistry> {
    let mut burning = StatusEffectDefinition::simple(
        "burning",
        EffectKind::Debuff,
        DurationKind::Rounds,
        3,
    );
    burning.stackable = true;
    burning.max_stacks = 3;

    let mut stone_skin = StatusEffectDefinition::simple(
        "stone_skin",
        EffectKind::Buff,
        DurationKind::Rounds,
        10,
    );
    stone_skin.custom_logic = Some("crit_immunity".to_string());

    let poisoned = StatusEffectDefinition::simple(
        "poisoned",
        EffectKind::Condition,
        DurationKind::Rounds,
        2,
    );

    let fatigue = StatusEffectDefinition::simple(
        "fatigue",
        EffectKind::Debuff,
        DurationKind::Minutes,
        10,
    );

    Arc::new(
        StatusEffectRegistry::from_definitions(vec![burning, stone_skin, poisoned, fatigue])
            .unwrap(),
    )
}

pub fn feats(registry: &StatusEffectRegistry) -> Arc<FeatCatalog> {
    let catalog = FeatCatalog::from_json(
        serde_json::json!([
            {
                "id": SWORD,
                "name": "Longsword",
                "base_damage": 10.0,
                "damage_type": "physical"
            },
            {
                "id": FIRE_BLADE,
                "name": "Flame Blade",
                "base_damage": 10.0,
                "damage_type": "fire"
            },
            {
                "id": FIREBOLT,
                "name": "Firebolt",
                "mp_cost": 3,
                "base_damage": 10.0,
                "damage_type": "fire",
                "status_condition": "burning"
            },
            {
                "id": HEALING_DRAUGHT,
                "name": "Healing Draught",
                "action_type": "free",
                "target": {"type": "any"},
                "base_healing": 8.0
            },
            {
                "id": VENOM_DART,
                "name": "Venom Dart",
                "mp_cost": 1,
                "base_damage": 4.0,
                "damage_type": "poison",
                "status_condition": "poisoned",
                "save_dc": 12,
                "half_on_save": true
            }
        ]),
        registry,
    )
    .unwrap();
    Arc::new(catalog)
}

/// A sword-and-board fighter: str 14, 5% crit at 1.5x, AC 12.
pub fn fighter(id: u32, team: u32, position: HexCoord) -> Combatant {
    let mut c = Combatant::new(id, &format!("fighter-{}", id), team, 30, position);
    c.attributes.strength = 14;
    c.armor_class = 12;
    c.skills.critical_chance = 0.05;
    c.skills.critical_damage = 1.5;
    c.weapon_id = Some(SWORD);
    c.mp = 10;
    c.max_mp = 10;
    c
}

/// Build a session over an open grid. Initiative bonuses are staggered so
/// the roster order is also the turn order regardless of the d20s.
pub fn session_with(seed: u64, mut roster: Vec<Combatant>) -> CombatSession {
    let bonus_step = 100;
    let mut bonus = bonus_step * roster.len() as i32;
    for combatant in &mut roster {
        combatant.initiative_bonus = bonus;
        bonus -= bonus_step;
    }
    CombatSession::new(
        seed,
        roster,
        HexGrid::new(),
        registry(),
        Arc::new(EffectivenessMatrix::new()),
        feats(&registry()),
    )
    .unwrap()
}

/// Same, but with an explicit grid and matrix.
pub fn session_full(
    seed: u64,
    mut roster: Vec<Combatant>,
    grid: HexGrid,
    matrix: EffectivenessMatrix,
) -> CombatSession {
    let bonus_step = 100;
    let mut bonus = bonus_step * roster.len() as i32;
    for combatant in &mut roster {
        combatant.initiative_bonus = bonus;
        bonus -= bonus_step;
    }
    let registry = registry();
    let feats = feats(&registry);
    CombatSession::new(seed, roster, grid, registry, Arc::new(matrix), feats).unwrap()
}
