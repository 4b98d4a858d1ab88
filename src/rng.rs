//! Deterministic RNG owned by the combat session.
//!
//! Every dice roll and probabilistic trigger in the engine routes through a
//! single seeded generator, so two sessions constructed from the same seed
//! and fed the same action sequence produce identical logs. The generator
//! state serializes into snapshots. A forced-roll queue lets tests pin
//! specific die results without disturbing the generator state.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRng {
    seed: u64,
    generator: ChaCha8Rng,
    // (sides, value) pairs consumed before the generator; test-only, not
    // part of the snapshot
    #[serde(skip)]
    forced_rolls: VecDeque<(u32, u32)>,
    #[serde(skip)]
    forced_uniforms: VecDeque<f64>,
}

impl CombatRng {
    pub fn seed_from(seed: u64) -> Self {
        Self {
            seed,
            generator: ChaCha8Rng::seed_from_u64(seed),
            forced_rolls: VecDeque::new(),
            forced_uniforms: VecDeque::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Force the next roll of a die with `sides` to return `value`.
    pub fn force_roll(&mut self, sides: u32, value: u32) {
        self.forced_rolls.push_back((sides, value));
    }

    /// Force a sequence of d20 results, in order.
    pub fn force_d20_rolls(&mut self, rolls: &[u32]) {
        for &r in rolls {
            self.force_roll(20, r);
        }
    }

    /// Force the next `uniform01` result (e.g. to pin a chance-based
    /// critical in a scenario test).
    pub fn force_uniform(&mut self, value: f64) {
        self.forced_uniforms.push_back(value);
    }

    pub fn clear_forced_rolls(&mut self) {
        self.forced_rolls.clear();
        self.forced_uniforms.clear();
    }

    pub fn next_u32(&mut self) -> u32 {
        self.generator.gen()
    }

    /// Roll a die: uniform in `1..=sides`. Consumes a matching forced roll
    /// first if one is queued.
    pub fn roll(&mut self, sides: u32) -> u32 {
        if let Some(pos) = self.forced_rolls.iter().position(|&(s, _)| s == sides) {
            let (_, value) = self.forced_rolls.remove(pos).unwrap();
            return value;
        }
        self.generator.gen_range(1..=sides)
    }

    pub fn roll_d20(&mut self) -> u32 {
        self.roll(20)
    }

    /// Uniform float in `[0, 1)`.
    pub fn uniform01(&mut self) -> f64 {
        if let Some(value) = self.forced_uniforms.pop_front() {
            return value;
        }
        self.generator.gen::<f64>()
    }
}
