use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::model::combatant::CombatantId;

/// Axial hex coordinate.
///
/// Serialized on the wire as a `[q, r]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Hex grid distance between two axial coordinates.
    pub fn distance(self, other: HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.q + self.r - other.q - other.r).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// The six neighbouring hexes, indexed by side 0..5.
    pub fn neighbors(self) -> [HexCoord; 6] {
        const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];
        let mut out = [self; 6];
        for (i, (dq, dr)) in DIRECTIONS.iter().enumerate() {
            out[i] = HexCoord::new(self.q + dq, self.r + dr);
        }
        out
    }

    /// All hexes in a straight line between two coordinates, endpoints
    /// included. Interpolates linearly and rounds each step to the nearest
    /// hex.
    pub fn line(self, other: HexCoord) -> Vec<HexCoord> {
        let n = self.distance(other);
        if n == 0 {
            return vec![self];
        }
        let mut line = Vec::with_capacity(n as usize + 1);
        for i in 0..=n {
            let t = f64::from(i) / f64::from(n);
            let q = f64::from(self.q) + f64::from(other.q - self.q) * t;
            let r = f64::from(self.r) + f64::from(other.r - self.r) * t;
            line.push(HexCoord::new(q.round() as i32, r.round() as i32));
        }
        line
    }

    /// Hex side (0..5) pointing from this coordinate towards the target.
    pub fn facing_towards(self, target: HexCoord) -> u8 {
        let dx = f64::from(target.q - self.q);
        let dy = f64::from(target.r - self.r);
        if dx == 0.0 && dy == 0.0 {
            return 0;
        }
        let angle = dy.atan2(dx);
        ((angle + std::f64::consts::PI) * 3.0 / std::f64::consts::PI) as u8 % 6
    }
}

impl Serialize for HexCoord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.q)?;
        tup.serialize_element(&self.r)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for HexCoord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoordVisitor;

        impl<'de> Visitor<'de> for CoordVisitor {
            type Value = HexCoord;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a [q, r] pair")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<HexCoord, A::Error> {
                let q = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let r = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
                Ok(HexCoord::new(q, r))
            }
        }

        deserializer.deserialize_tuple(2, CoordVisitor)
    }
}

/// Per-hex terrain flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainCell {
    #[serde(default)]
    pub blocks_sight: bool,
    #[serde(default)]
    pub impassable: bool,
    #[serde(default)]
    pub difficult: bool,
}

/// Serialize coordinate-keyed maps as `[[coord, value], ...]` pair lists.
/// JSON object keys must be strings, and coordinates are wire tuples.
mod coord_map {
    use super::HexCoord;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, V>(map: &BTreeMap<HexCoord, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let pairs: Vec<(&HexCoord, &V)> = map.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<HexCoord, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let pairs: Vec<(HexCoord, V)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// The tactical grid: terrain flags plus an occupancy map.
///
/// Hexes without an explicit terrain cell are open ground. Occupancy holds at
/// most one combatant per coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HexGrid {
    #[serde(with = "coord_map")]
    cells: BTreeMap<HexCoord, TerrainCell>,
    #[serde(with = "coord_map")]
    occupancy: BTreeMap<HexCoord, CombatantId>,
}

impl HexGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_terrain(&mut self, coord: HexCoord, cell: TerrainCell) {
        self.cells.insert(coord, cell);
    }

    pub fn terrain(&self, coord: HexCoord) -> TerrainCell {
        self.cells.get(&coord).copied().unwrap_or_default()
    }

    pub fn occupant(&self, coord: HexCoord) -> Option<CombatantId> {
        self.occupancy.get(&coord).copied()
    }

    pub fn is_occupied(&self, coord: HexCoord) -> bool {
        self.occupancy.contains_key(&coord)
    }

    /// Place a combatant, panicking if the hex already holds someone else.
    /// Double occupancy is an engine bug, not a rules failure.
    pub fn occupy(&mut self, coord: HexCoord, id: CombatantId) {
        if let Some(existing) = self.occupancy.get(&coord) {
            assert!(
                *existing == id,
                "occupancy violation: hex ({}, {}) already held by {}",
                coord.q,
                coord.r,
                existing
            );
        }
        self.occupancy.insert(coord, id);
    }

    pub fn vacate(&mut self, coord: HexCoord) {
        self.occupancy.remove(&coord);
    }

    pub fn move_occupant(&mut self, from: HexCoord, to: HexCoord, id: CombatantId) {
        self.vacate(from);
        self.occupy(to, id);
    }

    /// True iff every hex strictly between `from` and `to` is neither
    /// sight-blocking terrain nor occupied.
    pub fn line_of_sight(&self, from: HexCoord, to: HexCoord) -> bool {
        let line = from.line(to);
        line.iter()
            .skip(1)
            .take(line.len().saturating_sub(2))
            .all(|&hex| !self.terrain(hex).blocks_sight && !self.is_occupied(hex))
    }

    /// Whether a path of cost ≤ `budget` exists from `from` to an unoccupied,
    /// passable `to`. Entering difficult terrain halves the remaining budget.
    pub fn is_valid_move(&self, from: HexCoord, to: HexCoord, budget: u32) -> bool {
        if from == to {
            return false;
        }
        let terrain = self.terrain(to);
        if terrain.impassable || self.is_occupied(to) {
            return false;
        }
        self.reachable_within(from, budget).contains(&to)
    }

    /// Every hex reachable from `from` within the movement budget,
    /// excluding the start itself. BFS expands through passable, unoccupied
    /// hexes; stepping onto difficult terrain halves the budget left.
    pub fn reachable_within(&self, from: HexCoord, budget: u32) -> HashSet<HexCoord> {
        let mut best: BTreeMap<HexCoord, u32> = BTreeMap::new();
        let mut queue = VecDeque::new();
        best.insert(from, budget);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let remaining = best[&current];
            if remaining == 0 {
                continue;
            }
            for neighbor in current.neighbors() {
                let terrain = self.terrain(neighbor);
                if terrain.impassable || self.is_occupied(neighbor) {
                    continue;
                }
                let after_step = remaining - 1;
                let after_terrain = if terrain.difficult {
                    after_step / 2
                } else {
                    after_step
                };
                if best.get(&neighbor).map_or(true, |&b| after_terrain > b) {
                    best.insert(neighbor, after_terrain);
                    queue.push_back(neighbor);
                }
            }
        }

        best.remove(&from);
        best.into_keys().collect()
    }
}
