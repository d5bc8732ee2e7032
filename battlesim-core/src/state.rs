//! Battle state: the immutable cohort arena and per-round snapshots.
//!
//! Cohorts are converted once per battle into an arena of [`CombatCohort`]s
//! shared behind an `Arc`. Everything that changes between rounds lives in a
//! [`Round`]: one [`CohortState`] per arena slot plus each side's frontline,
//! reserve and defeated sets, all addressed by [`CohortIx`].

use crate::config::Settings;
use crate::definitions::{CohortId, UnitAttribute, UnitRole, UnitTypeId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Index into the battle's cohort arena.
pub type CohortIx = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Attacker, Side::Defender];

    pub fn index(self) -> usize {
        match self {
            Side::Attacker => 0,
            Side::Defender => 1,
        }
    }

    pub fn enemy(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Attacker => f.write_str("attacker"),
            Side::Defender => f.write_str("defender"),
        }
    }
}

/// Combat sub-round type selecting the damage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Default,
    Fire,
    Shock,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Default, Phase::Fire, Phase::Shock];

    pub fn index(self) -> usize {
        match self {
            Phase::Default => 0,
            Phase::Fire => 1,
            Phase::Shock => 2,
        }
    }

    /// Phase of a (1-based) round.
    ///
    /// With fire and shock enabled, phases alternate every
    /// `phase_length` rounds starting with Fire.
    pub fn for_round(round: i32, settings: &Settings) -> Phase {
        if !settings.fire_and_shock || round < 1 {
            return Phase::Default;
        }
        let length = settings.phase_length.max(1) as i32;
        if ((round - 1) / length) % 2 == 0 {
            Phase::Fire
        } else {
            Phase::Shock
        }
    }
}

/// Offensive and defensive pips of a cohort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PipStats {
    pub offensive_fire: f64,
    pub defensive_fire: f64,
    pub offensive_shock: f64,
    pub defensive_shock: f64,
    pub offensive_morale: f64,
    pub defensive_morale: f64,
}

/// Flattened, derived cohort values. Never changes during a battle.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatCohortDefinition {
    pub id: CohortId,
    pub side: Side,
    pub unit_type: UnitTypeId,
    pub role: UnitRole,
    pub is_loyal: bool,
    pub max_morale: f64,
    /// In men.
    pub max_strength: f64,
    pub experience: f64,
    /// Flanking range in frontline slots.
    pub maneuver: u32,
    pub cost: f64,
    pub maintenance: f64,
    pub capture_resist: f64,
    pub pips: PipStats,
    /// Every attribute the cohort carries, calculated once.
    pub attributes: FxHashMap<UnitAttribute, f64>,
}

/// Precomputed damage tables, indexed by [`Phase::index`].
#[derive(Debug, Clone, PartialEq)]
pub struct CombatCohortCalculated {
    /// Strength damage per phase against each known unit type.
    pub strength_damage: [FxHashMap<UnitTypeId, f64>; 3],
    /// Morale damage per phase against each known unit type.
    pub morale_damage: [FxHashMap<UnitTypeId, f64>; 3],
    /// Damage against unknown unit types (no versus bonus).
    pub base_strength_damage: [f64; 3],
    pub base_morale_damage: [f64; 3],
    pub strength_taken: [f64; 3],
    pub morale_taken: [f64; 3],
}

impl CombatCohortCalculated {
    pub fn strength_damage(&self, phase: Phase, target: &UnitTypeId) -> f64 {
        let i = phase.index();
        self.strength_damage[i]
            .get(target)
            .copied()
            .unwrap_or(self.base_strength_damage[i])
    }

    pub fn morale_damage(&self, phase: Phase, target: &UnitTypeId) -> f64 {
        let i = phase.index();
        self.morale_damage[i]
            .get(target)
            .copied()
            .unwrap_or(self.base_morale_damage[i])
    }
}

/// Arena entry: the immutable half of a cohort in combat.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatCohort {
    pub definition: CombatCohortDefinition,
    pub calculated: CombatCohortCalculated,
}

/// Per-round mutable half of a cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortState {
    pub morale: f64,
    pub strength: f64,
    pub target: Option<CohortIx>,
    /// Enemy cohort in the back row behind the target.
    pub target_support: Option<CohortIx>,
    pub is_defeated: bool,
    pub defeated_round: Option<i32>,
    pub is_destroyed: bool,
    pub is_weak: bool,
    pub is_flanking: bool,
    /// Set only by a stack wipe; later wipes chain onto it.
    pub capture_chance: Option<f64>,
    /// Cumulative damage dealt over the battle.
    pub morale_dealt: f64,
    pub strength_dealt: f64,
    /// Damage taken this round.
    pub morale_loss: f64,
    pub strength_loss: f64,
}

impl CohortState {
    pub fn fresh(definition: &CombatCohortDefinition) -> Self {
        Self {
            morale: definition.max_morale,
            strength: definition.max_strength,
            target: None,
            target_support: None,
            is_defeated: false,
            defeated_round: None,
            is_destroyed: false,
            is_weak: false,
            is_flanking: false,
            capture_chance: None,
            morale_dealt: 0.0,
            strength_dealt: 0.0,
            morale_loss: 0.0,
            strength_loss: 0.0,
        }
    }
}

/// `rows × width` grid of frontline slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontline {
    rows: Vec<Vec<Option<CohortIx>>>,
}

impl Frontline {
    pub fn new(rows: usize, width: usize) -> Self {
        Self {
            rows: vec![vec![None; width]; rows],
        }
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> &[Option<CohortIx>] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, row: usize, column: usize) -> Option<CohortIx> {
        self.rows.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    /// Writes a slot. Out-of-range positions are ignored.
    pub fn set(&mut self, row: usize, column: usize, cohort: Option<CohortIx>) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *slot = cohort;
        }
    }

    /// `(row, column, cohort)` for every occupied slot, row-major.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, CohortIx)> + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(c, slot)| slot.map(|ix| (r, c, ix)))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.occupied().next().is_none()
    }
}

/// Cohorts waiting to deploy, queued by preferred role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    pub front: VecDeque<CohortIx>,
    pub flank: VecDeque<CohortIx>,
    pub support: VecDeque<CohortIx>,
}

impl Reserve {
    pub fn queue_mut(&mut self, role: UnitRole) -> &mut VecDeque<CohortIx> {
        match role {
            UnitRole::Front => &mut self.front,
            UnitRole::Flank => &mut self.flank,
            UnitRole::Support => &mut self.support,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = CohortIx> + '_ {
        self.front
            .iter()
            .chain(&self.flank)
            .chain(&self.support)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.front.len() + self.flank.len() + self.support.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One side's positions within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideRound {
    pub frontline: Frontline,
    pub reserve: Reserve,
    /// Cohorts that have left the frontline, oldest first. Display only.
    pub defeated: Vec<CohortIx>,
    /// Dice value used this round.
    pub dice: u8,
}

impl SideRound {
    pub fn new(rows: usize, width: usize) -> Self {
        Self {
            frontline: Frontline::new(rows, width),
            reserve: Reserve::default(),
            defeated: Vec::new(),
            dice: 0,
        }
    }

    /// Every cohort this side holds, in frontline, reserve or defeated.
    pub fn members(&self) -> impl Iterator<Item = CohortIx> + '_ {
        self.frontline
            .occupied()
            .map(|(_, _, ix)| ix)
            .chain(self.reserve.iter())
            .chain(self.defeated.iter().copied())
    }
}

/// Frozen state of a battle after one round.
///
/// Round −1 is the undeployed state, round 0 the deployed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub number: i32,
    pub phase: Phase,
    /// Aligned with the cohort arena.
    pub cohorts: Vec<CohortState>,
    pub sides: [SideRound; 2],
    pub fight_over: bool,
    /// Side that was stack wiped, if any.
    pub stack_wiped: Option<Side>,
}

impl Round {
    pub fn side(&self, side: Side) -> &SideRound {
        &self.sides[side.index()]
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideRound {
        &mut self.sides[side.index()]
    }

    pub fn cohort(&self, ix: CohortIx) -> Option<&CohortState> {
        self.cohorts.get(ix)
    }

    /// Present and not defeated.
    pub fn is_alive(&self, ix: CohortIx) -> bool {
        self.cohorts.get(ix).is_some_and(|c| !c.is_defeated)
    }

    /// A side can keep fighting while it has a frontline and any live cohort.
    pub fn is_viable(&self, side: Side) -> bool {
        let side_round = self.side(side);
        side_round.frontline.width() > 0
            && side_round
                .frontline
                .occupied()
                .map(|(_, _, ix)| ix)
                .chain(side_round.reserve.iter())
                .any(|ix| self.is_alive(ix))
    }
}


#[cfg(test)]
impl Round {
    /// Every arena index sits in exactly one frontline slot, reserve
    /// queue or defeated list across both sides.
    pub(crate) fn every_cohort_placed_once(&self) -> bool {
        let mut seen = vec![0u32; self.cohorts.len()];
        for ix in self.sides.iter().flat_map(|s| s.members()) {
            match seen.get_mut(ix) {
                Some(count) => *count += 1,
                None => return false,
            }
        }
        seen.iter().all(|&count| count == 1)
    }
}
