//! Roll modifiers (pips).
//!
//! A round's roll is the side's dice plus pips from three sources:
//! - general skill difference
//! - terrain (attacker only)
//! - the cohort's offensive pips against its target's defensive pips
//!
//! The non-dice part is capped by `max_pips` and the total never goes
//! below zero.

use crate::army::GeneralStats;
use crate::config::Settings;
use crate::definitions::{TerrainAttribute, TerrainDefinition, TerrainLocation};
use crate::state::{CombatCohortDefinition, Phase};

/// Which pip pair of a cohort to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipKind {
    Fire,
    Shock,
    Morale,
}

impl PipKind {
    /// The strength pip kind used in a phase, if any.
    pub fn for_phase(phase: Phase) -> Option<PipKind> {
        match phase {
            Phase::Default => None,
            Phase::Fire => Some(PipKind::Fire),
            Phase::Shock => Some(PipKind::Shock),
        }
    }

    /// Morale pips count in every phase; fire and shock only in their own.
    fn applies_in(self, phase: Phase) -> bool {
        match self {
            PipKind::Morale => true,
            PipKind::Fire => phase == Phase::Fire,
            PipKind::Shock => phase == Phase::Shock,
        }
    }
}

/// `max(0, floor((own martial − enemy martial) / 2) + own skill − enemy skill)`.
pub fn general_pips(own: &GeneralStats, enemy: &GeneralStats, phase: Phase) -> f64 {
    let martial = ((own.martial - enemy.martial) / 2.0).floor();
    let skill = own.phase_skill(phase) - enemy.phase_skill(phase);
    (martial + skill).max(0.0)
}

/// Terrain roll modifiers.
///
/// Tile terrain applies to the attacker. Border terrain applies to the
/// attacker only without crossing support and when the attacker's general
/// does not out-maneuver the defender's. The defender never gets terrain pips.
pub fn terrain_pips(
    terrains: &[TerrainDefinition],
    is_attacker: bool,
    general: &GeneralStats,
    enemy_general: &GeneralStats,
) -> f64 {
    if !is_attacker {
        return 0.0;
    }
    let border_applies =
        general.crossing_support < 1.0 && general.maneuver <= enemy_general.maneuver;
    terrains
        .iter()
        .filter(|terrain| match terrain.location {
            TerrainLocation::Tile => true,
            TerrainLocation::Border => border_applies,
        })
        .map(|terrain| terrain.values.calculate_value(&TerrainAttribute::Roll))
        .sum()
}

fn pip_pair(cohort: &CombatCohortDefinition, kind: PipKind) -> (f64, f64) {
    let pips = &cohort.pips;
    match kind {
        PipKind::Fire => (pips.offensive_fire, pips.defensive_fire),
        PipKind::Shock => (pips.offensive_shock, pips.defensive_shock),
        PipKind::Morale => (pips.offensive_morale, pips.defensive_morale),
    }
}

/// Offensive pip of `source` minus defensive pip of `target` minus the
/// rounded-up share of the defensive pip of the cohort supporting `target`.
pub fn cohort_pips(
    source: &CombatCohortDefinition,
    target: &CombatCohortDefinition,
    target_support: Option<&CombatCohortDefinition>,
    kind: PipKind,
    phase: Phase,
    defensive_support_ratio: f64,
) -> f64 {
    if !kind.applies_in(phase) {
        return 0.0;
    }
    let (offensive, _) = pip_pair(source, kind);
    let (_, defensive) = pip_pair(target, kind);
    let support = target_support
        .map(|support| (defensive_support_ratio * pip_pair(support, kind).1).ceil())
        .unwrap_or(0.0);
    offensive - defensive - support
}

/// Dice plus pips, with pips capped at `max_pips` and the total at ≥ 0.
pub fn total_roll(dice: u8, general: f64, terrain: f64, cohort: f64, max_pips: i32) -> f64 {
    let pips = (general + terrain + cohort).min(max_pips as f64);
    (dice as f64 + pips).max(0.0)
}

/// Damage ratio for a cohort attacking from the support row.
pub fn support_attenuation(from_back_row: bool, settings: &Settings) -> f64 {
    if from_back_row {
        settings.backrow_damage_ratio
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::UnitRole;
    use crate::state::{PipStats, Side};
    use crate::values::Bucket;

    fn general(martial: f64, fire: f64, shock: f64) -> GeneralStats {
        GeneralStats {
            martial,
            fire,
            shock,
            ..GeneralStats::default()
        }
    }

    fn cohort(pips: PipStats) -> CombatCohortDefinition {
        CombatCohortDefinition {
            id: 1,
            side: Side::Attacker,
            unit_type: crate::definitions::UnitTypeId::new("infantry"),
            role: UnitRole::Front,
            is_loyal: false,
            max_morale: 3.0,
            max_strength: 1000.0,
            experience: 0.0,
            maneuver: 1,
            cost: 0.0,
            maintenance: 0.0,
            capture_resist: 0.0,
            pips,
            attributes: Default::default(),
        }
    }

    fn terrain(location: TerrainLocation, roll: f64) -> TerrainDefinition {
        let mut terrain = TerrainDefinition::new("t", location);
        terrain
            .values
            .add_values(Bucket::Base, "terrain", [(TerrainAttribute::Roll, roll)]);
        terrain
    }

    #[test]
    fn test_general_pips_floor_martial_difference() {
        let own = general(5.0, 0.0, 0.0);
        let enemy = general(2.0, 0.0, 0.0);
        // floor(3 / 2) = 1
        assert_eq!(general_pips(&own, &enemy, Phase::Default), 1.0);
        // Negative totals clamp to zero.
        assert_eq!(general_pips(&enemy, &own, Phase::Default), 0.0);
    }

    #[test]
    fn test_general_pips_phase_skill() {
        let own = general(0.0, 3.0, 1.0);
        let enemy = general(0.0, 1.0, 1.0);
        assert_eq!(general_pips(&own, &enemy, Phase::Fire), 2.0);
        assert_eq!(general_pips(&own, &enemy, Phase::Shock), 0.0);
        assert_eq!(general_pips(&own, &enemy, Phase::Default), 0.0);
    }

    #[test]
    fn test_terrain_pips_only_for_attacker() {
        let terrains = vec![terrain(TerrainLocation::Tile, -1.0)];
        let g = GeneralStats::default();
        assert_eq!(terrain_pips(&terrains, true, &g, &g), -1.0);
        assert_eq!(terrain_pips(&terrains, false, &g, &g), 0.0);
    }

    #[test]
    fn test_border_terrain_needs_no_crossing_support() {
        let terrains = vec![terrain(TerrainLocation::Border, -2.0)];
        let plain = GeneralStats::default();
        assert_eq!(terrain_pips(&terrains, true, &plain, &plain), -2.0);

        let supported = GeneralStats {
            crossing_support: 1.0,
            ..GeneralStats::default()
        };
        assert_eq!(terrain_pips(&terrains, true, &supported, &plain), 0.0);

        let outmaneuvers = GeneralStats {
            maneuver: 3.0,
            ..GeneralStats::default()
        };
        assert_eq!(terrain_pips(&terrains, true, &outmaneuvers, &plain), 0.0);
    }

    #[test]
    fn test_cohort_pips_with_support() {
        let source = cohort(PipStats {
            offensive_fire: 3.0,
            ..PipStats::default()
        });
        let target = cohort(PipStats {
            defensive_fire: 1.0,
            ..PipStats::default()
        });
        let support = cohort(PipStats {
            defensive_fire: 1.0,
            ..PipStats::default()
        });
        // 3 − 1 − ceil(0.5 × 1) = 1
        let pips = cohort_pips(&source, &target, Some(&support), PipKind::Fire, Phase::Fire, 0.5);
        assert_eq!(pips, 1.0);
        // Fire pips do nothing in the shock phase.
        let pips = cohort_pips(&source, &target, Some(&support), PipKind::Fire, Phase::Shock, 0.5);
        assert_eq!(pips, 0.0);
    }

    #[test]
    fn test_morale_pips_ignore_phase() {
        let source = cohort(PipStats {
            offensive_morale: 2.0,
            ..PipStats::default()
        });
        let target = cohort(PipStats::default());
        for phase in Phase::ALL {
            assert_eq!(
                cohort_pips(&source, &target, None, PipKind::Morale, phase, 0.5),
                2.0
            );
        }
    }

    #[test]
    fn test_total_roll_clamps() {
        assert_eq!(total_roll(3, 8.0, 0.0, 5.0, 10), 13.0);
        assert_eq!(total_roll(1, 0.0, -4.0, 0.0, 10), 0.0);
    }

    #[test]
    fn test_support_attenuation() {
        let settings = Settings::eu4();
        assert_eq!(support_attenuation(true, &settings), 0.5);
        assert_eq!(support_attenuation(false, &settings), 1.0);
    }
}
