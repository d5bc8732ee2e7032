//! Converts cohort definitions into combat-ready arena entries.
//!
//! All damage multipliers are folded into per-phase tables once per battle
//! setup so round resolution only does lookups. Every attribute family is
//! gated by its own [`Settings`] flag.

use crate::config::{DisciplineMode, Settings};
use crate::defines::combat::{LOYAL_BONUS, MIN_MULTIPLIER, STRENGTH_SCALE};
use crate::definitions::{
    CohortDefinition, TerrainDefinition, UnitAttribute, UnitType, UnitTypeId,
};
use crate::state::{
    CombatCohort, CombatCohortCalculated, CombatCohortDefinition, Phase, PipStats, Side,
};
use rustc_hash::FxHashMap;

/// Read-only inputs shared by every conversion in one battle.
#[derive(Debug, Clone, Copy)]
pub struct ConversionContext<'a> {
    pub settings: &'a Settings,
    pub terrains: &'a [TerrainDefinition],
    pub unit_types: &'a [UnitType],
}

impl<'a> ConversionContext<'a> {
    pub fn new(
        settings: &'a Settings,
        terrains: &'a [TerrainDefinition],
        unit_types: &'a [UnitType],
    ) -> Self {
        Self {
            settings,
            terrains,
            unit_types,
        }
    }

    pub fn unit_type(&self, id: &UnitTypeId) -> Option<&'a UnitType> {
        self.unit_types.iter().find(|t| &t.id == id)
    }
}

/// Value of an attribute when its gate is on, zero otherwise.
fn gated(enabled: bool, value: f64) -> f64 {
    if enabled {
        value
    } else {
        0.0
    }
}

/// Converts one cohort. The cohort should already have its unit type merged.
pub fn convert_cohort(
    ctx: &ConversionContext<'_>,
    cohort: &CohortDefinition,
    side: Side,
) -> CombatCohort {
    CombatCohort {
        definition: convert_definition(cohort, side),
        calculated: calculate_damage(ctx, cohort),
    }
}

fn convert_definition(cohort: &CohortDefinition, side: Side) -> CombatCohortDefinition {
    let value = |attribute: UnitAttribute| cohort.values.calculate_value(&attribute);
    let attributes = cohort
        .values
        .keys()
        .map(|key| (key.clone(), cohort.values.calculate_value(key)))
        .collect();
    CombatCohortDefinition {
        id: cohort.id,
        side,
        unit_type: cohort.unit_type.clone(),
        role: cohort.resolved_role(),
        is_loyal: cohort.is_loyal,
        max_morale: value(UnitAttribute::Morale),
        max_strength: value(UnitAttribute::Strength),
        experience: value(UnitAttribute::Experience),
        maneuver: value(UnitAttribute::Maneuver).max(0.0).round() as u32,
        cost: value(UnitAttribute::Cost),
        maintenance: value(UnitAttribute::Maintenance),
        capture_resist: value(UnitAttribute::CaptureResist),
        pips: PipStats {
            offensive_fire: value(UnitAttribute::OffensiveFirePips),
            defensive_fire: value(UnitAttribute::DefensiveFirePips),
            offensive_shock: value(UnitAttribute::OffensiveShockPips),
            defensive_shock: value(UnitAttribute::DefensiveShockPips),
            offensive_morale: value(UnitAttribute::OffensiveMoralePips),
            defensive_morale: value(UnitAttribute::DefensiveMoralePips),
        },
        attributes,
    }
}

/// Multiplier applied to base damage in each phase.
fn phase_damage_done(cohort: &CohortDefinition, settings: &Settings, phase: Phase) -> f64 {
    let value = |attribute: UnitAttribute| {
        gated(
            settings.attribute_phase_damage,
            cohort.values.calculate_value(&attribute),
        )
    };
    match phase {
        Phase::Default => 1.0,
        Phase::Fire => 1.0 + value(UnitAttribute::FireDamageDone),
        Phase::Shock => 1.0 + value(UnitAttribute::ShockDamageDone),
    }
}

fn calculate_damage(ctx: &ConversionContext<'_>, cohort: &CohortDefinition) -> CombatCohortCalculated {
    let settings = ctx.settings;
    let value = |attribute: UnitAttribute| cohort.values.calculate_value(&attribute);

    let discipline = match settings.discipline {
        DisciplineMode::Off => 0.0,
        DisciplineMode::Damage | DisciplineMode::Both => value(UnitAttribute::Discipline),
    };
    let terrain_bonus: f64 = if settings.attribute_terrain_type {
        ctx.terrains
            .iter()
            .map(|terrain| value(UnitAttribute::Terrain(terrain.id.clone())))
            .sum()
    } else {
        0.0
    };
    let loyal = if settings.attribute_loyal && cohort.is_loyal {
        LOYAL_BONUS
    } else {
        1.0
    };
    let base_damage = settings.precision
        * (1.0 + discipline)
        * (1.0 + gated(settings.attribute_combat_ability, value(UnitAttribute::CombatAbility)))
        * (1.0 + gated(settings.attribute_damage, value(UnitAttribute::DamageDone)))
        * (1.0 + terrain_bonus)
        * loyal;

    let strength_done = (1.0
        + gated(
            settings.attribute_strength_damage,
            value(UnitAttribute::StrengthDamageDone),
        ))
        * settings.strength_lost_multiplier
        / STRENGTH_SCALE;
    let morale_done = (1.0
        + gated(
            settings.attribute_morale_damage,
            value(UnitAttribute::MoraleDamageDone),
        ))
        * settings.morale_lost_multiplier
        / STRENGTH_SCALE;

    let mut strength_damage: [FxHashMap<UnitTypeId, f64>; 3] = Default::default();
    let mut morale_damage: [FxHashMap<UnitTypeId, f64>; 3] = Default::default();
    let mut base_strength_damage = [0.0; 3];
    let mut base_morale_damage = [0.0; 3];
    for phase in Phase::ALL {
        let i = phase.index();
        let per_phase = base_damage * phase_damage_done(cohort, settings, phase);
        base_strength_damage[i] = per_phase * strength_done;
        base_morale_damage[i] = per_phase * morale_done;
        for unit_type in ctx.unit_types {
            let versus = gated(
                settings.attribute_unit_type,
                value(UnitAttribute::VersusUnitType(unit_type.id.clone())),
            );
            let per_type = per_phase * (1.0 + versus);
            strength_damage[i].insert(unit_type.id.clone(), per_type * strength_done);
            morale_damage[i].insert(unit_type.id.clone(), per_type * morale_done);
        }
    }

    let reduction = damage_reduction(cohort, settings);
    let mut strength_taken = [0.0; 3];
    let mut morale_taken = [0.0; 3];
    for phase in Phase::ALL {
        let i = phase.index();
        let phase_taken = match phase {
            Phase::Default => 0.0,
            Phase::Fire => value(UnitAttribute::FireDamageTaken),
            Phase::Shock => value(UnitAttribute::ShockDamageTaken),
        };
        let taken = reduction * (1.0 + gated(settings.attribute_phase_damage, phase_taken));
        strength_taken[i] = taken
            * (1.0
                + gated(
                    settings.attribute_strength_damage,
                    value(UnitAttribute::StrengthDamageTaken),
                ));
        morale_taken[i] = taken
            * (1.0
                + gated(
                    settings.attribute_morale_damage,
                    value(UnitAttribute::MoraleDamageTaken),
                ));
    }

    CombatCohortCalculated {
        strength_damage,
        morale_damage,
        base_strength_damage,
        base_morale_damage,
        strength_taken,
        morale_taken,
    }
}

/// Experience reduction on damage taken (negative is less damage).
///
/// Without `fix_experience` the reduction is scaled by the cohort's
/// morale and strength damage taken, as the game itself does.
pub fn experience_reduction(cohort: &CohortDefinition, settings: &Settings) -> f64 {
    let value = |attribute: UnitAttribute| cohort.values.calculate_value(&attribute);
    let reduction = -value(UnitAttribute::Experience) * settings.experience_damage_reduction;
    if settings.fix_experience {
        reduction
    } else {
        reduction
            * (2.0
                + value(UnitAttribute::MoraleDamageTaken)
                + value(UnitAttribute::StrengthDamageTaken))
            / 2.0
    }
}

/// Phase-independent damage taken multiplier.
pub fn damage_reduction(cohort: &CohortDefinition, settings: &Settings) -> f64 {
    let value = |attribute: UnitAttribute| cohort.values.calculate_value(&attribute);
    let experience = if settings.attribute_experience {
        1.0 + experience_reduction(cohort, settings)
    } else {
        1.0
    };
    let discipline = match settings.discipline {
        DisciplineMode::Both => value(UnitAttribute::Discipline),
        DisciplineMode::Off | DisciplineMode::Damage => 0.0,
    };
    let tactics = if settings.attribute_military_tactics {
        value(UnitAttribute::MilitaryTactics)
    } else {
        1.0
    };
    experience * (1.0 + gated(settings.attribute_damage, value(UnitAttribute::DamageTaken)))
        / (1.0 + discipline).max(MIN_MULTIPLIER)
        / tactics.max(MIN_MULTIPLIER)
}
