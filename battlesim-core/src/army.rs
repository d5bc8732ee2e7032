//! Army-level setup: turns two [`ArmyDefinition`]s into a prepared battle.
//!
//! Runs in a fixed order:
//! 1. merge unit types into cohorts
//! 2. army-wide attribute effects (flank ratio penalty)
//! 3. cohort conversion into the arena
//! 4. general and tactic derived stats, in a separate pass

use crate::config::Settings;
use crate::defines::army::FLANK_RATIO_KEY;
use crate::definitions::{
    ArmyDefinition, CohortDefinition, DiceMode, GeneralAttribute, GeneralDefinition,
    TacticAttribute, TacticDefinition, TerrainAttribute, UnitAttribute, UnitRole,
};
use crate::state::{CohortIx, CombatCohort, Phase, Side};
use crate::systems::pips::terrain_pips;
use crate::systems::precalc::{convert_cohort, ConversionContext};
use crate::values::{regenerate_values, Bucket};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// General values after attribute resolution. Zero when disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralStats {
    pub martial: f64,
    pub fire: f64,
    pub shock: f64,
    pub maneuver: f64,
    pub crossing_support: f64,
    pub capture_chance: f64,
}

impl GeneralStats {
    pub fn from_definition(general: &GeneralDefinition) -> Self {
        if !general.enabled {
            return Self::default();
        }
        let value = |attribute: GeneralAttribute| general.values.calculate_value(&attribute);
        Self {
            martial: value(GeneralAttribute::Martial),
            fire: value(GeneralAttribute::Fire),
            shock: value(GeneralAttribute::Shock),
            maneuver: value(GeneralAttribute::Maneuver),
            crossing_support: value(GeneralAttribute::CrossingSupport),
            capture_chance: value(GeneralAttribute::CaptureChance),
        }
    }

    /// Skill that counts in a phase. The default phase uses none.
    pub fn phase_skill(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Default => 0.0,
            Phase::Fire => self.fire,
            Phase::Shock => self.shock,
        }
    }
}

/// One side of a prepared battle.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedArmy {
    pub general: GeneralStats,
    /// Damage multiplier from the tactic matchup.
    pub tactic_damage: f64,
    /// Terrain pips this side gets every round.
    pub terrain_pips: f64,
    pub dice: DiceMode,
    /// Arena indices in reserve order.
    pub cohorts: Vec<CohortIx>,
}

/// Immutable per-battle data shared by every round.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBattle {
    pub cohorts: Arc<[CombatCohort]>,
    pub sides: [PreparedArmy; 2],
    /// Frontline width after terrain modifiers.
    pub combat_width: usize,
}

impl PreparedBattle {
    pub fn side(&self, side: Side) -> &PreparedArmy {
        &self.sides[side.index()]
    }

    pub fn cohort(&self, ix: CohortIx) -> Option<&CombatCohort> {
        self.cohorts.get(ix)
    }
}

/// Morale penalty when flank units exceed `settings.flank_ratio`.
///
/// Each cohort gets a Modifier contribution under [`FLANK_RATIO_KEY`];
/// a zero penalty removes it again.
pub fn apply_flank_ratio_penalty(cohorts: &mut [CohortDefinition], settings: &Settings) {
    if cohorts.is_empty() {
        return;
    }
    let flank = cohorts
        .iter()
        .filter(|c| c.resolved_role() == UnitRole::Flank)
        .count();
    let excess = (flank as f64 / cohorts.len() as f64 - settings.flank_ratio).max(0.0);
    let penalty = -settings.flank_ratio_penalty * excess;
    for cohort in cohorts.iter_mut() {
        regenerate_values(
            cohort,
            Bucket::Modifier,
            FLANK_RATIO_KEY,
            [(UnitAttribute::Morale, penalty)],
        );
    }
}

/// `(1 + own effectiveness against enemy tactic) × (1 + enemy casualties)`.
pub fn tactic_damage_multiplier(
    own: Option<&TacticDefinition>,
    enemy: Option<&TacticDefinition>,
) -> f64 {
    let effectiveness = match (own, enemy) {
        (Some(own), Some(enemy)) => own
            .values
            .calculate_value(&TacticAttribute::Versus(enemy.id.clone())),
        _ => 0.0,
    };
    let casualties = enemy
        .map(|t| t.values.calculate_value(&TacticAttribute::Casualties))
        .unwrap_or(0.0);
    (1.0 + effectiveness) * (1.0 + casualties)
}

/// Cohorts with their unit types merged in.
fn resolve_cohorts(ctx: &ConversionContext<'_>, army: &ArmyDefinition) -> Vec<CohortDefinition> {
    army.cohorts
        .iter()
        .map(|cohort| match ctx.unit_type(&cohort.unit_type) {
            Some(unit_type) => cohort.with_unit_type(unit_type),
            None => cohort.clone(),
        })
        .collect()
}

/// Builds the cohort arena and per-side stats.
#[instrument(skip_all, name = "prepare_battle")]
pub fn prepare_battle(
    ctx: &ConversionContext<'_>,
    attacker: &ArmyDefinition,
    defender: &ArmyDefinition,
) -> PreparedBattle {
    let armies = [attacker, defender];
    let mut arena = Vec::new();
    let mut members: [Vec<CohortIx>; 2] = Default::default();

    for side in Side::BOTH {
        let mut cohorts = resolve_cohorts(ctx, armies[side.index()]);
        apply_flank_ratio_penalty(&mut cohorts, ctx.settings);
        for cohort in &cohorts {
            members[side.index()].push(arena.len());
            arena.push(convert_cohort(ctx, cohort, side));
        }
    }

    // Second pass: values that depend on both sides.
    let generals = armies.map(|army| GeneralStats::from_definition(&army.general));
    let sides = Side::BOTH.map(|side| {
        let own = armies[side.index()];
        let enemy = armies[side.enemy().index()];
        PreparedArmy {
            general: generals[side.index()],
            tactic_damage: tactic_damage_multiplier(own.tactic.as_ref(), enemy.tactic.as_ref()),
            terrain_pips: terrain_pips(
                ctx.terrains,
                side == Side::Attacker,
                &generals[side.index()],
                &generals[side.enemy().index()],
            ),
            dice: own.dice,
            cohorts: std::mem::take(&mut members[side.index()]),
        }
    });

    let terrain_width: f64 = ctx
        .terrains
        .iter()
        .map(|t| t.values.calculate_value(&TerrainAttribute::CombatWidth))
        .sum();
    let combat_width = (ctx.settings.combat_width as f64 + terrain_width).max(0.0) as usize;

    log::debug!(
        "Prepared battle: {} vs {} cohorts, width {}",
        sides[0].cohorts.len(),
        sides[1].cohorts.len(),
        combat_width
    );

    PreparedBattle {
        cohorts: arena.into(),
        sides,
        combat_width,
    }
}
