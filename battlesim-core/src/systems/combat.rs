//! Round resolution.
//!
//! Each round is derived from the previous frozen [`Round`]:
//! 1. Remove last round's defeated cohorts and reinforce the frontline
//! 2. Pick targets (opposite slot, else nearest within maneuver, left first)
//! 3. Compute every hit against the start-of-round state, then commit
//! 4. Daily morale loss, defeat checks, stack wipe, fight over
//!
//! No step fails: a cohort without a target or arena entry deals nothing.

use crate::army::PreparedBattle;
use crate::config::Settings;
use crate::defines::capture::{MAX_CHANCE, MIN_CHANCE};
use crate::defines::combat::{BACK_ROW, FRONT_ROW, MIN_MULTIPLIER, STRENGTH_SCALE};
use crate::state::{CohortIx, Frontline, Phase, Round, Side};
use crate::systems::deployment::reinforce;
use crate::systems::pips::{
    cohort_pips, general_pips, support_attenuation, total_roll, PipKind,
};
use tracing::instrument;

/// Damage one cohort deals to its target in a round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub source: CohortIx,
    pub target: CohortIx,
    pub strength: f64,
    pub morale: f64,
}

/// Resolves one round. `dice` is indexed by [`Side::index`].
#[instrument(skip_all, name = "round")]
pub fn resolve_round(
    previous: &Round,
    prepared: &PreparedBattle,
    settings: &Settings,
    dice: [u8; 2],
) -> Round {
    let mut round = previous.clone();
    round.number = previous.number + 1;
    round.phase = Phase::for_round(round.number, settings);
    for side in Side::BOTH {
        round.side_mut(side).dice = dice[side.index()];
    }
    for state in &mut round.cohorts {
        state.morale_loss = 0.0;
        state.strength_loss = 0.0;
    }

    remove_defeated(&mut round);
    reinforce(&mut round, settings);
    assign_targets(&mut round, prepared);

    let hits = calculate_hits(&round, prepared, settings);
    commit_hits(&mut round, &hits);
    apply_daily_morale_loss(&mut round, prepared, settings);
    check_defeat(&mut round, prepared, settings);
    if settings.stackwipe {
        check_stack_wipe(&mut round, prepared, settings);
    }

    if Side::BOTH.iter().any(|&side| !round.is_viable(side)) {
        round.fight_over = true;
        remove_defeated(&mut round);
    }

    log::trace!(
        "Round {} ({:?}): dice {:?}, {} hits, fight over: {}",
        round.number,
        round.phase,
        dice,
        hits.len(),
        round.fight_over
    );
    round
}

/// Moves defeated cohorts off the frontline into the defeated list.
fn remove_defeated(round: &mut Round) {
    let Round { cohorts, sides, .. } = round;
    for side in sides.iter_mut() {
        let leaving: Vec<_> = side
            .frontline
            .occupied()
            .filter(|&(_, _, ix)| cohorts.get(ix).map_or(true, |s| s.is_defeated))
            .collect();
        for (row, column, ix) in leaving {
            side.frontline.set(row, column, None);
            side.defeated.push(ix);
        }
    }
}

/// Opposite live enemy, else the nearest within `maneuver` slots, left first.
fn find_target(
    enemy: &Frontline,
    column: usize,
    maneuver: u32,
    round: &Round,
) -> Option<(usize, CohortIx)> {
    let live = |col: usize| {
        enemy
            .get(FRONT_ROW, col)
            .filter(|&ix| round.is_alive(ix))
            .map(|ix| (col, ix))
    };
    if let Some(found) = live(column) {
        return Some(found);
    }
    for distance in 1..=maneuver as usize {
        let left = column.checked_sub(distance).and_then(|col| live(col));
        if left.is_some() {
            return left;
        }
        if let Some(found) = live(column + distance) {
            return Some(found);
        }
    }
    None
}

fn assign_targets(round: &mut Round, prepared: &PreparedBattle) {
    for state in &mut round.cohorts {
        state.target = None;
        state.target_support = None;
        state.is_flanking = false;
    }
    let mut assignments = Vec::new();
    for side in Side::BOTH {
        let own = &round.side(side).frontline;
        let enemy = &round.side(side.enemy()).frontline;
        for (_, column, ix) in own.occupied() {
            if !round.is_alive(ix) {
                continue;
            }
            let maneuver = prepared.cohort(ix).map_or(0, |c| c.definition.maneuver);
            if let Some((target_column, target)) = find_target(enemy, column, maneuver, round) {
                let support = enemy
                    .get(BACK_ROW, target_column)
                    .filter(|&s| round.is_alive(s));
                assignments.push((ix, target, support, target_column != column));
            }
        }
    }
    for (ix, target, support, flanking) in assignments {
        if let Some(state) = round.cohorts.get_mut(ix) {
            state.target = Some(target);
            state.target_support = support;
            state.is_flanking = flanking;
        }
    }
}

fn roll_factor(roll: f64, settings: &Settings) -> f64 {
    settings.base_damage + settings.roll_damage * roll
}

/// Every hit of the round, read from the start-of-round state only.
pub fn calculate_hits(round: &Round, prepared: &PreparedBattle, settings: &Settings) -> Vec<Hit> {
    let phase = round.phase;
    let daily = 1.0 + settings.daily_damage_increase * round.number as f64;
    let mut hits = Vec::new();

    for side in Side::BOTH {
        let own = prepared.side(side);
        let enemy = prepared.side(side.enemy());
        let general = general_pips(&own.general, &enemy.general, phase);
        let dice = round.side(side).dice;

        for (row, _, ix) in round.side(side).frontline.occupied() {
            let Some(state) = round.cohort(ix) else { continue };
            if state.is_defeated {
                continue;
            }
            let Some(target_ix) = state.target else { continue };
            let (Some(source), Some(target)) = (prepared.cohort(ix), prepared.cohort(target_ix))
            else {
                continue;
            };
            let support = state
                .target_support
                .and_then(|s| prepared.cohort(s))
                .map(|c| &c.definition);

            let pips = |kind: PipKind| {
                cohort_pips(
                    &source.definition,
                    &target.definition,
                    support,
                    kind,
                    phase,
                    settings.defensive_support_ratio,
                )
            };
            let phase_pips = PipKind::for_phase(phase).map_or(0.0, pips);
            let morale_pips = phase_pips + pips(PipKind::Morale);
            let strength_roll =
                total_roll(dice, general, own.terrain_pips, phase_pips, settings.max_pips);
            let morale_roll =
                total_roll(dice, general, own.terrain_pips, morale_pips, settings.max_pips);

            let multiplier =
                daily * support_attenuation(row == BACK_ROW, settings) * own.tactic_damage;
            let target_type = &target.definition.unit_type;
            let strength = source.calculated.strength_damage(phase, target_type)
                * roll_factor(strength_roll, settings)
                * state.strength
                * multiplier
                * target.calculated.strength_taken[phase.index()];
            let morale = source.calculated.morale_damage(phase, target_type)
                * roll_factor(morale_roll, settings)
                * state.strength
                / STRENGTH_SCALE
                * source.definition.max_morale
                * multiplier
                * target.calculated.morale_taken[phase.index()];

            hits.push(Hit {
                source: ix,
                target: target_ix,
                strength,
                morale,
            });
        }
    }
    hits
}

fn commit_hits(round: &mut Round, hits: &[Hit]) {
    for hit in hits {
        if let Some(target) = round.cohorts.get_mut(hit.target) {
            target.strength -= hit.strength;
            target.morale -= hit.morale;
            target.strength_loss += hit.strength;
            target.morale_loss += hit.morale;
        }
        if let Some(source) = round.cohorts.get_mut(hit.source) {
            source.strength_dealt += hit.strength;
            source.morale_dealt += hit.morale;
        }
    }
}

fn frontline_members(round: &Round) -> Vec<CohortIx> {
    round
        .sides
        .iter()
        .flat_map(|side| side.frontline.occupied().map(|(_, _, ix)| ix))
        .collect()
}

fn apply_daily_morale_loss(round: &mut Round, prepared: &PreparedBattle, settings: &Settings) {
    if settings.daily_morale_loss <= 0.0 {
        return;
    }
    for ix in frontline_members(round) {
        let Some(cohort) = prepared.cohort(ix) else { continue };
        let loss = settings.daily_morale_loss * cohort.definition.max_morale;
        if let Some(state) = round.cohorts.get_mut(ix).filter(|s| !s.is_defeated) {
            state.morale -= loss;
            state.morale_loss += loss;
        }
    }
}

/// Defeat is one-way and records its round; destruction implies defeat.
fn check_defeat(round: &mut Round, prepared: &PreparedBattle, settings: &Settings) {
    let number = round.number;
    for ix in frontline_members(round) {
        let Some(cohort) = prepared.cohort(ix) else { continue };
        let Some(state) = round.cohorts.get_mut(ix) else { continue };
        if state.is_defeated {
            continue;
        }
        if state.strength <= settings.minimum_strength || state.morale <= settings.minimum_morale {
            state.is_defeated = true;
            state.defeated_round = Some(number);
            state.is_destroyed = state.strength <= 0.0;
        }
        state.is_weak = state.morale < settings.weak_morale_ratio * cohort.definition.max_morale;
    }
}

fn side_strength(round: &Round, prepared: &PreparedBattle, side: Side, alive_only: bool) -> f64 {
    prepared
        .side(side)
        .cohorts
        .iter()
        .filter_map(|&ix| round.cohort(ix))
        .filter(|state| !alive_only || !state.is_defeated)
        .map(|state| state.strength.max(0.0))
        .sum()
}

/// Hard wipe: the enemy outnumbers the whole side in any round.
/// Soft wipe: the side was just defeated early in the battle.
fn check_stack_wipe(round: &mut Round, prepared: &PreparedBattle, settings: &Settings) {
    if round.stack_wiped.is_some() {
        return;
    }
    for side in Side::BOTH {
        let own = side_strength(round, prepared, side, false);
        let enemy = side_strength(round, prepared, side.enemy(), true);
        let ratio = enemy / own.max(MIN_MULTIPLIER);
        let hard = ratio >= settings.hard_stackwipe_requirement;
        let soft = !round.is_viable(side)
            && i64::from(round.number) < i64::from(settings.stackwipe_rounds)
            && ratio >= settings.soft_stackwipe_requirement;
        if enemy > 0.0 && (hard || soft) {
            stack_wipe(round, prepared, settings, side);
            return;
        }
    }
}

/// Chained capture probability: `1 − (1 − old)(1 − new)`.
pub fn chain_capture_chance(old: Option<f64>, chance: f64) -> f64 {
    1.0 - (1.0 - old.unwrap_or(0.0)) * (1.0 - chance)
}

/// Zeroes every remaining cohort of `side` and rolls capture chances.
pub fn stack_wipe(round: &mut Round, prepared: &PreparedBattle, settings: &Settings, side: Side) {
    let number = round.number;
    let enemy_general = prepared.side(side.enemy()).general;
    for &ix in &prepared.side(side).cohorts {
        let Some(cohort) = prepared.cohort(ix) else { continue };
        let Some(state) = round.cohorts.get_mut(ix) else { continue };
        if state.is_destroyed {
            continue;
        }
        let chance = (enemy_general.capture_chance
            * (settings.base_capture_chance - cohort.definition.capture_resist))
            .clamp(MIN_CHANCE, MAX_CHANCE);
        state.strength_loss += state.strength.max(0.0);
        state.morale_loss += state.morale.max(0.0);
        state.morale = 0.0;
        state.strength = 0.0;
        if !state.is_defeated {
            state.is_defeated = true;
            state.defeated_round = Some(number);
        }
        state.is_destroyed = true;
        state.capture_chance = Some(chain_capture_chance(state.capture_chance, chance));
    }
    round.stack_wiped = Some(side);
    log::debug!("Round {}: {} stack wiped", number, side);
}
