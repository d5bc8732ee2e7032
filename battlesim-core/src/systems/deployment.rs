//! Deployment at round 0 and reinforcement between rounds.
//!
//! Columns fill center-out. Front units take the middle, flank units the
//! columns beside them, support units whatever is left. With a back row,
//! remaining support units stand behind occupied front slots.

use crate::army::PreparedBattle;
use crate::config::Settings;
use crate::defines::combat::{BACK_ROW, FRONT_ROW};
use crate::definitions::UnitRole;
use crate::state::{CohortIx, CohortState, Phase, Round, Side, SideRound};
use std::collections::VecDeque;

/// Column order from the center outwards, left before right on ties.
pub fn center_out(width: usize) -> Vec<usize> {
    let center = (width as f64 - 1.0) / 2.0;
    let mut columns: Vec<usize> = (0..width).collect();
    columns.sort_by(|&a, &b| {
        let da = (a as f64 - center).abs();
        let db = (b as f64 - center).abs();
        da.total_cmp(&db).then(a.cmp(&b))
    });
    columns
}

fn row_count(settings: &Settings) -> usize {
    if settings.backrow {
        2
    } else {
        1
    }
}

/// Round −1: every cohort waits in reserve.
pub fn initial_round(prepared: &PreparedBattle, settings: &Settings) -> Round {
    let rows = row_count(settings);
    let width = prepared.combat_width;
    let mut sides = [SideRound::new(rows, width), SideRound::new(rows, width)];
    for side in Side::BOTH {
        let reserve = &mut sides[side.index()].reserve;
        for &ix in &prepared.side(side).cohorts {
            if let Some(cohort) = prepared.cohort(ix) {
                reserve.queue_mut(cohort.definition.role).push_back(ix);
            }
        }
    }
    Round {
        number: -1,
        phase: Phase::Default,
        cohorts: prepared
            .cohorts
            .iter()
            .map(|c| CohortState::fresh(&c.definition))
            .collect(),
        sides,
        fight_over: false,
        stack_wiped: None,
    }
}

/// Places reserve cohorts on an empty frontline, producing round 0.
pub fn deploy(previous: &Round, settings: &Settings) -> Round {
    let mut round = previous.clone();
    round.number = 0;
    round.phase = Phase::Default;
    for side in Side::BOTH {
        deploy_side(round.side_mut(side), settings);
    }
    round.fight_over = Side::BOTH.iter().any(|&side| !round.is_viable(side));
    log::debug!(
        "Deployed {} attacker and {} defender cohorts",
        round.side(Side::Attacker).frontline.occupied().count(),
        round.side(Side::Defender).frontline.occupied().count()
    );
    round
}

fn deploy_side(side: &mut SideRound, settings: &Settings) {
    let order = center_out(side.frontline.width());
    let mut slots = order.iter().copied();
    for role in [UnitRole::Front, UnitRole::Flank, UnitRole::Support] {
        let queue = side.reserve.queue_mut(role);
        while !queue.is_empty() {
            let Some(column) = slots.next() else { break };
            if let Some(ix) = queue.pop_front() {
                side.frontline.set(FRONT_ROW, column, Some(ix));
            }
        }
    }
    if settings.backrow {
        fill_back_row(side, &order);
    }
}

/// Support units stand behind occupied front slots.
fn fill_back_row(side: &mut SideRound, order: &[usize]) {
    for &column in order {
        if side.reserve.support.is_empty() {
            break;
        }
        if side.frontline.get(FRONT_ROW, column).is_some()
            && side.frontline.get(BACK_ROW, column).is_none()
        {
            let ix = side.reserve.support.pop_front();
            side.frontline.set(BACK_ROW, column, ix);
        }
    }
}

/// Pops the first live cohort. Defeated ones skipped on the way go to `defeated`.
fn next_live(
    queue: &mut VecDeque<CohortIx>,
    defeated: &mut Vec<CohortIx>,
    states: &[CohortState],
) -> Option<CohortIx> {
    while let Some(ix) = queue.pop_front() {
        if states.get(ix).is_some_and(|s| !s.is_defeated) {
            return Some(ix);
        }
        defeated.push(ix);
    }
    None
}

/// Fills empty front slots from reserve (front, flank, support queue),
/// then from the back row of the same column.
pub fn reinforce(round: &mut Round, settings: &Settings) {
    let Round { cohorts, sides, .. } = round;
    let states: &[CohortState] = cohorts;
    for side in sides.iter_mut() {
        let order = center_out(side.frontline.width());
        let SideRound {
            frontline,
            reserve,
            defeated,
            ..
        } = &mut *side;
        for &column in &order {
            if frontline.get(FRONT_ROW, column).is_some() {
                continue;
            }
            let from_reserve = [UnitRole::Front, UnitRole::Flank, UnitRole::Support]
                .into_iter()
                .find_map(|role| next_live(reserve.queue_mut(role), defeated, states));
            let replacement = from_reserve.or_else(|| {
                let behind = frontline.get(BACK_ROW, column)?;
                frontline.set(BACK_ROW, column, None);
                Some(behind)
            });
            frontline.set(FRONT_ROW, column, replacement);
        }
        if settings.backrow {
            fill_back_row(side, &order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::army::prepare_battle;
    use crate::definitions::ArmyDefinition;
    use crate::systems::precalc::ConversionContext;
    use crate::testing::{archers, cavalry, infantry, unit_roster, ArmyBuilder};

    fn prepare(
        settings: &Settings,
        attacker: ArmyDefinition,
        defender: ArmyDefinition,
    ) -> PreparedBattle {
        let roster = unit_roster();
        let ctx = ConversionContext::new(settings, &[], &roster);
        prepare_battle(&ctx, &attacker, &defender)
    }

    #[test]
    fn test_center_out_order() {
        assert_eq!(center_out(5), vec![2, 1, 3, 0, 4]);
        assert_eq!(center_out(4), vec![1, 2, 0, 3]);
        assert!(center_out(0).is_empty());
    }

    #[test]
    fn test_initial_round_queues_by_role() {
        let settings = Settings::imperator();
        let attacker = ArmyBuilder::new()
            .cohort(cavalry(1))
            .cohort(infantry(2))
            .cohort(archers(3))
            .build();
        let prepared = prepare(&settings, attacker, ArmyBuilder::new().build());
        let round = initial_round(&prepared, &settings);
        let reserve = &round.side(Side::Attacker).reserve;
        assert_eq!(reserve.front, [1]);
        assert_eq!(reserve.flank, [0]);
        assert_eq!(reserve.support, [2]);
        assert_eq!(round.number, -1);
    }

    #[test]
    fn test_deploy_places_front_center_and_flanks_outside() {
        let settings = Settings {
            combat_width: 5,
            ..Settings::imperator()
        };
        let attacker = ArmyBuilder::new()
            .cohort(infantry(1))
            .cohort(infantry(2))
            .cohort(infantry(3))
            .cohort(cavalry(4))
            .cohort(cavalry(5))
            .build();
        let defender = ArmyBuilder::new().cohort(infantry(6)).build();
        let prepared = prepare(&settings, attacker, defender);
        let round = deploy(&initial_round(&prepared, &settings), &settings);

        let row = round.side(Side::Attacker).frontline.row(FRONT_ROW).to_vec();
        assert_eq!(row, vec![Some(3), Some(1), Some(0), Some(2), Some(4)]);
        assert!(round.side(Side::Attacker).reserve.is_empty());
        assert_eq!(round.number, 0);
        assert!(!round.fight_over);
        assert!(round.every_cohort_placed_once());
    }

    #[test]
    fn test_deploy_overflow_stays_in_reserve() {
        let settings = Settings {
            combat_width: 1,
            ..Settings::imperator()
        };
        let attacker = ArmyBuilder::new().cohort(infantry(1)).cohort(infantry(2)).build();
        let defender = ArmyBuilder::new().cohort(infantry(3)).build();
        let prepared = prepare(&settings, attacker, defender);
        let round = deploy(&initial_round(&prepared, &settings), &settings);
        assert_eq!(round.side(Side::Attacker).frontline.get(FRONT_ROW, 0), Some(0));
        assert_eq!(round.side(Side::Attacker).reserve.front, [1]);
    }

    #[test]
    fn test_backrow_takes_leftover_support() {
        let settings = Settings {
            combat_width: 1,
            ..Settings::eu4()
        };
        let attacker = ArmyBuilder::new().cohort(infantry(1)).cohort(archers(2)).build();
        let defender = ArmyBuilder::new().cohort(infantry(3)).build();
        let prepared = prepare(&settings, attacker, defender);
        let round = deploy(&initial_round(&prepared, &settings), &settings);
        let frontline = &round.side(Side::Attacker).frontline;
        assert_eq!(frontline.get(FRONT_ROW, 0), Some(0));
        assert_eq!(frontline.get(BACK_ROW, 0), Some(1));
    }

    #[test]
    fn test_zero_width_deploy_is_over() {
        let settings = Settings {
            combat_width: 0,
            ..Settings::imperator()
        };
        let attacker = ArmyBuilder::new().cohort(infantry(1)).build();
        let defender = ArmyBuilder::new().cohort(infantry(2)).build();
        let prepared = prepare(&settings, attacker, defender);
        let round = deploy(&initial_round(&prepared, &settings), &settings);
        assert!(round.fight_over);
    }

    #[test]
    fn test_reinforce_fills_from_reserve_then_back_row() {
        let settings = Settings {
            combat_width: 1,
            ..Settings::eu4()
        };
        let attacker = ArmyBuilder::new()
            .cohort(infantry(1))
            .cohort(infantry(2))
            .cohort(archers(3))
            .build();
        let defender = ArmyBuilder::new().cohort(infantry(4)).build();
        let prepared = prepare(&settings, attacker, defender);
        let mut round = deploy(&initial_round(&prepared, &settings), &settings);
        assert_eq!(round.side(Side::Attacker).reserve.front, [1]);

        // Front cohort leaves; the reserve infantry steps in.
        round.side_mut(Side::Attacker).frontline.set(FRONT_ROW, 0, None);
        reinforce(&mut round, &settings);
        assert_eq!(round.side(Side::Attacker).frontline.get(FRONT_ROW, 0), Some(1));

        // Reserve empty: the archers move up from the back row.
        round.side_mut(Side::Attacker).frontline.set(FRONT_ROW, 0, None);
        reinforce(&mut round, &settings);
        let frontline = &round.side(Side::Attacker).frontline;
        assert_eq!(frontline.get(FRONT_ROW, 0), Some(2));
        assert_eq!(frontline.get(BACK_ROW, 0), None);
    }
}
