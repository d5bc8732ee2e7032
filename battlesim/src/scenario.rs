use anyhow::{bail, Context, Result};
use battlesim_core::{
    ArmyDefinition, Bucket, CohortDefinition, GameEngine, GeneralAttribute, UnitAttribute,
    UnitRole, UnitType,
};

const ROSTER_KEY: &str = "roster";
const GENERAL_KEY: &str = "general";

/// Stock unit types for an engine. Support units are `archers` in
/// Imperator and `artillery` in EU4.
pub fn standard_roster(engine: GameEngine) -> Vec<UnitType> {
    match engine {
        GameEngine::Imperator => vec![
            unit("infantry", UnitRole::Front, 1.0, 8.0, &[]),
            unit("cavalry", UnitRole::Flank, 2.0, 10.0, &[]),
            unit("archers", UnitRole::Support, 1.0, 8.0, &[]),
        ],
        GameEngine::Eu4 => {
            use UnitAttribute::*;
            vec![
                unit(
                    "infantry",
                    UnitRole::Front,
                    1.0,
                    10.0,
                    &[
                        (OffensiveFirePips, 1.0),
                        (DefensiveFirePips, 1.0),
                        (OffensiveShockPips, 1.0),
                        (DefensiveShockPips, 1.0),
                        (OffensiveMoralePips, 1.0),
                        (DefensiveMoralePips, 1.0),
                    ],
                ),
                unit(
                    "cavalry",
                    UnitRole::Flank,
                    2.0,
                    25.0,
                    &[
                        (OffensiveShockPips, 3.0),
                        (DefensiveShockPips, 2.0),
                        (OffensiveMoralePips, 2.0),
                        (DefensiveMoralePips, 2.0),
                    ],
                ),
                unit(
                    "artillery",
                    UnitRole::Support,
                    1.0,
                    30.0,
                    &[
                        (OffensiveFirePips, 2.0),
                        (DefensiveFirePips, 2.0),
                        (DefensiveShockPips, 1.0),
                        (OffensiveMoralePips, 1.0),
                        (DefensiveMoralePips, 1.0),
                    ],
                ),
            ]
        }
    }
}

fn unit(
    id: &str,
    role: UnitRole,
    maneuver: f64,
    cost: f64,
    pips: &[(UnitAttribute, f64)],
) -> UnitType {
    let mut unit_type = UnitType::new(id, role);
    unit_type.values.add_values(
        Bucket::Base,
        ROSTER_KEY,
        [
            (UnitAttribute::Morale, 3.0),
            (UnitAttribute::Strength, 1000.0),
            (UnitAttribute::Maneuver, maneuver),
            (UnitAttribute::MilitaryTactics, 1.0),
            (UnitAttribute::Cost, cost),
        ]
        .into_iter()
        .chain(pips.iter().cloned()),
    );
    unit_type
}

/// Parses `"infantry=10,cavalry=4"` into `(unit type, count)` pairs.
pub fn parse_cohort_mix(spec: &str) -> Result<Vec<(String, u32)>> {
    let mut mix = Vec::new();
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, count) = entry
            .split_once('=')
            .with_context(|| format!("expected <unit>=<count>, got '{}'", entry))?;
        let count = count
            .trim()
            .parse()
            .with_context(|| format!("invalid cohort count in '{}'", entry))?;
        mix.push((name.trim().to_string(), count));
    }
    Ok(mix)
}

/// Builds one side from a cohort mix. Cohort ids continue from `first_id`.
pub fn build_army(
    roster: &[UnitType],
    mix: &[(String, u32)],
    martial: f64,
    first_id: u32,
) -> Result<ArmyDefinition> {
    let mut army = ArmyDefinition::default();
    army.general
        .values
        .add_values(Bucket::Base, GENERAL_KEY, [(GeneralAttribute::Martial, martial)]);
    let mut id = first_id;
    for (name, count) in mix {
        if !roster.iter().any(|t| t.id.0 == *name) {
            let known: Vec<&str> = roster.iter().map(|t| t.id.0.as_str()).collect();
            bail!("unknown unit type '{}' (known: {})", name, known.join(", "));
        }
        for _ in 0..*count {
            army.cohorts.push(CohortDefinition::new(id, name.as_str()));
            id += 1;
        }
    }
    Ok(army)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cohort_mix() {
        let mix = parse_cohort_mix("infantry=10, cavalry=4").unwrap();
        assert_eq!(
            mix,
            vec![("infantry".to_string(), 10), ("cavalry".to_string(), 4)]
        );
        assert!(parse_cohort_mix("").unwrap().is_empty());
        assert!(parse_cohort_mix("infantry").is_err());
        assert!(parse_cohort_mix("infantry=lots").is_err());
    }

    #[test]
    fn test_build_army_assigns_ids() {
        let roster = standard_roster(GameEngine::Imperator);
        let mix = parse_cohort_mix("infantry=2,archers=1").unwrap();
        let army = build_army(&roster, &mix, 3.0, 100).unwrap();
        let ids: Vec<u32> = army.cohorts.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![100, 101, 102]);
        assert_eq!(
            army.general.values.calculate_value(&GeneralAttribute::Martial),
            3.0
        );
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let roster = standard_roster(GameEngine::Imperator);
        let mix = parse_cohort_mix("artillery=1").unwrap();
        let err = build_army(&roster, &mix, 0.0, 1).unwrap_err();
        assert!(err.to_string().contains("artillery"));
    }
}
