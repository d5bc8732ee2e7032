//! Builders for tests, benchmarks and quick scenarios.

use crate::battle::Battle;
use crate::config::{ConfigError, Settings};
use crate::definitions::{
    ArmyDefinition, CohortDefinition, CohortId, DiceMode, GeneralAttribute, TacticDefinition,
    TerrainDefinition, UnitAttribute, UnitRole, UnitType,
};
use crate::values::Bucket;

const BASE_KEY: &str = "base";

pub struct CohortBuilder {
    cohort: CohortDefinition,
}

impl CohortBuilder {
    /// 1000 men at 3.0 morale, nothing else.
    pub fn new(id: CohortId, unit_type: &str) -> Self {
        let mut cohort = CohortDefinition::new(id, unit_type);
        cohort.values.add_values(
            Bucket::Base,
            BASE_KEY,
            [(UnitAttribute::Morale, 3.0), (UnitAttribute::Strength, 1000.0)],
        );
        Self { cohort }
    }

    pub fn morale(self, value: f64) -> Self {
        self.base(UnitAttribute::Morale, value)
    }

    pub fn strength(self, value: f64) -> Self {
        self.base(UnitAttribute::Strength, value)
    }

    pub fn base(mut self, attribute: UnitAttribute, value: f64) -> Self {
        self.cohort
            .values
            .add_values(Bucket::Base, BASE_KEY, [(attribute, value)]);
        self
    }

    pub fn modifier(mut self, attribute: UnitAttribute, value: f64) -> Self {
        self.cohort
            .values
            .add_values(Bucket::Modifier, BASE_KEY, [(attribute, value)]);
        self
    }

    pub fn loyal(mut self) -> Self {
        self.cohort.is_loyal = true;
        self
    }

    pub fn role(mut self, role: UnitRole) -> Self {
        self.cohort.role = Some(role);
        self
    }

    pub fn build(self) -> CohortDefinition {
        self.cohort
    }
}

fn line_unit(id: CohortId, unit_type: &str, role: UnitRole) -> CohortDefinition {
    CohortBuilder::new(id, unit_type)
        .base(UnitAttribute::Maneuver, 1.0)
        .base(UnitAttribute::MilitaryTactics, 1.0)
        .base(UnitAttribute::Cost, 8.0)
        .role(role)
        .build()
}

pub fn infantry(id: CohortId) -> CohortDefinition {
    line_unit(id, "infantry", UnitRole::Front)
}

pub fn cavalry(id: CohortId) -> CohortDefinition {
    line_unit(id, "cavalry", UnitRole::Flank)
}

/// Same stats as [`infantry`], deployed as support.
pub fn archers(id: CohortId) -> CohortDefinition {
    line_unit(id, "archers", UnitRole::Support)
}

/// Unit types matching [`infantry`], [`cavalry`] and [`archers`].
pub fn unit_roster() -> Vec<UnitType> {
    vec![
        UnitType::new("infantry", UnitRole::Front),
        UnitType::new("cavalry", UnitRole::Flank),
        UnitType::new("archers", UnitRole::Support),
    ]
}

#[derive(Default)]
pub struct ArmyBuilder {
    army: ArmyDefinition,
}

impl ArmyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cohort(mut self, cohort: CohortDefinition) -> Self {
        self.army.cohorts.push(cohort);
        self
    }

    pub fn cohorts(mut self, cohorts: impl IntoIterator<Item = CohortDefinition>) -> Self {
        self.army.cohorts.extend(cohorts);
        self
    }

    pub fn martial(self, value: f64) -> Self {
        self.general_attribute(GeneralAttribute::Martial, value)
    }

    pub fn general_attribute(mut self, attribute: GeneralAttribute, value: f64) -> Self {
        self.army
            .general
            .values
            .add_values(Bucket::Base, BASE_KEY, [(attribute, value)]);
        self
    }

    pub fn dice(mut self, dice: DiceMode) -> Self {
        self.army.dice = dice;
        self
    }

    pub fn tactic(mut self, tactic: TacticDefinition) -> Self {
        self.army.tactic = Some(tactic);
        self
    }

    pub fn build(self) -> ArmyDefinition {
        self.army
    }
}

pub struct BattleBuilder {
    settings: Settings,
    terrains: Vec<TerrainDefinition>,
    unit_types: Vec<UnitType>,
    armies: [ArmyDefinition; 2],
    seed: Option<u64>,
}

impl BattleBuilder {
    /// Starts with [`unit_roster`], no terrain and two empty armies.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            terrains: Vec::new(),
            unit_types: unit_roster(),
            armies: Default::default(),
            seed: None,
        }
    }

    pub fn attacker(mut self, army: ArmyDefinition) -> Self {
        self.armies[0] = army;
        self
    }

    pub fn defender(mut self, army: ArmyDefinition) -> Self {
        self.armies[1] = army;
        self
    }

    pub fn terrain(mut self, terrain: TerrainDefinition) -> Self {
        self.terrains.push(terrain);
        self
    }

    pub fn unit_types(mut self, unit_types: Vec<UnitType>) -> Self {
        self.unit_types = unit_types;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<Battle, ConfigError> {
        let [attacker, defender] = self.armies;
        let mut battle = Battle::new(
            self.settings,
            self.terrains,
            self.unit_types,
            attacker,
            defender,
        )?;
        if let Some(seed) = self.seed {
            battle.set_seed(seed);
        }
        Ok(battle)
    }
}
