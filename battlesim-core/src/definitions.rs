//! Input definitions consumed by the combat core.
//!
//! These are built by the surrounding data layer (unit rosters, country
//! modifiers, tech) and only mutated through the attribute-edit functions in
//! [`crate::values`].

use crate::values::{merge_values, AttributeContainer, HasValues};
use serde::{Deserialize, Serialize};

pub type CohortId = u32;

/// Unit type key (e.g. `"archers"`, `"infantry"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(pub String);

impl UnitTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UnitTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terrain key (e.g. `"forest"`, `"river"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerrainId(pub String);

impl TerrainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Tactic key (e.g. `"shock_action"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TacticId(pub String);

impl TacticId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Cohort attributes.
///
/// Bonus-style attributes (`Discipline`, `DamageDone`, `FireDamageDone`, …)
/// enter the damage formulas as `(1 + value)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitAttribute {
    Morale,
    Strength,
    Discipline,
    CombatAbility,
    DamageDone,
    DamageTaken,
    FireDamageDone,
    FireDamageTaken,
    ShockDamageDone,
    ShockDamageTaken,
    StrengthDamageDone,
    StrengthDamageTaken,
    MoraleDamageDone,
    MoraleDamageTaken,
    OffensiveFirePips,
    DefensiveFirePips,
    OffensiveShockPips,
    DefensiveShockPips,
    OffensiveMoralePips,
    DefensiveMoralePips,
    MilitaryTactics,
    Experience,
    /// Flanking range in frontline slots.
    Maneuver,
    Cost,
    Maintenance,
    CaptureResist,
    /// Damage bonus when fighting on this terrain.
    Terrain(TerrainId),
    /// Damage bonus against this unit type.
    VersusUnitType(UnitTypeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainAttribute {
    /// Pip modifier for the attacking side.
    Roll,
    /// Added to the combat width.
    CombatWidth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralAttribute {
    Martial,
    Fire,
    Shock,
    Maneuver,
    /// Below 1.0 the attacker suffers border terrain penalties.
    CrossingSupport,
    CaptureChance,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TacticAttribute {
    /// Increases damage taken by the side using the tactic.
    Casualties,
    /// Effectiveness against the enemy's tactic.
    Versus(TacticId),
}

/// Preferred deployment position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitRole {
    #[default]
    Front,
    Flank,
    Support,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitMode {
    #[default]
    Land,
    Naval,
}

/// Roster entry shared by every cohort of this type.
#[derive(Debug, Clone, Default)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub role: UnitRole,
    pub parent: Option<UnitTypeId>,
    pub values: AttributeContainer<UnitAttribute>,
}

impl Default for UnitTypeId {
    fn default() -> Self {
        Self::new("")
    }
}

impl UnitType {
    pub fn new(id: impl Into<String>, role: UnitRole) -> Self {
        Self {
            id: UnitTypeId::new(id),
            role,
            parent: None,
            values: AttributeContainer::new(),
        }
    }
}

impl HasValues<UnitAttribute> for UnitType {
    fn values(&self) -> &AttributeContainer<UnitAttribute> {
        &self.values
    }

    fn values_mut(&mut self) -> &mut AttributeContainer<UnitAttribute> {
        &mut self.values
    }
}

/// A single deployable cohort owned by an army.
#[derive(Debug, Clone)]
pub struct CohortDefinition {
    pub id: CohortId,
    pub unit_type: UnitTypeId,
    pub is_loyal: bool,
    pub values: AttributeContainer<UnitAttribute>,
    pub parent: Option<UnitTypeId>,
    pub culture: Option<String>,
    pub tech: Option<u32>,
    pub role: Option<UnitRole>,
    pub mode: UnitMode,
}

impl CohortDefinition {
    pub fn new(id: CohortId, unit_type: impl Into<String>) -> Self {
        Self {
            id,
            unit_type: UnitTypeId::new(unit_type),
            is_loyal: false,
            values: AttributeContainer::new(),
            parent: None,
            culture: None,
            tech: None,
            role: None,
            mode: UnitMode::Land,
        }
    }

    /// Folds the roster entry into this cohort.
    ///
    /// Cohort fields win over type fields; attribute buckets are deep-merged.
    pub fn with_unit_type(&self, unit_type: &UnitType) -> CohortDefinition {
        let mut merged = merge_values(self, unit_type);
        merged.role = self.role.or(Some(unit_type.role));
        if merged.parent.is_none() {
            merged.parent = unit_type.parent.clone();
        }
        merged
    }

    pub fn resolved_role(&self) -> UnitRole {
        self.role.unwrap_or_default()
    }
}

impl HasValues<UnitAttribute> for CohortDefinition {
    fn values(&self) -> &AttributeContainer<UnitAttribute> {
        &self.values
    }

    fn values_mut(&mut self) -> &mut AttributeContainer<UnitAttribute> {
        &mut self.values
    }
}

/// Where a terrain applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainLocation {
    /// Crossing between provinces (rivers, straits).
    Border,
    #[default]
    Tile,
}

#[derive(Debug, Clone)]
pub struct TerrainDefinition {
    pub id: TerrainId,
    pub location: TerrainLocation,
    pub values: AttributeContainer<TerrainAttribute>,
}

impl TerrainDefinition {
    pub fn new(id: impl Into<String>, location: TerrainLocation) -> Self {
        Self {
            id: TerrainId::new(id),
            location,
            values: AttributeContainer::new(),
        }
    }
}

impl HasValues<TerrainAttribute> for TerrainDefinition {
    fn values(&self) -> &AttributeContainer<TerrainAttribute> {
        &self.values
    }

    fn values_mut(&mut self) -> &mut AttributeContainer<TerrainAttribute> {
        &mut self.values
    }
}

#[derive(Debug, Clone)]
pub struct TacticDefinition {
    pub id: TacticId,
    pub values: AttributeContainer<TacticAttribute>,
}

impl TacticDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: TacticId::new(id),
            values: AttributeContainer::new(),
        }
    }
}

impl HasValues<TacticAttribute> for TacticDefinition {
    fn values(&self) -> &AttributeContainer<TacticAttribute> {
        &self.values
    }

    fn values_mut(&mut self) -> &mut AttributeContainer<TacticAttribute> {
        &mut self.values
    }
}

#[derive(Debug, Clone)]
pub struct GeneralDefinition {
    pub enabled: bool,
    pub values: AttributeContainer<GeneralAttribute>,
}

impl Default for GeneralDefinition {
    fn default() -> Self {
        Self {
            enabled: true,
            values: AttributeContainer::new(),
        }
    }
}

impl HasValues<GeneralAttribute> for GeneralDefinition {
    fn values(&self) -> &AttributeContainer<GeneralAttribute> {
        &self.values
    }

    fn values_mut(&mut self) -> &mut AttributeContainer<GeneralAttribute> {
        &mut self.values
    }
}

/// How a side's dice are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiceMode {
    #[default]
    Random,
    /// Manual roll; the random draw is still consumed to keep replays aligned.
    Fixed(u8),
}

/// Everything one side brings to a battle.
#[derive(Debug, Clone, Default)]
pub struct ArmyDefinition {
    pub general: GeneralDefinition,
    pub tactic: Option<TacticDefinition>,
    /// Cohorts in reserve order.
    pub cohorts: Vec<CohortDefinition>,
    pub dice: DiceMode,
}

impl ArmyDefinition {
    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::{add_values, calculate_value, Bucket};

    #[test]
    fn test_with_unit_type_merges_values_and_role() {
        let mut archers = UnitType::new("archers", UnitRole::Support);
        add_values(
            &mut archers,
            Bucket::Base,
            "archers",
            [(UnitAttribute::Morale, 3.0), (UnitAttribute::Strength, 1000.0)],
        );

        let mut cohort = CohortDefinition::new(7, "archers");
        add_values(
            &mut cohort,
            Bucket::Modifier,
            "tech",
            [(UnitAttribute::Morale, 0.1)],
        );

        let merged = cohort.with_unit_type(&archers);
        assert_eq!(merged.id, 7);
        assert_eq!(merged.resolved_role(), UnitRole::Support);
        assert_eq!(calculate_value(&merged, &UnitAttribute::Morale), 3.3);
        assert_eq!(calculate_value(&merged, &UnitAttribute::Strength), 1000.0);
    }

    #[test]
    fn test_cohort_role_overrides_type_role() {
        let cavalry = UnitType::new("cavalry", UnitRole::Flank);
        let mut cohort = CohortDefinition::new(1, "cavalry");
        cohort.role = Some(UnitRole::Front);
        assert_eq!(cohort.with_unit_type(&cavalry).resolved_role(), UnitRole::Front);
    }
}
