use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolisError;

/// Lowercase ISO-style country code ("us", "uk", ...). Entity ids are only
/// meaningful within a country's namespace, so every fetch carries one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryId(String);

impl CountryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CountryId {
    type Err = PolisError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = (2..=3).contains(&normalized.len())
            && normalized.chars().all(|ch| ch.is_ascii_lowercase());
        if !is_valid {
            return Err(PolisError::InvalidCountry(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Report,
    Simulation,
    Policy,
    Household,
    Geography,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Report => "report",
            EntityKind::Simulation => "simulation",
            EntityKind::Policy => "policy",
            EntityKind::Household => "household",
            EntityKind::Geography => "geography",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = PolisError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "report" => Ok(EntityKind::Report),
            "simulation" => Ok(EntityKind::Simulation),
            "policy" => Ok(EntityKind::Policy),
            "household" => Ok(EntityKind::Household),
            "geography" => Ok(EntityKind::Geography),
            other => Err(PolisError::InvalidEntity {
                kind: EntityKind::Report,
                reason: format!("unknown entity kind: {other}"),
            }),
        }
    }
}

/// Durable status stored on reports and simulations. Distinct from the
/// ephemeral calculation feed, which has its own richer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistedStatus {
    Pending,
    Complete,
    Error,
}

impl fmt::Display for PersistedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistedStatus::Pending => write!(f, "pending"),
            PersistedStatus::Complete => write!(f, "complete"),
            PersistedStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInterval {
    pub parameter: String,
    pub start_date: String,
    pub end_date: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub country_id: CountryId,
    pub label: Option<String>,
    pub params: Vec<ParameterInterval>,
}

/// A simulation's population reference. A household simulation may be missing
/// its population id while the household is still being created server-side;
/// such simulations are skipped by the household fan-out rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum PopulationRef {
    Household(Option<String>),
    Geography(String),
}

impl PopulationRef {
    pub fn household_id(&self) -> Option<&str> {
        match self {
            PopulationRef::Household(Some(id)) => Some(id),
            _ => None,
        }
    }

    pub fn geography_id(&self) -> Option<&str> {
        match self {
            PopulationRef::Geography(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub id: String,
    pub country_id: CountryId,
    pub policy_id: String,
    pub population: PopulationRef,
    pub status: PersistedStatus,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    pub id: String,
    pub country_id: CountryId,
    pub label: Option<String>,
    pub payload: serde_json::Value,
}

/// Geographies are enumerable reference data, never created records. They are
/// constructed from the region table rather than fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geography {
    pub id: String,
    pub country_id: CountryId,
    pub label: Option<String>,
}

/// A report references exactly one simulation (single policy) or two
/// (baseline + reform comparison).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimulationIds {
    Single(String),
    Pair(String, String),
}

impl SimulationIds {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            SimulationIds::Single(a) => vec![a.clone()],
            SimulationIds::Pair(a, b) => vec![a.clone(), b.clone()],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SimulationIds::Single(_) => 1,
            SimulationIds::Pair(_, _) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> &str {
        match self {
            SimulationIds::Single(a) | SimulationIds::Pair(a, _) => a,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub country_id: CountryId,
    pub label: Option<String>,
    pub simulation_ids: SimulationIds,
    pub status: PersistedStatus,
    pub output: Option<serde_json::Value>,
}

impl Report {
    /// True when any simulation of the report targets a geography population.
    /// Economy-wide reports key the calculation feed by report id; household
    /// reports key it per simulation.
    pub fn is_economy_wide(&self, simulations: &[Simulation]) -> bool {
        simulations
            .iter()
            .any(|sim| matches!(sim.population, PopulationRef::Geography(_)))
    }
}

/// One normalized cache slot. Whole-entity values only: a cache write replaces
/// the entire entry, so a writer must hold the complete, current entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Report(Report),
    Simulation(Simulation),
    Policy(Policy),
    Household(Household),
    Geography(Geography),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Report(_) => EntityKind::Report,
            Entity::Simulation(_) => EntityKind::Simulation,
            Entity::Policy(_) => EntityKind::Policy,
            Entity::Household(_) => EntityKind::Household,
            Entity::Geography(_) => EntityKind::Geography,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Report(report) => &report.id,
            Entity::Simulation(sim) => &sim.id,
            Entity::Policy(policy) => &policy.id,
            Entity::Household(household) => &household.id,
            Entity::Geography(geography) => &geography.id,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Entity::Report(report) => report.label.as_deref(),
            Entity::Simulation(sim) => sim.label.as_deref(),
            Entity::Policy(policy) => policy.label.as_deref(),
            Entity::Household(household) => household.label.as_deref(),
            Entity::Geography(geography) => geography.label.as_deref(),
        }
    }

    pub fn as_report(&self) -> Option<&Report> {
        match self {
            Entity::Report(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_simulation(&self) -> Option<&Simulation> {
        match self {
            Entity::Simulation(sim) => Some(sim),
            _ => None,
        }
    }

    pub fn as_policy(&self) -> Option<&Policy> {
        match self {
            Entity::Policy(policy) => Some(policy),
            _ => None,
        }
    }

    pub fn as_household(&self) -> Option<&Household> {
        match self {
            Entity::Household(household) => Some(household),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_country_id_valid() {
        let country: CountryId = " US ".parse().unwrap();
        assert_eq!(country.as_str(), "us");
    }

    #[test]
    fn parse_country_id_invalid() {
        let err = "united-states".parse::<CountryId>().unwrap_err();
        assert_matches!(err, PolisError::InvalidCountry(_));
    }

    #[test]
    fn simulation_ids_cardinality() {
        let single = SimulationIds::Single("sim-1".to_string());
        assert_eq!(single.len(), 1);
        assert_eq!(single.as_vec(), vec!["sim-1".to_string()]);

        let pair = SimulationIds::Pair("sim-1".to_string(), "sim-2".to_string());
        assert_eq!(pair.len(), 2);
        assert_eq!(pair.first(), "sim-1");
    }

    #[test]
    fn population_ref_accessors() {
        let household = PopulationRef::Household(Some("hh-1".to_string()));
        assert_eq!(household.household_id(), Some("hh-1"));
        assert_eq!(household.geography_id(), None);

        let pending = PopulationRef::Household(None);
        assert_eq!(pending.household_id(), None);

        let geography = PopulationRef::Geography("state/ca".to_string());
        assert_eq!(geography.geography_id(), Some("state/ca"));
    }

    #[test]
    fn entity_kind_round_trip() {
        for kind in [
            EntityKind::Report,
            EntityKind::Simulation,
            EntityKind::Policy,
            EntityKind::Household,
            EntityKind::Geography,
        ] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }
}
