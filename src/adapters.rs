//! Wire-format adapters: backend records in, domain entities out (and back).
//! The resolver and orchestrator only ever see entities; every raw-shape
//! assumption lives here.

use serde_json::{Map, Value, json};

use crate::domain::{
    Entity, EntityKind, Household, ParameterInterval, PersistedStatus, Policy, PopulationRef,
    Report, Simulation, SimulationIds,
};
use crate::error::PolisError;

pub fn entity_from_metadata(kind: EntityKind, raw: &Value) -> Result<Entity, PolisError> {
    match kind {
        EntityKind::Report => report_from_metadata(raw).map(Entity::Report),
        EntityKind::Simulation => simulation_from_metadata(raw).map(Entity::Simulation),
        EntityKind::Policy => policy_from_metadata(raw).map(Entity::Policy),
        EntityKind::Household => household_from_metadata(raw).map(Entity::Household),
        EntityKind::Geography => Err(PolisError::InvalidEntity {
            kind,
            reason: "geographies are reference data, not fetched records".to_string(),
        }),
    }
}

pub fn report_from_metadata(raw: &Value) -> Result<Report, PolisError> {
    let kind = EntityKind::Report;
    let id = required_str(raw, "id", kind)?;
    let country_id = required_str(raw, "country_id", kind)?
        .parse()
        .map_err(|_| invalid(kind, "country_id is not a country code"))?;
    let status = status_from_str(&required_str(raw, "status", kind)?, kind)?;

    let first = required_str(raw, "simulation_1_id", kind)?;
    let simulation_ids = match optional_str(raw, "simulation_2_id") {
        Some(second) => SimulationIds::Pair(first, second),
        None => SimulationIds::Single(first),
    };

    Ok(Report {
        id,
        country_id,
        label: optional_str(raw, "label"),
        simulation_ids,
        status,
        output: raw.get("output").filter(|v| !v.is_null()).cloned(),
    })
}

pub fn simulation_from_metadata(raw: &Value) -> Result<Simulation, PolisError> {
    let kind = EntityKind::Simulation;
    let id = required_str(raw, "id", kind)?;
    let country_id = required_str(raw, "country_id", kind)?
        .parse()
        .map_err(|_| invalid(kind, "country_id is not a country code"))?;
    let policy_id = required_str(raw, "policy_id", kind)?;
    let status = status_from_str(&required_str(raw, "status", kind)?, kind)?;

    let population_id = optional_str(raw, "population_id");
    let population = match required_str(raw, "population_type", kind)?.as_str() {
        "household" => PopulationRef::Household(population_id),
        "geography" => {
            let id = population_id
                .ok_or_else(|| invalid(kind, "geography simulation without population_id"))?;
            PopulationRef::Geography(id)
        }
        other => {
            return Err(invalid(
                kind,
                &format!("unknown population_type: {other}"),
            ));
        }
    };

    Ok(Simulation {
        id,
        country_id,
        policy_id,
        population,
        status,
        label: optional_str(raw, "label"),
    })
}

pub fn policy_from_metadata(raw: &Value) -> Result<Policy, PolisError> {
    let kind = EntityKind::Policy;
    let id = required_str(raw, "id", kind)?;
    let country_id = required_str(raw, "country_id", kind)?
        .parse()
        .map_err(|_| invalid(kind, "country_id is not a country code"))?;

    let mut params = Vec::new();
    if let Some(policy_json) = raw.get("policy_json").and_then(Value::as_object) {
        for (parameter, intervals) in policy_json {
            let Some(intervals) = intervals.as_object() else {
                return Err(invalid(kind, &format!("parameter {parameter} is not a map")));
            };
            for (range, value) in intervals {
                let (start_date, end_date) = range
                    .split_once('.')
                    .ok_or_else(|| invalid(kind, &format!("bad date range: {range}")))?;
                params.push(ParameterInterval {
                    parameter: parameter.clone(),
                    start_date: start_date.to_string(),
                    end_date: end_date.to_string(),
                    value: value.clone(),
                });
            }
        }
    }

    Ok(Policy {
        id,
        country_id,
        label: optional_str(raw, "label"),
        params,
    })
}

pub fn household_from_metadata(raw: &Value) -> Result<Household, PolisError> {
    let kind = EntityKind::Household;
    Ok(Household {
        id: required_str(raw, "id", kind)?,
        country_id: required_str(raw, "country_id", kind)?
            .parse()
            .map_err(|_| invalid(kind, "country_id is not a country code"))?,
        label: optional_str(raw, "label"),
        payload: raw
            .get("household_json")
            .cloned()
            .ok_or_else(|| invalid(kind, "missing household_json"))?,
    })
}

pub fn policy_creation_payload(policy: &Policy) -> Value {
    let mut policy_json = Map::new();
    for interval in &policy.params {
        let entry = policy_json
            .entry(interval.parameter.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(map) = entry.as_object_mut() {
            map.insert(
                format!("{}.{}", interval.start_date, interval.end_date),
                interval.value.clone(),
            );
        }
    }
    json!({
        "country_id": policy.country_id.as_str(),
        "label": policy.label,
        "policy_json": Value::Object(policy_json),
    })
}

pub fn household_creation_payload(household: &Household) -> Value {
    json!({
        "country_id": household.country_id.as_str(),
        "label": household.label,
        "household_json": household.payload,
    })
}

pub fn simulation_creation_payload(simulation: &Simulation) -> Value {
    let (population_type, population_id) = match &simulation.population {
        PopulationRef::Household(id) => ("household", id.clone()),
        PopulationRef::Geography(id) => ("geography", Some(id.clone())),
    };
    json!({
        "country_id": simulation.country_id.as_str(),
        "policy_id": simulation.policy_id,
        "population_type": population_type,
        "population_id": population_id,
    })
}

pub fn report_creation_payload(report: &Report) -> Value {
    let (first, second) = match &report.simulation_ids {
        SimulationIds::Single(a) => (a.clone(), None),
        SimulationIds::Pair(a, b) => (a.clone(), Some(b.clone())),
    };
    json!({
        "country_id": report.country_id.as_str(),
        "simulation_1_id": first,
        "simulation_2_id": second,
    })
}

fn status_from_str(value: &str, kind: EntityKind) -> Result<PersistedStatus, PolisError> {
    match value {
        "pending" => Ok(PersistedStatus::Pending),
        "complete" => Ok(PersistedStatus::Complete),
        "error" => Ok(PersistedStatus::Error),
        other => Err(invalid(kind, &format!("unknown status: {other}"))),
    }
}

fn required_str(raw: &Value, field: &str, kind: EntityKind) -> Result<String, PolisError> {
    match raw.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        // Numeric server ids are common; normalize them to strings.
        Some(Value::Number(value)) => Ok(value.to_string()),
        _ => Err(invalid(kind, &format!("missing field: {field}"))),
    }
}

fn optional_str(raw: &Value, field: &str) -> Option<String> {
    match raw.get(field) {
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    }
}

fn invalid(kind: EntityKind, reason: &str) -> PolisError {
    PolisError::InvalidEntity {
        kind,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn report_with_two_simulations() {
        let raw = json!({
            "id": "rep-1",
            "country_id": "us",
            "simulation_1_id": "sim-1",
            "simulation_2_id": "sim-2",
            "status": "complete",
            "output": {"budget": 1.0},
        });

        let report = report_from_metadata(&raw).unwrap();
        assert_eq!(
            report.simulation_ids,
            SimulationIds::Pair("sim-1".to_string(), "sim-2".to_string())
        );
        assert_eq!(report.status, PersistedStatus::Complete);
        assert!(report.output.is_some());
    }

    #[test]
    fn report_missing_status_is_invalid() {
        let raw = json!({
            "id": "rep-1",
            "country_id": "us",
            "simulation_1_id": "sim-1",
        });

        let err = report_from_metadata(&raw).unwrap_err();
        assert_matches!(err, PolisError::InvalidEntity { .. });
    }

    #[test]
    fn simulation_population_tag_dispatch() {
        let household = json!({
            "id": "sim-1",
            "country_id": "us",
            "policy_id": "pol-1",
            "population_type": "household",
            "population_id": "hh-1",
            "status": "pending",
        });
        let sim = simulation_from_metadata(&household).unwrap();
        assert_eq!(
            sim.population,
            PopulationRef::Household(Some("hh-1".to_string()))
        );

        let geography = json!({
            "id": "sim-2",
            "country_id": "us",
            "policy_id": "pol-1",
            "population_type": "geography",
            "population_id": "state/ca",
            "status": "pending",
        });
        let sim = simulation_from_metadata(&geography).unwrap();
        assert_eq!(sim.population, PopulationRef::Geography("state/ca".to_string()));
    }

    #[test]
    fn simulation_household_without_population_id() {
        let raw = json!({
            "id": "sim-1",
            "country_id": "us",
            "policy_id": "pol-1",
            "population_type": "household",
            "status": "pending",
        });

        let sim = simulation_from_metadata(&raw).unwrap();
        assert_eq!(sim.population, PopulationRef::Household(None));
    }

    #[test]
    fn policy_intervals_round_trip() {
        let raw = json!({
            "id": "pol-1",
            "country_id": "uk",
            "label": "Fuel duty freeze",
            "policy_json": {
                "gov.hmrc.fuel_duty.petrol_and_diesel": {
                    "2024-01-01.2028-12-31": 0.5295,
                },
            },
        });

        let policy = policy_from_metadata(&raw).unwrap();
        assert_eq!(policy.params.len(), 1);
        assert_eq!(policy.params[0].start_date, "2024-01-01");

        let payload = policy_creation_payload(&policy);
        assert_eq!(
            payload["policy_json"]["gov.hmrc.fuel_duty.petrol_and_diesel"]
                ["2024-01-01.2028-12-31"],
            json!(0.5295)
        );
    }

    #[test]
    fn numeric_ids_normalize_to_strings() {
        let raw = json!({
            "id": 81234,
            "country_id": "us",
            "simulation_1_id": 551,
            "status": "pending",
        });

        let report = report_from_metadata(&raw).unwrap();
        assert_eq!(report.id, "81234");
        assert_eq!(report.simulation_ids, SimulationIds::Single("551".to_string()));
    }
}
