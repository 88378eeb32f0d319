use serde::Serialize;
use tracing::debug;

use crate::adapters;
use crate::api::ApiClient;
use crate::app::{ProgressEvent, ProgressSink};
use crate::assoc::Association;
use crate::cache::EntityCache;
use crate::domain::{
    Entity, EntityKind, Geography, Household, Policy, Report, Simulation,
};
use crate::error::PolisError;
use crate::fetch::fetch_entities;
use crate::reference::GeographyTable;

/// A report association hydrated into its full dependency graph.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedReport {
    pub association: Association,
    pub report: Report,
    pub simulations: Vec<Simulation>,
    pub policies: Vec<Policy>,
    pub households: Vec<Household>,
    pub geographies: Vec<Geography>,
}

/// Walks the fixed-depth dependency graph: report → simulations →
/// {policies, populations}. All fetches go through the cache-first fan-out
/// engine, so an id referenced twice within one resolution is fetched once.
pub struct DependencyResolver<'a> {
    api: &'a dyn ApiClient,
    cache: &'a EntityCache,
    regions: &'a GeographyTable,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(api: &'a dyn ApiClient, cache: &'a EntityCache, regions: &'a GeographyTable) -> Self {
        Self { api, cache, regions }
    }

    pub fn resolve(
        &self,
        association: &Association,
        sink: &dyn ProgressSink,
    ) -> Result<ResolvedReport, PolisError> {
        let country = &association.country_id;

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; report {}", association.entity_id),
            elapsed: None,
        });
        let report_ids = vec![association.entity_id.clone()];
        let report = fetch_entities(self.cache, EntityKind::Report, &report_ids, |id| {
            self.fetch(EntityKind::Report, country, id)
        })
        .into_entities()?
        .into_iter()
        .next()
        .map(expect_report)
        .transpose()?
        .ok_or_else(|| PolisError::NotFound {
            kind: EntityKind::Report,
            id: association.entity_id.clone(),
        })?;

        let simulation_ids = report.simulation_ids.as_vec();
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {} simulations", simulation_ids.len()),
            elapsed: None,
        });
        let simulations = fetch_entities(self.cache, EntityKind::Simulation, &simulation_ids, |id| {
            self.fetch(EntityKind::Simulation, country, id)
        })
        .into_entities()?
        .into_iter()
        .map(expect_simulation)
        .collect::<Result<Vec<_>, _>>()?;

        // Multiple simulations routinely share a policy (baseline vs reform
        // against the same baseline); fetch each distinct id once.
        let policy_ids = dedup(simulations.iter().map(|sim| sim.policy_id.clone()));
        let household_ids = dedup(
            simulations
                .iter()
                .filter_map(|sim| sim.population.household_id())
                .map(str::to_string),
        );
        debug!(
            policies = policy_ids.len(),
            households = household_ids.len(),
            "dependency fan-out"
        );

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {} policies", policy_ids.len()),
            elapsed: None,
        });
        let policies = fetch_entities(self.cache, EntityKind::Policy, &policy_ids, |id| {
            self.fetch(EntityKind::Policy, country, id)
        })
        .into_entities()?
        .into_iter()
        .map(expect_policy)
        .collect::<Result<Vec<_>, _>>()?;

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {} households", household_ids.len()),
            elapsed: None,
        });
        let households = fetch_entities(self.cache, EntityKind::Household, &household_ids, |id| {
            self.fetch(EntityKind::Household, country, id)
        })
        .into_entities()?
        .into_iter()
        .map(expect_household)
        .collect::<Result<Vec<_>, _>>()?;

        // Geographies are reference data: constructed, never fetched.
        let geography_ids = dedup(
            simulations
                .iter()
                .filter_map(|sim| sim.population.geography_id())
                .map(str::to_string),
        );
        let geographies = geography_ids
            .iter()
            .map(|id| {
                let geography = self.regions.geography(country, id);
                self.cache.set(Entity::Geography(geography.clone()));
                geography
            })
            .collect();

        Ok(ResolvedReport {
            association: association.clone(),
            report,
            simulations,
            policies,
            households,
            geographies,
        })
    }

    fn fetch(&self, kind: EntityKind, country: &crate::domain::CountryId, id: &str) -> Result<Entity, PolisError> {
        let raw = self.api.fetch_entity(kind, country, id)?;
        adapters::entity_from_metadata(kind, &raw)
    }
}

fn dedup(ids: impl Iterator<Item = String>) -> Vec<String> {
    let mut distinct = Vec::new();
    for id in ids {
        if !distinct.contains(&id) {
            distinct.push(id);
        }
    }
    distinct
}

fn expect_report(entity: Entity) -> Result<Report, PolisError> {
    match entity {
        Entity::Report(report) => Ok(report),
        other => Err(mismatch(EntityKind::Report, &other)),
    }
}

fn expect_simulation(entity: Entity) -> Result<Simulation, PolisError> {
    match entity {
        Entity::Simulation(sim) => Ok(sim),
        other => Err(mismatch(EntityKind::Simulation, &other)),
    }
}

fn expect_policy(entity: Entity) -> Result<Policy, PolisError> {
    match entity {
        Entity::Policy(policy) => Ok(policy),
        other => Err(mismatch(EntityKind::Policy, &other)),
    }
}

fn expect_household(entity: Entity) -> Result<Household, PolisError> {
    match entity {
        Entity::Household(household) => Ok(household),
        other => Err(mismatch(EntityKind::Household, &other)),
    }
}

fn mismatch(expected: EntityKind, got: &Entity) -> PolisError {
    PolisError::InvalidEntity {
        kind: expected,
        reason: format!("cache slot held a {} entity", got.kind()),
    }
}
