use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Value, json};

use polis_report_manager::api::ApiClient;
use polis_report_manager::app::App;
use polis_report_manager::assoc::{Association, AssociationStore};
use polis_report_manager::assoc_local::LocalAssociationStore;
use polis_report_manager::cache::EntityCache;
use polis_report_manager::domain::{CountryId, EntityKind};
use polis_report_manager::error::PolisError;
use polis_report_manager::output::JsonOutput;
use polis_report_manager::reference::GeographyTable;
use polis_report_manager::share::SaveClassification;
use polis_report_manager::status::{DisplayState, InMemoryStatusFeed};

struct MockApi {
    records: HashMap<(EntityKind, String), Value>,
    calls: Mutex<usize>,
}

impl MockApi {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            calls: Mutex::new(0),
        }
    }

    fn insert(&mut self, kind: EntityKind, id: &str, record: Value) {
        self.records.insert((kind, id.to_string()), record);
    }
}

impl ApiClient for MockApi {
    fn fetch_entity(
        &self,
        kind: EntityKind,
        _country: &CountryId,
        id: &str,
    ) -> Result<Value, PolisError> {
        *self.calls.lock().unwrap() += 1;
        self.records
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or_else(|| PolisError::NotFound {
                kind,
                id: id.to_string(),
            })
    }
}

/// Two-simulation household report: sim-1 on the current-law policy, sim-2 on
/// a reform, both over household hh-1.
fn scenario_api() -> MockApi {
    let mut api = MockApi::new();
    api.insert(
        EntityKind::Report,
        "rep-1",
        json!({
            "id": "rep-1",
            "country_id": "us",
            "simulation_1_id": "sim-1",
            "simulation_2_id": "sim-2",
            "status": "complete",
        }),
    );
    for (sim, policy) in [("sim-1", "pol-a"), ("sim-2", "pol-b")] {
        api.insert(
            EntityKind::Simulation,
            sim,
            json!({
                "id": sim,
                "country_id": "us",
                "policy_id": policy,
                "population_type": "household",
                "population_id": "hh-1",
                "status": "complete",
            }),
        );
    }
    api.insert(
        EntityKind::Policy,
        "pol-a",
        json!({"id": "pol-a", "country_id": "us", "label": "Current law", "policy_json": {}}),
    );
    api.insert(
        EntityKind::Policy,
        "pol-b",
        json!({"id": "pol-b", "country_id": "us", "label": "Tax reform", "policy_json": {}}),
    );
    api.insert(
        EntityKind::Household,
        "hh-1",
        json!({"id": "hh-1", "country_id": "us", "household_json": {"people": {}}}),
    );
    api
}

struct Fixture {
    app: App<MockApi, InMemoryStatusFeed>,
    reader: LocalAssociationStore,
    association_id: String,
    _temp: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

    let seed = LocalAssociationStore::with_root(root.clone());
    let association = Association::new("user-1", "rep-1", "us".parse().unwrap(), None);
    seed.create(EntityKind::Report, &association).unwrap();

    let mut regions = GeographyTable::builtin();
    regions.set_current_law("us", "pol-a");

    let app = App::new(
        Box::new(LocalAssociationStore::with_root(root.clone())),
        EntityCache::new(),
        scenario_api(),
        InMemoryStatusFeed::new(),
        regions,
        "user-1",
    );

    Fixture {
        app,
        reader: LocalAssociationStore::with_root(root),
        association_id: association.id,
        _temp: temp,
    }
}

#[test]
fn view_resolves_full_graph() {
    let fixture = fixture();
    let view = fixture
        .app
        .view_report(&fixture.association_id, &JsonOutput)
        .unwrap();

    assert_eq!(view.resolved.report.id, "rep-1");
    assert_eq!(view.resolved.simulations.len(), 2);
    assert_eq!(view.resolved.policies.len(), 2);
    assert_eq!(view.resolved.households.len(), 1);
    assert!(view.resolved.geographies.is_empty());
    assert_eq!(view.status.state, DisplayState::Complete);
}

#[test]
fn view_unknown_association() {
    let fixture = fixture();
    let err = fixture.app.view_report("missing", &JsonOutput).unwrap_err();
    assert_matches!(err, PolisError::AssociationNotFound(_));
}

#[test]
fn sweep_keeps_policies_and_drops_simulations() {
    let fixture = fixture();
    fixture
        .app
        .view_report(&fixture.association_id, &JsonOutput)
        .unwrap();

    let cache = fixture.app.cache();
    assert!(cache.get(EntityKind::Policy, "pol-b").is_some());
    assert!(cache.get(EntityKind::Household, "hh-1").is_some());
    assert!(cache.get(EntityKind::Simulation, "sim-1").is_none());
    assert!(cache.get(EntityKind::Report, "rep-1").is_none());
}

#[test]
fn search_cached_after_view() {
    let fixture = fixture();
    fixture
        .app
        .view_report(&fixture.association_id, &JsonOutput)
        .unwrap();

    let hits = fixture
        .app
        .search_cached(EntityKind::Policy, "label", "reform");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id(), "pol-b");
}

#[test]
fn save_report_creates_scenario_associations() {
    let fixture = fixture();
    let outcome = fixture
        .app
        .save_report(&fixture.association_id, Some("share-token-1"), &JsonOutput)
        .unwrap();

    assert_eq!(outcome.classification, SaveClassification::Success);
    // sim-1, sim-2, pol-b (pol-a is current law), hh-1.
    assert_eq!(outcome.created, 4);
    assert_eq!(outcome.report_association.id, "share-token-1");

    let sims = fixture
        .reader
        .find_by_user(EntityKind::Simulation, "user-1", None)
        .unwrap();
    assert_eq!(sims.len(), 2);
    let policies = fixture
        .reader
        .find_by_user(EntityKind::Policy, "user-1", None)
        .unwrap();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].entity_id, "pol-b");

    // A second save under the same token is a no-op.
    let again = fixture
        .app
        .save_report(&fixture.association_id, Some("share-token-1"), &JsonOutput)
        .unwrap();
    assert_eq!(again.classification, SaveClassification::AlreadySaved);
}

#[test]
fn status_reports_persisted_state_with_empty_feed() {
    let fixture = fixture();
    let result = fixture
        .app
        .calculation_status(&fixture.association_id, &JsonOutput)
        .unwrap();
    assert_eq!(result.report_id, "rep-1");
    assert_eq!(result.status.state, DisplayState::Complete);
}

#[test]
fn list_reports_for_user() {
    let fixture = fixture();
    let result = fixture.app.list_reports(None, &JsonOutput).unwrap();
    assert_eq!(result.reports.len(), 1);
    assert_eq!(result.reports[0].report_id, "rep-1");
    assert_eq!(result.reports[0].country_id, "us");

    let uk: CountryId = "uk".parse().unwrap();
    let filtered = fixture.app.list_reports(Some(&uk), &JsonOutput).unwrap();
    assert!(filtered.reports.is_empty());
}
