use serde_json::json;

use polis_report_manager::domain::{
    CountryId, PersistedStatus, PopulationRef, Report, Simulation, SimulationIds,
};
use polis_report_manager::status::{
    CalcPhase, CalcStatus, DisplayState, InMemoryStatusFeed, StatusKey, report_status,
};

fn us() -> CountryId {
    "us".parse().unwrap()
}

fn household_sim(id: &str, status: PersistedStatus) -> Simulation {
    Simulation {
        id: id.to_string(),
        country_id: us(),
        policy_id: "pol-1".to_string(),
        population: PopulationRef::Household(Some("hh-1".to_string())),
        status,
        label: None,
    }
}

fn geography_sim(id: &str, status: PersistedStatus) -> Simulation {
    Simulation {
        id: id.to_string(),
        country_id: us(),
        policy_id: "pol-1".to_string(),
        population: PopulationRef::Geography("us".to_string()),
        status,
        label: None,
    }
}

fn report(status: PersistedStatus) -> Report {
    Report {
        id: "rep-1".to_string(),
        country_id: us(),
        label: None,
        simulation_ids: SimulationIds::Pair("sim-1".to_string(), "sim-2".to_string()),
        status,
        output: None,
    }
}

#[test]
fn economy_report_reads_feed_under_report_id() {
    let feed = InMemoryStatusFeed::new();
    let mut live = CalcStatus::new(CalcPhase::Pending);
    live.progress = Some(0.6);
    live.queue_position = Some(1);
    feed.publish(StatusKey::Report("rep-1".to_string()), live);

    let report = report(PersistedStatus::Pending);
    let simulations = vec![
        geography_sim("sim-1", PersistedStatus::Pending),
        geography_sim("sim-2", PersistedStatus::Pending),
    ];

    let view = report_status(&report, &simulations, &feed);
    assert_eq!(view.state, DisplayState::Computing);
    assert_eq!(view.progress, Some(0.6));
    assert_eq!(view.queue_position, Some(1));
}

#[test]
fn ephemeral_complete_beats_persisted_pending() {
    let feed = InMemoryStatusFeed::new();
    let mut live = CalcStatus::new(CalcPhase::Complete);
    live.result = Some(json!({"net_income_change": 540}));
    feed.publish(StatusKey::Report("rep-1".to_string()), live);

    let report = report(PersistedStatus::Pending);
    let simulations = vec![geography_sim("sim-1", PersistedStatus::Pending)];

    let view = report_status(&report, &simulations, &feed);
    assert_eq!(view.state, DisplayState::Complete);
    assert_eq!(view.result, Some(json!({"net_income_change": 540})));
}

#[test]
fn household_pending_simulation_wins() {
    let feed = InMemoryStatusFeed::new();
    let mut live = CalcStatus::new(CalcPhase::Pending);
    live.message = Some("computing baseline".to_string());
    feed.publish(StatusKey::Simulation("sim-2".to_string()), live);

    let report = report(PersistedStatus::Complete);
    let simulations = vec![
        household_sim("sim-1", PersistedStatus::Complete),
        household_sim("sim-2", PersistedStatus::Complete),
    ];

    let view = report_status(&report, &simulations, &feed);
    assert_eq!(view.state, DisplayState::Computing);
    assert_eq!(view.message.as_deref(), Some("computing baseline"));
}

#[test]
fn household_all_complete_aggregates_complete() {
    let feed = InMemoryStatusFeed::new();
    let report = report(PersistedStatus::Pending);
    let simulations = vec![
        household_sim("sim-1", PersistedStatus::Complete),
        household_sim("sim-2", PersistedStatus::Complete),
    ];

    let view = report_status(&report, &simulations, &feed);
    assert_eq!(view.state, DisplayState::Complete);
}

#[test]
fn household_mixed_states_fall_back_to_report_status() {
    // One complete, one errored: neither branch of the aggregate applies, so
    // the report's own persisted status answers.
    let feed = InMemoryStatusFeed::new();
    let report = report(PersistedStatus::Error);
    let simulations = vec![
        household_sim("sim-1", PersistedStatus::Complete),
        household_sim("sim-2", PersistedStatus::Error),
    ];

    let view = report_status(&report, &simulations, &feed);
    assert_eq!(view.state, DisplayState::Error);
}

#[test]
fn idle_feed_entry_does_not_override() {
    let feed = InMemoryStatusFeed::new();
    feed.publish(
        StatusKey::Simulation("sim-1".to_string()),
        CalcStatus::new(CalcPhase::Idle),
    );

    let report = report(PersistedStatus::Complete);
    let simulations = vec![
        household_sim("sim-1", PersistedStatus::Complete),
        household_sim("sim-2", PersistedStatus::Complete),
    ];

    let view = report_status(&report, &simulations, &feed);
    assert_eq!(view.state, DisplayState::Complete);
}

#[test]
fn cleared_feed_entry_falls_back() {
    let feed = InMemoryStatusFeed::new();
    let key = StatusKey::Simulation("sim-1".to_string());
    feed.publish(key.clone(), CalcStatus::new(CalcPhase::Pending));
    feed.clear(&key);

    let report = report(PersistedStatus::Pending);
    let simulations = vec![household_sim("sim-1", PersistedStatus::Pending)];

    let view = report_status(&report, &simulations, &feed);
    assert_eq!(view.state, DisplayState::Computing);
    assert!(view.message.is_none());
}
