//! Calculation status merge. Two independently-owned sources of truth feed
//! one display view: the durable status persisted on reports/simulations and
//! the ephemeral, same-session progress published by the calculation engine.
//! Nothing here transitions state; this is a pure read-side merge.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::domain::{PersistedStatus, PopulationRef, Report, Simulation};

/// Ephemeral calculation phase, as published by the calculation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcPhase {
    Idle,
    Initializing,
    Pending,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcStatus {
    pub phase: CalcPhase,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub queue_position: Option<u32>,
    pub estimated_time_remaining: Option<f64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl CalcStatus {
    pub fn new(phase: CalcPhase) -> Self {
        Self {
            phase,
            progress: None,
            message: None,
            queue_position: None,
            estimated_time_remaining: None,
            result: None,
            error: None,
        }
    }

    /// An active ephemeral status overrides the persisted one; idle and
    /// initializing carry no information the durable record lacks.
    pub fn is_active(&self) -> bool {
        !matches!(self.phase, CalcPhase::Idle | CalcPhase::Initializing)
    }
}

/// Household calculations are keyed by simulation id, economy-wide ones by
/// report id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "lowercase")]
pub enum StatusKey {
    Simulation(String),
    Report(String),
}

/// Read-only view onto the calculation engine's status records. This system
/// never writes through it.
pub trait StatusFeed: Send + Sync {
    fn lookup(&self, key: &StatusKey) -> Option<CalcStatus>;
}

/// In-memory feed surface. The calculation engine side publishes through
/// `publish`/`clear`; consumers only see the `StatusFeed` trait.
#[derive(Debug, Default)]
pub struct InMemoryStatusFeed {
    records: RwLock<HashMap<StatusKey, CalcStatus>>,
}

impl InMemoryStatusFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, key: StatusKey, status: CalcStatus) {
        self.records
            .write()
            .expect("feed lock poisoned")
            .insert(key, status);
    }

    pub fn clear(&self, key: &StatusKey) {
        self.records
            .write()
            .expect("feed lock poisoned")
            .remove(key);
    }
}

impl StatusFeed for InMemoryStatusFeed {
    fn lookup(&self, key: &StatusKey) -> Option<CalcStatus> {
        self.records
            .read()
            .expect("feed lock poisoned")
            .get(key)
            .cloned()
    }
}

/// What the user is shown for a report or simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Computing,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedStatus {
    pub state: DisplayState,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub queue_position: Option<u32>,
    pub estimated_time_remaining: Option<f64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Merge priority: an ephemeral status that exists and is active wins and
/// supplies the progress fields; otherwise the persisted status is mapped
/// with no progress detail.
pub fn unified_status(
    persisted: PersistedStatus,
    persisted_output: Option<&serde_json::Value>,
    ephemeral: Option<&CalcStatus>,
) -> UnifiedStatus {
    if let Some(live) = ephemeral.filter(|status| status.is_active()) {
        let state = match live.phase {
            CalcPhase::Pending => DisplayState::Computing,
            CalcPhase::Complete => DisplayState::Complete,
            CalcPhase::Error => DisplayState::Error,
            CalcPhase::Idle | CalcPhase::Initializing => unreachable!("inactive status filtered"),
        };
        return UnifiedStatus {
            state,
            progress: live.progress,
            message: live.message.clone(),
            queue_position: live.queue_position,
            estimated_time_remaining: live.estimated_time_remaining,
            result: live.result.clone(),
            error: live.error.clone(),
        };
    }

    let state = match persisted {
        PersistedStatus::Pending => DisplayState::Computing,
        PersistedStatus::Complete => DisplayState::Complete,
        PersistedStatus::Error => DisplayState::Error,
    };
    UnifiedStatus {
        state,
        progress: None,
        message: None,
        queue_position: None,
        estimated_time_remaining: None,
        result: persisted_output.cloned(),
        error: None,
    }
}

/// Unified view for a whole report. Economy-wide reports read the feed under
/// the report id. Household reports aggregate per-simulation: the first
/// actively-pending simulation's status wins; else all-complete collapses to
/// the first simulation's record; else the report's own persisted status is
/// the answer.
pub fn report_status(
    report: &Report,
    simulations: &[Simulation],
    feed: &dyn StatusFeed,
) -> UnifiedStatus {
    if report.is_economy_wide(simulations) {
        let ephemeral = feed.lookup(&StatusKey::Report(report.id.clone()));
        return unified_status(report.status, report.output.as_ref(), ephemeral.as_ref());
    }

    let merged: Vec<(UnifiedStatus, &Simulation)> = simulations
        .iter()
        .filter(|sim| matches!(sim.population, PopulationRef::Household(_)))
        .map(|sim| {
            let ephemeral = feed.lookup(&StatusKey::Simulation(sim.id.clone()));
            (
                unified_status(sim.status, None, ephemeral.as_ref()),
                sim,
            )
        })
        .collect();

    if let Some((pending, _)) = merged
        .iter()
        .find(|(status, _)| status.state == DisplayState::Computing)
    {
        return pending.clone();
    }

    if !merged.is_empty()
        && merged
            .iter()
            .all(|(status, _)| status.state == DisplayState::Complete)
    {
        // Equivalent terminal states: the first record is as good as any.
        return merged[0].0.clone();
    }

    unified_status(report.status, report.output.as_ref(), None)
}
