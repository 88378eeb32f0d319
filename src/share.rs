use serde::Serialize;
use tracing::{info, warn};

use crate::assoc::{Association, AssociationStore};
use crate::domain::EntityKind;
use crate::error::PolisError;
use crate::fetch::gather;
use crate::reference::GeographyTable;
use crate::resolver::ResolvedReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveClassification {
    AlreadySaved,
    Success,
    Partial,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveFailure {
    pub kind: EntityKind,
    pub entity_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub classification: SaveClassification,
    pub report_association: Association,
    pub created: usize,
    pub failed: Vec<SaveFailure>,
}

/// Explicit classification of a gathered ingredient batch. All-fail collapses
/// into `Partial` like any other partial outcome: the report association
/// itself succeeded, so the save is not a hard failure.
pub fn classify(failed: usize) -> SaveClassification {
    if failed > 0 {
        SaveClassification::Partial
    } else {
        SaveClassification::Success
    }
}

/// Persists a resolved report graph as associations for a user.
///
/// Ingredient associations (simulations, non-current-law policies,
/// households, geographies) are created concurrently and best-effort: an
/// individual failure is counted, never thrown. The top-level report
/// association is created unconditionally afterwards and its failure is
/// fatal. A supplied share token makes the whole operation idempotent.
pub fn save_shared_report(
    store: &dyn AssociationStore,
    user_id: &str,
    graph: &ResolvedReport,
    regions: &GeographyTable,
    share_token: Option<&str>,
) -> Result<SaveOutcome, PolisError> {
    let country = &graph.report.country_id;

    if let Some(token) = share_token {
        if let Some(existing) = store.find_by_id(EntityKind::Report, token)? {
            info!(token, "report already saved");
            return Ok(SaveOutcome {
                classification: SaveClassification::AlreadySaved,
                report_association: existing,
                created: 0,
                failed: Vec::new(),
            });
        }
    }

    let mut ingredients: Vec<(EntityKind, Association)> = Vec::new();
    for sim in &graph.simulations {
        ingredients.push((
            EntityKind::Simulation,
            Association::new(user_id, &sim.id, country.clone(), sim.label.clone()),
        ));
    }
    for policy in &graph.policies {
        // Current-law baselines are reference data, not user content.
        if regions.is_current_law(country, &policy.id) {
            continue;
        }
        ingredients.push((
            EntityKind::Policy,
            Association::new(user_id, &policy.id, country.clone(), policy.label.clone()),
        ));
    }
    for household in &graph.households {
        ingredients.push((
            EntityKind::Household,
            Association::new(user_id, &household.id, country.clone(), household.label.clone()),
        ));
    }
    for geography in &graph.geographies {
        ingredients.push((
            EntityKind::Geography,
            Association::new(user_id, &geography.id, country.clone(), geography.label.clone()),
        ));
    }

    let jobs: Vec<Box<dyn FnOnce() -> Result<(), SaveFailure> + Send>> = ingredients
        .into_iter()
        .map(|(kind, assoc)| {
            let job: Box<dyn FnOnce() -> Result<(), SaveFailure> + Send> =
                Box::new(move || match store.create(kind, &assoc) {
                    Ok(_) => Ok(()),
                    // Already owned by this user; re-saving must not degrade
                    // the outcome.
                    Err(PolisError::DuplicateAssociation { .. }) => Ok(()),
                    Err(err) => Err(SaveFailure {
                        kind,
                        entity_id: assoc.entity_id.clone(),
                        error: err.to_string(),
                    }),
                });
            job
        })
        .collect();
    let (succeeded, failed) = gather(jobs);
    for failure in &failed {
        warn!(
            kind = failure.kind.as_str(),
            entity_id = failure.entity_id,
            error = failure.error,
            "ingredient save failed"
        );
    }

    // Not best-effort: without the report association the share link is dead.
    let report_association = match share_token {
        Some(token) => Association::with_id(
            token,
            user_id,
            &graph.report.id,
            country.clone(),
            graph.report.label.clone(),
        ),
        None => Association::new(user_id, &graph.report.id, country.clone(), graph.report.label.clone()),
    };
    let report_association = store.create(EntityKind::Report, &report_association)?;

    let classification = classify(failed.len());
    info!(
        created = succeeded.len(),
        failed = failed.len(),
        classification = ?classification,
        "saved shared report"
    );
    Ok(SaveOutcome {
        classification,
        report_association,
        created: succeeded.len(),
        failed,
    })
}
