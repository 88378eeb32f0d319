use std::time::Duration;

use serde::Serialize;

use crate::api::ApiClient;
use crate::assoc::{Association, AssociationStore};
use crate::cache::EntityCache;
use crate::domain::{CountryId, Entity, EntityKind};
use crate::error::PolisError;
use crate::reference::GeographyTable;
use crate::resolver::{DependencyResolver, ResolvedReport};
use crate::share::{SaveOutcome, save_shared_report};
use crate::status::{StatusFeed, UnifiedStatus, report_status};

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    View,
    Save,
    Status,
    List,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub resolved: ResolvedReport,
    pub status: UnifiedStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub reports: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub association_id: String,
    pub report_id: String,
    pub country_id: String,
    pub label: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub report_id: String,
    pub status: UnifiedStatus,
}

/// Session facade wiring one cache instance, one association store and the
/// external collaborators together. Construct one per session; tests build a
/// fresh one per case instead of sharing global state.
pub struct App<A: ApiClient, F: StatusFeed> {
    store: Box<dyn AssociationStore>,
    cache: EntityCache,
    api: A,
    feed: F,
    regions: GeographyTable,
    user_id: String,
}

impl<A: ApiClient, F: StatusFeed> App<A, F> {
    pub fn new(
        store: Box<dyn AssociationStore>,
        cache: EntityCache,
        api: A,
        feed: F,
        regions: GeographyTable,
        user_id: &str,
    ) -> Self {
        Self {
            store,
            cache,
            api,
            feed,
            regions,
            user_id: user_id.to_string(),
        }
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Hydrates a saved report and overlays the live calculation status.
    pub fn view_report(
        &self,
        association_id: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ReportView, PolisError> {
        let resolved = self.resolve(association_id, sink)?;
        let status = report_status(&resolved.report, &resolved.simulations, &self.feed);
        self.cache.sweep();
        Ok(ReportView { resolved, status })
    }

    /// Re-resolves the graph (cache-first, so typically cheap) and persists it
    /// as associations for this session's user.
    pub fn save_report(
        &self,
        association_id: &str,
        share_token: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<SaveOutcome, PolisError> {
        let resolved = self.resolve(association_id, sink)?;
        sink.event(ProgressEvent {
            message: "phase=Store; saving associations".to_string(),
            elapsed: None,
        });
        let outcome = save_shared_report(
            self.store.as_ref(),
            &self.user_id,
            &resolved,
            &self.regions,
            share_token,
        )?;
        self.cache.sweep();
        Ok(outcome)
    }

    pub fn calculation_status(
        &self,
        association_id: &str,
        sink: &dyn ProgressSink,
    ) -> Result<StatusResult, PolisError> {
        let resolved = self.resolve(association_id, sink)?;
        let status = report_status(&resolved.report, &resolved.simulations, &self.feed);
        self.cache.sweep();
        Ok(StatusResult {
            report_id: resolved.report.id,
            status,
        })
    }

    pub fn list_reports(
        &self,
        country: Option<&CountryId>,
        sink: &dyn ProgressSink,
    ) -> Result<ListResult, PolisError> {
        sink.event(ProgressEvent {
            message: "phase=Resolve; listing saved reports".to_string(),
            elapsed: None,
        });
        let associations =
            self.store
                .find_by_user(EntityKind::Report, &self.user_id, country)?;
        Ok(ListResult {
            reports: associations.into_iter().map(list_entry).collect(),
        })
    }

    /// Case-insensitive substring search over entities already in this
    /// session's cache.
    pub fn search_cached(&self, kind: EntityKind, field: &str, term: &str) -> Vec<Entity> {
        self.cache.search(kind, field, term)
    }

    fn resolve(
        &self,
        association_id: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ResolvedReport, PolisError> {
        let association = self
            .store
            .find_by_id(EntityKind::Report, association_id)?
            .ok_or_else(|| PolisError::AssociationNotFound(association_id.to_string()))?;
        let resolver = DependencyResolver::new(&self.api, &self.cache, &self.regions);
        resolver.resolve(&association, sink)
    }
}

fn list_entry(association: Association) -> ListEntry {
    ListEntry {
        association_id: association.id,
        report_id: association.entity_id,
        country_id: association.country_id.to_string(),
        label: association.label,
        created_at: association.created_at.to_rfc3339(),
    }
}
