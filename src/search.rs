//! Search projection: the denormalized document pushed to the search index.
//!
//! Pushes run after the store commit and outside its transaction. Primary
//! operations surface push failures through [`SearchSynchronizer::push`];
//! consistency repairs use [`SearchSynchronizer::repair`], which logs and
//! swallows them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::CatalogResult;
use crate::lookup::LookupTables;
use crate::services::Services;
use crate::store::CatalogStore;
use crate::types::{
    AuditState, AuditType, CatalogBundle, CatalogColumn, CatalogId, CategoryType, OnlineStatus,
    PublishStatus, ResourceType, OTHER_SUBJECT,
};

// ─── Document ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountGroup {
    pub resource_type: ResourceType,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessObjectEntry {
    pub id: String,
    pub name: String,
    pub path: String,
    pub path_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: String,
    pub name: String,
    pub tree_id: String,
    pub path: String,
}

/// What the search index holds for one catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub id: CatalogId,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub department_id: Option<String>,
    pub source_department_id: Option<String>,
    pub info_system_id: Option<String>,
    pub publish_status: PublishStatus,
    pub publish_status_label: String,
    pub online_status: OnlineStatus,
    pub online_status_label: String,
    pub audit_state: AuditState,
    pub audit_state_label: String,
    pub audit_type: Option<AuditType>,
    pub audit_type_label: Option<String>,
    pub is_publish_auditing: bool,
    pub is_online_auditing: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub online_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub column_unshared: bool,
    pub mounted_resources: Vec<MountGroup>,
    pub business_objects: Vec<BusinessObjectEntry>,
    pub categories: Vec<CategoryEntry>,
    pub columns: Vec<CatalogColumn>,
}

/// Result of a full re-projection sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub pushed: usize,
    pub failed: usize,
}

// ─── Synchronizer ────────────────────────────────────────────────────────────

pub struct SearchSynchronizer {
    store: Arc<dyn CatalogStore>,
    services: Services,
    lookups: Arc<LookupTables>,
}

impl SearchSynchronizer {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        services: Services,
        lookups: Arc<LookupTables>,
    ) -> Self {
        Self {
            store,
            services,
            lookups,
        }
    }

    /// Recompute the document for `catalog_id`. `None` if the catalog is
    /// gone or is a draft copy, which never has a document of its own.
    pub async fn build_document(
        &self,
        catalog_id: CatalogId,
    ) -> CatalogResult<Option<CatalogDocument>> {
        let Some(bundle) = self.store.load_bundle(catalog_id).await? else {
            return Ok(None);
        };
        if bundle.catalog.is_draft_copy() {
            return Ok(None);
        }

        let business_objects = self.business_objects(&bundle).await?;
        let categories = self.category_entries(&bundle).await?;
        Ok(Some(self.assemble(bundle, business_objects, categories)))
    }

    /// Project and upsert. Errors are the caller's to surface.
    pub async fn push(&self, catalog_id: CatalogId) -> CatalogResult<()> {
        let Some(document) = self.build_document(catalog_id).await? else {
            tracing::debug!(catalog_id = %catalog_id, "Nothing to project");
            return Ok(());
        };
        self.services.search.upsert(&document).await?;
        tracing::debug!(catalog_id = %catalog_id, "Search document pushed");
        Ok(())
    }

    /// Best-effort re-projection. Failures are logged and dropped.
    pub async fn repair(&self, catalog_id: CatalogId) {
        if let Err(e) = self.push(catalog_id).await {
            tracing::warn!(
                catalog_id = %catalog_id,
                error = %e,
                "Search projection repair failed"
            );
        }
    }

    /// Re-project every catalog, continuing past failures.
    pub async fn push_all(&self) -> CatalogResult<SweepReport> {
        let ids = self.store.list_catalog_ids().await?;
        let mut report = SweepReport::default();

        for id in ids {
            match self.push(id).await {
                Ok(()) => report.pushed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(catalog_id = %id, error = %e, "Push-all: catalog failed");
                }
            }
        }

        tracing::info!(
            pushed = report.pushed,
            failed = report.failed,
            "Push-all sweep finished"
        );
        Ok(report)
    }

    pub async fn delete(&self, catalog_id: CatalogId) -> CatalogResult<()> {
        self.services.search.delete(catalog_id).await?;
        Ok(())
    }

    pub async fn push_apply_count(&self, catalog_id: CatalogId, count: u64) -> CatalogResult<()> {
        self.services
            .search
            .upsert_apply_count(catalog_id, count)
            .await?;
        Ok(())
    }

    async fn business_objects(
        &self,
        bundle: &CatalogBundle,
    ) -> CatalogResult<Vec<BusinessObjectEntry>> {
        let mut other = false;
        let ids: Vec<String> = bundle
            .categories
            .iter()
            .filter(|c| c.category_type == CategoryType::Subject)
            .filter_map(|c| {
                if c.category_id == OTHER_SUBJECT {
                    other = true;
                    None
                } else {
                    Some(c.category_id.clone())
                }
            })
            .collect();

        let mut entries: Vec<BusinessObjectEntry> = if ids.is_empty() {
            Vec::new()
        } else {
            self.services
                .subjects
                .subjects(&ids)
                .await?
                .into_iter()
                .map(|s| BusinessObjectEntry {
                    id: s.id,
                    name: s.name,
                    path: s.path,
                    path_ids: s.path_ids,
                })
                .collect()
        };

        if other {
            entries.push(BusinessObjectEntry {
                id: OTHER_SUBJECT.to_string(),
                name: OTHER_SUBJECT.to_string(),
                path: String::new(),
                path_ids: Vec::new(),
            });
        }
        Ok(entries)
    }

    async fn category_entries(&self, bundle: &CatalogBundle) -> CatalogResult<Vec<CategoryEntry>> {
        let ids: Vec<String> = bundle
            .categories
            .iter()
            .filter(|c| c.category_type == CategoryType::Custom)
            .map(|c| c.category_id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .services
            .categories
            .nodes(&ids)
            .await?
            .into_iter()
            .map(|n| CategoryEntry {
                id: n.id,
                name: n.name,
                tree_id: n.tree_id,
                path: n.path,
            })
            .collect())
    }

    fn assemble(
        &self,
        bundle: CatalogBundle,
        business_objects: Vec<BusinessObjectEntry>,
        categories: Vec<CategoryEntry>,
    ) -> CatalogDocument {
        let mut groups: BTreeMap<ResourceType, Vec<String>> = BTreeMap::new();
        for r in &bundle.resources {
            groups
                .entry(r.resource_type)
                .or_default()
                .push(r.resource_id.clone());
        }

        let c = bundle.catalog;
        let l = &c.lifecycle;
        CatalogDocument {
            id: c.id,
            code: c.code.clone(),
            title: c.title.clone(),
            description: c.description.clone(),
            department_id: c.department_id.clone(),
            source_department_id: c.source_department_id.clone(),
            info_system_id: c.info_system_id.clone(),
            publish_status: l.publish_status,
            publish_status_label: self.lookups.publish_status.label(l.publish_status).to_string(),
            online_status: l.online_status,
            online_status_label: self.lookups.online_status.label(l.online_status).to_string(),
            audit_state: l.audit_state,
            audit_state_label: self.lookups.audit_state.label(l.audit_state).to_string(),
            audit_type: l.audit_type,
            audit_type_label: l
                .audit_type
                .map(|t| self.lookups.audit_type.label(t).to_string()),
            is_publish_auditing: matches!(
                l.publish_status,
                PublishStatus::PublishAuditing | PublishStatus::ChangeAuditing
            ),
            is_online_auditing: l.online_status.is_auditing(),
            published_at: l.published_at,
            online_at: l.online_at,
            updated_at: c.updated_at,
            column_unshared: c.column_unshared,
            mounted_resources: groups
                .into_iter()
                .map(|(resource_type, ids)| MountGroup { resource_type, ids })
                .collect(),
            business_objects,
            categories,
            columns: bundle.columns,
        }
    }
}
