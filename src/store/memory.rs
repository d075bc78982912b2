//! In-memory `CatalogStore`.
//!
//! One mutex guards all tables, so each trait method is atomic the same way
//! a Postgres transaction is.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use super::{copy_content, AuditTransition, CatalogStore};
use crate::error::StoreError;
use crate::types::{
    AuditLogEntry, Catalog, CatalogBundle, CatalogCategory, CatalogColumn, CatalogId,
    MountedResource, OnlineStatus, OpenAuditState, OpenCatalog, OpenStatus,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    catalogs: BTreeMap<CatalogId, Catalog>,
    categories: HashMap<CatalogId, Vec<CatalogCategory>>,
    resources: HashMap<CatalogId, Vec<MountedResource>>,
    columns: HashMap<CatalogId, Vec<CatalogColumn>>,
    audit_log: Vec<AuditLogEntry>,
    open_catalogs: HashMap<CatalogId, OpenCatalog>,
}

impl Tables {
    fn allocate_id(&mut self) -> CatalogId {
        self.next_id += 1;
        CatalogId(self.next_id)
    }

    fn write_associations(&mut self, id: CatalogId, bundle: &CatalogBundle) {
        let mut categories = bundle.categories.clone();
        let mut resources = bundle.resources.clone();
        let mut columns = bundle.columns.clone();
        categories.iter_mut().for_each(|c| c.catalog_id = id);
        resources.iter_mut().for_each(|r| r.catalog_id = id);
        columns.iter_mut().for_each(|c| c.catalog_id = id);
        self.categories.insert(id, categories);
        self.resources.insert(id, resources);
        self.columns.insert(id, columns);
    }

    fn remove_rows(&mut self, id: CatalogId) -> Option<Catalog> {
        self.categories.remove(&id);
        self.resources.remove(&id);
        self.columns.remove(&id);
        self.open_catalogs.remove(&id);
        self.catalogs.remove(&id)
    }

    fn bundle(&self, id: CatalogId) -> Option<CatalogBundle> {
        let catalog = self.catalogs.get(&id)?.clone();
        Some(CatalogBundle {
            catalog,
            categories: self.categories.get(&id).cloned().unwrap_or_default(),
            resources: self.resources.get(&id).cloned().unwrap_or_default(),
            columns: self.columns.get(&id).cloned().unwrap_or_default(),
        })
    }

    /// Fold the draft copy of `parent_id` into it and drop the draft row.
    fn merge_draft(&mut self, parent_id: CatalogId) -> Result<(), StoreError> {
        let Some(draft_id) = self.catalogs.get(&parent_id).and_then(|c| c.draft_id) else {
            return Ok(());
        };
        let draft = self
            .bundle(draft_id)
            .ok_or(StoreError::NotFound(draft_id))?;

        let parent = self
            .catalogs
            .get_mut(&parent_id)
            .ok_or(StoreError::NotFound(parent_id))?;
        copy_content(parent, &draft.catalog);
        parent.draft_id = None;

        self.write_associations(parent_id, &draft);
        self.remove_rows(draft_id);
        Ok(())
    }
}

/// `CatalogStore` backed by process memory.
#[derive(Default)]
pub struct MemoryCatalogStore {
    tables: Mutex<Tables>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of catalog rows, draft copies included.
    pub async fn row_count(&self) -> usize {
        self.tables.lock().await.catalogs.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn load_catalog(&self, id: CatalogId) -> Result<Option<Catalog>, StoreError> {
        Ok(self.tables.lock().await.catalogs.get(&id).cloned())
    }

    async fn load_bundle(&self, id: CatalogId) -> Result<Option<CatalogBundle>, StoreError> {
        Ok(self.tables.lock().await.bundle(id))
    }

    async fn title_in_use(&self, title: &str, exclude: &[CatalogId]) -> Result<bool, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .catalogs
            .values()
            .any(|c| c.title == title && !exclude.contains(&c.id)))
    }

    async fn insert_catalog(&self, bundle: &CatalogBundle) -> Result<CatalogId, StoreError> {
        let mut tables = self.tables.lock().await;
        let id = tables.allocate_id();
        let mut catalog = bundle.catalog.clone();
        catalog.id = id;
        tables
            .open_catalogs
            .insert(id, OpenCatalog::not_open(id, catalog.created_at));
        tables.catalogs.insert(id, catalog);
        tables.write_associations(id, bundle);
        Ok(id)
    }

    async fn replace_content(&self, bundle: &CatalogBundle) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let id = bundle.catalog.id;
        let existing = tables
            .catalogs
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        copy_content(existing, &bundle.catalog);
        tables.write_associations(id, bundle);
        Ok(())
    }

    async fn insert_draft_copy(
        &self,
        parent_id: CatalogId,
        bundle: &CatalogBundle,
    ) -> Result<CatalogId, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.catalogs.contains_key(&parent_id) {
            return Err(StoreError::NotFound(parent_id));
        }

        let id = tables.allocate_id();
        let mut draft = bundle.catalog.clone();
        draft.id = id;
        draft.draft_of = Some(parent_id);
        draft.draft_id = None;
        tables.catalogs.insert(id, draft);
        tables.write_associations(id, bundle);

        if let Some(parent) = tables.catalogs.get_mut(&parent_id) {
            parent.draft_id = Some(id);
        }
        Ok(id)
    }

    async fn apply_transition(
        &self,
        transition: &AuditTransition,
    ) -> Result<Option<Catalog>, StoreError> {
        let mut tables = self.tables.lock().await;
        let id = transition.catalog_id;

        match tables.catalogs.get(&id) {
            Some(current) if transition.expected.matches(&current.lifecycle) => {}
            _ => return Ok(None),
        }

        if transition.merge_draft {
            tables.merge_draft(id)?;
        }

        if transition.reset_open_catalog {
            if let Some(open) = tables.open_catalogs.get_mut(&id) {
                open.open_status = OpenStatus::NotOpen;
                open.open_audit_state = OpenAuditState::Unaudited;
                open.updated_at = transition.at;
            }
        }

        let catalog = tables
            .catalogs
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        catalog.lifecycle = transition.lifecycle.clone();
        catalog.updated_at = transition.at;
        if transition.updated_by.is_some() {
            catalog.updated_by = transition.updated_by.clone();
        }
        let updated = catalog.clone();

        tables.audit_log.push(transition.log.clone());
        Ok(Some(updated))
    }

    async fn delete_catalog(&self, id: CatalogId) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(catalog) = tables.remove_rows(id) else {
            return Ok(false);
        };
        if let Some(draft_id) = catalog.draft_id {
            tables.remove_rows(draft_id);
        }
        Ok(true)
    }

    async fn detach_resource(
        &self,
        catalog_id: CatalogId,
        resource_id: &str,
        auto_offline: bool,
    ) -> Result<Option<Catalog>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(mut bundle) = tables.bundle(catalog_id) else {
            return Ok(None);
        };

        bundle.resources.retain(|r| {
            r.resource_id != resource_id && r.derived_from.as_deref() != Some(resource_id)
        });
        bundle.refresh_derived();
        if auto_offline && bundle.catalog.lifecycle.online_status == OnlineStatus::Online {
            bundle.catalog.lifecycle.online_status = OnlineStatus::OfflineAuto;
        }
        bundle.catalog.updated_at = chrono::Utc::now();

        tables.write_associations(catalog_id, &bundle);
        tables.catalogs.insert(catalog_id, bundle.catalog.clone());
        Ok(Some(bundle.catalog))
    }

    async fn list_catalog_ids(&self) -> Result<Vec<CatalogId>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .catalogs
            .values()
            .filter(|c| !c.is_draft_copy())
            .map(|c| c.id)
            .collect())
    }

    async fn catalogs_mounting(&self, resource_id: &str) -> Result<Vec<CatalogId>, StoreError> {
        let tables = self.tables.lock().await;
        let mut ids: Vec<CatalogId> = tables
            .resources
            .iter()
            .filter(|(_, rows)| rows.iter().any(|r| r.resource_id == resource_id))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn audit_log(&self, id: CatalogId) -> Result<Vec<AuditLogEntry>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .audit_log
            .iter()
            .filter(|e| e.catalog_id == id)
            .cloned()
            .collect())
    }

    async fn load_open_catalog(&self, id: CatalogId) -> Result<Option<OpenCatalog>, StoreError> {
        Ok(self.tables.lock().await.open_catalogs.get(&id).cloned())
    }

    async fn save_open_catalog(&self, open: &OpenCatalog) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .open_catalogs
            .insert(open.catalog_id, open.clone());
        Ok(())
    }
}
