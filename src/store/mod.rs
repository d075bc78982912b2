//! Catalog persistence.
//!
//! Every method is one atomic unit: implementations run multi-table writes
//! (catalog row, category rows, resource rows, column rows, audit-log row)
//! inside a single transaction, so partial writes are never observable.
//! `MemoryCatalogStore` serves tests; `PgCatalogStore` (feature `database`)
//! is the production backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{
    ApplySerial, AuditLogEntry, Catalog, CatalogBundle, CatalogId, Lifecycle, OnlineStatus,
    OpenCatalog, PublishStatus,
};

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::MemoryCatalogStore;
#[cfg(feature = "database")]
pub use postgres::PgCatalogStore;

/// State a transition was computed from. The store applies the transition
/// only if the row still matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedState {
    pub publish_status: PublishStatus,
    pub online_status: OnlineStatus,
    pub audit_apply_serial: Option<ApplySerial>,
}

impl ExpectedState {
    pub fn of(lifecycle: &Lifecycle) -> Self {
        Self {
            publish_status: lifecycle.publish_status,
            online_status: lifecycle.online_status,
            audit_apply_serial: lifecycle.audit_apply_serial,
        }
    }

    pub fn matches(&self, lifecycle: &Lifecycle) -> bool {
        *self == Self::of(lifecycle)
    }
}

/// A status change produced by the audit orchestrator.
#[derive(Debug, Clone)]
pub struct AuditTransition {
    pub catalog_id: CatalogId,
    pub expected: ExpectedState,
    pub lifecycle: Lifecycle,
    /// Fold the draft copy into the catalog and delete the draft row.
    pub merge_draft: bool,
    /// Force the open-catalog projection back to not-open / unaudited.
    pub reset_open_catalog: bool,
    pub log: AuditLogEntry,
    pub updated_by: Option<String>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load_catalog(&self, id: CatalogId) -> Result<Option<Catalog>, StoreError>;

    /// Catalog row plus all association rows.
    async fn load_bundle(&self, id: CatalogId) -> Result<Option<CatalogBundle>, StoreError>;

    /// Whether a catalog other than `exclude` already uses `title`.
    async fn title_in_use(&self, title: &str, exclude: &[CatalogId]) -> Result<bool, StoreError>;

    /// Insert a new catalog with its associations and a not-open
    /// `open_catalog` row. Allocates and returns the id.
    async fn insert_catalog(&self, bundle: &CatalogBundle) -> Result<CatalogId, StoreError>;

    /// Overwrite content fields and association rows of an existing catalog.
    /// Lifecycle fields, code and draft links are left untouched.
    async fn replace_content(&self, bundle: &CatalogBundle) -> Result<(), StoreError>;

    /// Insert a draft copy of `parent_id` and link it via the parent's
    /// `draft_id`. Allocates and returns the draft copy's id.
    async fn insert_draft_copy(
        &self,
        parent_id: CatalogId,
        bundle: &CatalogBundle,
    ) -> Result<CatalogId, StoreError>;

    /// Apply an audit transition and append its log row.
    /// Returns `None` without writing when the row no longer matches
    /// `transition.expected` (or is gone).
    async fn apply_transition(
        &self,
        transition: &AuditTransition,
    ) -> Result<Option<Catalog>, StoreError>;

    /// Delete a catalog, its draft copy and all association rows.
    /// Returns `false` if the catalog did not exist.
    async fn delete_catalog(&self, id: CatalogId) -> Result<bool, StoreError>;

    /// Remove a resource (and APIs derived from it) from a catalog's mounts.
    /// With `auto_offline`, an online catalog moves to `offline-auto`.
    async fn detach_resource(
        &self,
        catalog_id: CatalogId,
        resource_id: &str,
        auto_offline: bool,
    ) -> Result<Option<Catalog>, StoreError>;

    /// Ids of every catalog that is not a draft copy, ascending.
    async fn list_catalog_ids(&self) -> Result<Vec<CatalogId>, StoreError>;

    /// Catalogs (draft copies included) that mount `resource_id`.
    async fn catalogs_mounting(&self, resource_id: &str) -> Result<Vec<CatalogId>, StoreError>;

    /// Audit log of a catalog, oldest first.
    async fn audit_log(&self, id: CatalogId) -> Result<Vec<AuditLogEntry>, StoreError>;

    async fn load_open_catalog(&self, id: CatalogId) -> Result<Option<OpenCatalog>, StoreError>;

    async fn save_open_catalog(&self, open: &OpenCatalog) -> Result<(), StoreError>;
}

/// Copy the editable content of `source` onto `target`, leaving identity,
/// code, lifecycle and draft links alone.
pub(crate) fn copy_content(target: &mut Catalog, source: &Catalog) {
    target.title = source.title.clone();
    target.description = source.description.clone();
    target.department_id = source.department_id.clone();
    target.source_department_id = source.source_department_id.clone();
    target.info_system_id = source.info_system_id.clone();
    target.view_count = source.view_count;
    target.api_count = source.api_count;
    target.file_count = source.file_count;
    target.column_unshared = source.column_unshared;
    target.updated_by = source.updated_by.clone();
    target.updated_at = source.updated_at;
}
