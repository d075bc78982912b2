//! `CatalogEngine`: facade wiring the store, collaborators and the
//! lifecycle components together.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::audit::{AuditOrchestrator, AuditResult, CallbackOutcome, SubmitOutcome};
use crate::consumer::MessageHandler;
use crate::draft::{DraftPublishManager, SaveOutcome, SaveRequest};
use crate::error::{CatalogResult, StateConflict, ValidationError};
use crate::lookup::LookupTables;
use crate::search::{SearchSynchronizer, SweepReport};
use crate::services::Services;
use crate::store::CatalogStore;
use crate::types::{
    AuditLogEntry, AuditType, CatalogBundle, CatalogId, OnlineStatus, OpenCatalog, Operator,
    ResourceType,
};

/// Notification that a mountable resource changed in its owning system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceEvent {
    Changed {
        resource_type: ResourceType,
        resource_id: String,
    },
    Deleted {
        resource_type: ResourceType,
        resource_id: String,
    },
}

impl ResourceEvent {
    pub fn resource_id(&self) -> &str {
        match self {
            Self::Changed { resource_id, .. } | Self::Deleted { resource_id, .. } => resource_id,
        }
    }
}

pub struct CatalogEngine {
    store: Arc<dyn CatalogStore>,
    drafts: DraftPublishManager,
    audits: AuditOrchestrator,
    search: Arc<SearchSynchronizer>,
}

impl CatalogEngine {
    pub fn new(store: Arc<dyn CatalogStore>, services: Services, lookups: LookupTables) -> Self {
        let search = Arc::new(SearchSynchronizer::new(
            store.clone(),
            services.clone(),
            Arc::new(lookups),
        ));
        Self {
            drafts: DraftPublishManager::new(store.clone(), services.clone(), search.clone()),
            audits: AuditOrchestrator::new(store.clone(), services, search.clone()),
            store,
            search,
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn search(&self) -> &SearchSynchronizer {
        &self.search
    }

    pub async fn save(&self, request: &SaveRequest) -> CatalogResult<SaveOutcome> {
        self.drafts.save(request).await
    }

    pub async fn submit_audit(
        &self,
        catalog_id: CatalogId,
        audit_type: AuditType,
        operator: &Operator,
    ) -> CatalogResult<SubmitOutcome> {
        self.audits.submit(catalog_id, audit_type, operator).await
    }

    pub async fn handle_audit_result(
        &self,
        message: &AuditResult,
    ) -> CatalogResult<CallbackOutcome> {
        self.audits.handle_result(message).await
    }

    /// The catalog with its associations, as stored. Draft copies are
    /// addressable by their own id.
    pub async fn get(&self, catalog_id: CatalogId) -> CatalogResult<CatalogBundle> {
        Ok(self
            .store
            .load_bundle(catalog_id)
            .await?
            .ok_or(StateConflict::NotFound(catalog_id))?)
    }

    pub async fn audit_log(&self, catalog_id: CatalogId) -> CatalogResult<Vec<AuditLogEntry>> {
        Ok(self.store.audit_log(catalog_id).await?)
    }

    pub async fn open_catalog(
        &self,
        catalog_id: CatalogId,
    ) -> CatalogResult<Option<OpenCatalog>> {
        Ok(self.store.load_open_catalog(catalog_id).await?)
    }

    /// Delete a catalog and its draft copy, then remove its search document.
    pub async fn delete(&self, catalog_id: CatalogId) -> CatalogResult<()> {
        let catalog = self
            .store
            .load_catalog(catalog_id)
            .await?
            .ok_or(StateConflict::NotFound(catalog_id))?;
        if catalog.is_draft_copy() {
            return Err(ValidationError::DraftCopyTarget(catalog_id).into());
        }

        let lifecycle = &catalog.lifecycle;
        if lifecycle.online_status == OnlineStatus::Online || lifecycle.online_status.is_auditing()
        {
            return Err(StateConflict::NotDeletable {
                catalog_id,
                online_status: lifecycle.online_status,
            }
            .into());
        }
        if let (true, Some(audit_type)) = (lifecycle.is_auditing(), lifecycle.audit_type) {
            return Err(StateConflict::UnderAudit {
                catalog_id,
                audit_type,
            }
            .into());
        }

        if !self.store.delete_catalog(catalog_id).await? {
            return Err(StateConflict::NotFound(catalog_id).into());
        }
        tracing::info!(catalog_id = %catalog_id, "Deleted catalog");

        self.search.delete(catalog_id).await
    }

    pub async fn on_resource_event(&self, event: &ResourceEvent) -> CatalogResult<()> {
        let resource_id = event.resource_id();
        let mounting = self.store.catalogs_mounting(resource_id).await?;
        if mounting.is_empty() {
            tracing::debug!(resource_id, "Resource event touches no catalog");
            return Ok(());
        }

        let mut repair = Vec::with_capacity(mounting.len());
        for catalog_id in mounting {
            if let ResourceEvent::Deleted { .. } = event {
                let Some(catalog) = self
                    .store
                    .detach_resource(catalog_id, resource_id, true)
                    .await?
                else {
                    continue;
                };
                tracing::info!(
                    catalog_id = %catalog_id,
                    resource_id,
                    online_status = catalog.lifecycle.online_status.as_str(),
                    "Detached deleted resource"
                );
            }
            // A draft copy has no document; its parent's is the one to refresh.
            if let Some(owner) = self.document_owner(catalog_id).await? {
                if !repair.contains(&owner) {
                    repair.push(owner);
                }
            }
        }

        for catalog_id in repair {
            self.search.repair(catalog_id).await;
        }
        Ok(())
    }

    pub async fn record_apply_count(
        &self,
        catalog_id: CatalogId,
        count: u64,
    ) -> CatalogResult<()> {
        self.search.push_apply_count(catalog_id, count).await
    }

    pub async fn push_all(&self) -> CatalogResult<SweepReport> {
        self.search.push_all().await
    }

    async fn document_owner(&self, catalog_id: CatalogId) -> CatalogResult<Option<CatalogId>> {
        Ok(self
            .store
            .load_catalog(catalog_id)
            .await?
            .map(|c| c.draft_of.unwrap_or(c.id)))
    }
}

// ---------------------------------------------------------------------------
// Message handlers
// ---------------------------------------------------------------------------

/// Consumes workflow audit results.
pub struct AuditResultHandler {
    engine: Arc<CatalogEngine>,
}

impl AuditResultHandler {
    pub fn new(engine: Arc<CatalogEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MessageHandler for AuditResultHandler {
    type Message = AuditResult;

    fn name(&self) -> &'static str {
        "audit-result"
    }

    async fn handle(&self, message: AuditResult) -> CatalogResult<()> {
        match self.engine.handle_audit_result(&message).await? {
            CallbackOutcome::Applied(_) => Ok(()),
            CallbackOutcome::Ignored(reason) => {
                tracing::debug!(
                    application_id = %message.application_id,
                    reason = ?reason,
                    "Audit result ignored"
                );
                Ok(())
            }
        }
    }
}

/// Consumes resource change notifications.
pub struct ResourceEventHandler {
    engine: Arc<CatalogEngine>,
}

impl ResourceEventHandler {
    pub fn new(engine: Arc<CatalogEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MessageHandler for ResourceEventHandler {
    type Message = ResourceEvent;

    fn name(&self) -> &'static str {
        "resource-event"
    }

    async fn handle(&self, message: ResourceEvent) -> CatalogResult<()> {
        self.engine.on_resource_event(&message).await
    }
}
