//! Audit orchestration: guard, submit, correlate callbacks.
//!
//! Every status change is a compare-and-set against the state it was
//! computed from. A callback whose serial no longer matches the catalog, or
//! that arrives after its audit already resolved, is ignored.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::guard::check_allowed;
use super::transition::{resolved, submitted};
use crate::application_id::ApplicationId;
use crate::error::{CatalogError, CatalogResult, StateConflict, ValidationError};
use crate::search::SearchSynchronizer;
use crate::services::{AuditApplication, DisplayData, ProcessBinding, Services};
use crate::store::{AuditTransition, CatalogStore, ExpectedState};
use crate::types::{
    ApplySerial, AuditLogEntry, AuditOutcome, AuditState, AuditType, Catalog, CatalogId, Operator,
};

/// Audit result message delivered by the workflow service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    /// Raw `"<catalog_id>:<apply_serial>"`; decoded on handling so a
    /// malformed id is reported, not dropped by the deserializer.
    pub application_id: String,
    pub result: AuditOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// No process bound: the audit passed synchronously.
    Approved(Catalog),
    /// Application handed to the workflow service.
    Submitted {
        catalog: Catalog,
        application_id: ApplicationId,
    },
}

impl SubmitOutcome {
    pub fn catalog(&self) -> &Catalog {
        match self {
            Self::Approved(catalog) | Self::Submitted { catalog, .. } => catalog,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    CatalogMissing,
    NotAuditing,
    SerialMismatch,
    /// The row changed between read and commit.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Applied(Catalog),
    Ignored(IgnoreReason),
}

pub struct AuditOrchestrator {
    store: Arc<dyn CatalogStore>,
    services: Services,
    search: Arc<SearchSynchronizer>,
}

impl AuditOrchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        services: Services,
        search: Arc<SearchSynchronizer>,
    ) -> Self {
        Self {
            store,
            services,
            search,
        }
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    pub async fn submit(
        &self,
        catalog_id: CatalogId,
        audit_type: AuditType,
        operator: &Operator,
    ) -> CatalogResult<SubmitOutcome> {
        let catalog = self
            .store
            .load_catalog(catalog_id)
            .await?
            .ok_or(StateConflict::NotFound(catalog_id))?;
        if catalog.is_draft_copy() {
            return Err(ValidationError::DraftCopyTarget(catalog_id).into());
        }

        let lifecycle = &catalog.lifecycle;
        check_allowed(audit_type, lifecycle.publish_status, lifecycle.online_status)?;

        let binding = self.services.processes.bound_process(audit_type).await?;
        let outcome = match binding {
            None => self.approve_unbound(&catalog, audit_type, operator).await?,
            Some(binding) => {
                self.submit_bound(&catalog, audit_type, &binding, operator)
                    .await?
            }
        };

        self.search.push(catalog_id).await?;
        Ok(outcome)
    }

    async fn approve_unbound(
        &self,
        catalog: &Catalog,
        audit_type: AuditType,
        operator: &Operator,
    ) -> CatalogResult<SubmitOutcome> {
        let now = Utc::now();
        let pending = submitted(&catalog.lifecycle, audit_type, None);
        let lifecycle = resolved(&pending, audit_type, AuditOutcome::Pass, now);

        let transition = AuditTransition {
            catalog_id: catalog.id,
            expected: ExpectedState::of(&catalog.lifecycle),
            lifecycle,
            merge_draft: audit_type == AuditType::Change,
            reset_open_catalog: audit_type == AuditType::Offline,
            log: log_entry(catalog.id, audit_type, AuditState::Pass, None, Some(operator)),
            updated_by: Some(operator.id.clone()),
            at: now,
        };
        let updated = self.commit(&transition).await?;

        tracing::info!(
            catalog_id = %catalog.id,
            audit_type = %audit_type,
            publish_status = updated.lifecycle.publish_status.as_str(),
            online_status = updated.lifecycle.online_status.as_str(),
            "No audit process bound, approved synchronously"
        );
        Ok(SubmitOutcome::Approved(updated))
    }

    async fn submit_bound(
        &self,
        catalog: &Catalog,
        audit_type: AuditType,
        binding: &ProcessBinding,
        operator: &Operator,
    ) -> CatalogResult<SubmitOutcome> {
        let now = Utc::now();
        let serial = ApplySerial::generate();
        let application_id = ApplicationId::new(catalog.id, serial);

        let transition = AuditTransition {
            catalog_id: catalog.id,
            expected: ExpectedState::of(&catalog.lifecycle),
            lifecycle: submitted(&catalog.lifecycle, audit_type, Some(serial)),
            merge_draft: false,
            reset_open_catalog: false,
            log: log_entry(
                catalog.id,
                audit_type,
                AuditState::Auditing,
                Some(serial),
                Some(operator),
            ),
            updated_by: Some(operator.id.clone()),
            at: now,
        };
        let pending = self.commit(&transition).await?;

        let application = AuditApplication {
            application_id,
            audit_type,
            process_definition_key: binding.process_definition_key.clone(),
            submitter_id: operator.id.clone(),
            submitter_name: operator.name.clone(),
            display_data: DisplayData {
                id: catalog.id,
                code: catalog.code.clone(),
                title: catalog.title.clone(),
                submitter: operator.name.clone(),
                submit_time: now,
            },
            webhook: binding.webhook_for(catalog.id),
        };

        if let Err(e) = self.services.workflow.submit(&application).await {
            tracing::error!(
                catalog_id = %catalog.id,
                application_id = %application_id,
                error = %e,
                "Workflow submission failed, withdrawing audit"
            );
            self.compensate(&pending, audit_type, serial).await;
            return Err(e.into());
        }

        tracing::info!(
            catalog_id = %catalog.id,
            audit_type = %audit_type,
            application_id = %application_id,
            process_definition_key = %binding.process_definition_key,
            "Audit application submitted"
        );
        Ok(SubmitOutcome::Submitted {
            catalog: pending,
            application_id,
        })
    }

    /// Roll a committed submission back to its pre-audit state after the
    /// workflow service refused it. Failures here are logged; the caller
    /// already reports the submission error.
    async fn compensate(&self, pending: &Catalog, audit_type: AuditType, serial: ApplySerial) {
        let now = Utc::now();
        let transition = AuditTransition {
            catalog_id: pending.id,
            expected: ExpectedState::of(&pending.lifecycle),
            lifecycle: resolved(&pending.lifecycle, audit_type, AuditOutcome::Withdrawn, now),
            merge_draft: false,
            reset_open_catalog: false,
            log: log_entry(
                pending.id,
                audit_type,
                AuditState::Withdrawn,
                Some(serial),
                None,
            ),
            updated_by: None,
            at: now,
        };
        match self.store.apply_transition(&transition).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(
                catalog_id = %pending.id,
                "Catalog changed before the failed submission could be withdrawn"
            ),
            Err(e) => tracing::error!(
                catalog_id = %pending.id,
                error = %e,
                "Failed to withdraw audit after submission failure"
            ),
        }
    }

    async fn commit(&self, transition: &AuditTransition) -> CatalogResult<Catalog> {
        self.store.apply_transition(transition).await?.ok_or_else(|| {
            CatalogError::from(StateConflict::AuditNotAllowed {
                audit_type: transition.log.audit_type,
                publish_status: transition.expected.publish_status,
                online_status: transition.expected.online_status,
            })
        })
    }

    // ------------------------------------------------------------------
    // Callbacks
    // ------------------------------------------------------------------

    pub async fn handle_result(&self, message: &AuditResult) -> CatalogResult<CallbackOutcome> {
        let application_id = ApplicationId::decode(&message.application_id)?;
        let catalog_id = application_id.catalog_id;
        let serial = application_id.apply_serial;

        let Some(catalog) = self.store.load_catalog(catalog_id).await? else {
            tracing::warn!(catalog_id = %catalog_id, "Audit result for unknown catalog ignored");
            return Ok(CallbackOutcome::Ignored(IgnoreReason::CatalogMissing));
        };

        let lifecycle = &catalog.lifecycle;
        if lifecycle.audit_apply_serial != Some(serial) {
            tracing::warn!(
                catalog_id = %catalog_id,
                apply_serial = %serial,
                current_serial = ?lifecycle.audit_apply_serial.map(|s| s.to_string()),
                "Stale audit result ignored"
            );
            return Ok(CallbackOutcome::Ignored(IgnoreReason::SerialMismatch));
        }
        let audit_type = match lifecycle.audit_type {
            Some(t) if lifecycle.is_auditing() => t,
            _ => {
                tracing::warn!(
                    catalog_id = %catalog_id,
                    apply_serial = %serial,
                    audit_state = lifecycle.audit_state.as_str(),
                    "Audit result for an already resolved audit ignored"
                );
                return Ok(CallbackOutcome::Ignored(IgnoreReason::NotAuditing));
            }
        };

        let now = Utc::now();
        let pass = message.result == AuditOutcome::Pass;
        let transition = AuditTransition {
            catalog_id,
            expected: ExpectedState::of(lifecycle),
            lifecycle: resolved(lifecycle, audit_type, message.result, now),
            merge_draft: pass && audit_type == AuditType::Change,
            reset_open_catalog: pass && audit_type == AuditType::Offline,
            log: log_entry(
                catalog_id,
                audit_type,
                message.result.audit_state(),
                Some(serial),
                None,
            ),
            updated_by: None,
            at: now,
        };

        let Some(updated) = self.store.apply_transition(&transition).await? else {
            tracing::warn!(
                catalog_id = %catalog_id,
                apply_serial = %serial,
                "Catalog changed while applying audit result, ignored"
            );
            return Ok(CallbackOutcome::Ignored(IgnoreReason::Superseded));
        };

        tracing::info!(
            catalog_id = %catalog_id,
            audit_type = %audit_type,
            result = updated.lifecycle.audit_state.as_str(),
            publish_status = updated.lifecycle.publish_status.as_str(),
            online_status = updated.lifecycle.online_status.as_str(),
            "Audit result applied"
        );

        self.search.repair(catalog_id).await;
        Ok(CallbackOutcome::Applied(updated))
    }
}

fn log_entry(
    catalog_id: CatalogId,
    audit_type: AuditType,
    audit_state: AuditState,
    apply_serial: Option<ApplySerial>,
    operator: Option<&Operator>,
) -> AuditLogEntry {
    AuditLogEntry {
        catalog_id,
        audit_type,
        audit_state,
        apply_serial,
        operator_id: operator.map(|o| o.id.clone()),
        created_at: Utc::now(),
    }
}
