//! Collaborator contracts.
//!
//! Every external system the engine talks to sits behind one of these
//! traits. Lookups take id lists; returning fewer results than ids requested
//! means the missing ids do not exist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application_id::ApplicationId;
use crate::error::ServiceError;
use crate::search::CatalogDocument;
use crate::types::{AuditType, CatalogId, ResourceType};

// ─── Reference lookups ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoSystem {
    pub id: String,
    pub name: String,
}

/// A node of the subject domain (business object) hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectNode {
    pub id: String,
    pub name: String,
    /// Display path, e.g. `"Finance/Tax/Invoice"`.
    #[serde(default)]
    pub path: String,
    /// Ids along `path`, root first.
    #[serde(default)]
    pub path_ids: Vec<String>,
}

/// A node of a custom category tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    /// The tree (category) this node belongs to.
    pub tree_id: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStandard {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTable {
    pub id: String,
    pub name: String,
}

/// A mountable resource as known to its owning system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResource {
    pub id: String,
    pub resource_type: ResourceType,
    pub name: String,
    pub department_id: Option<String>,
    pub source_department_id: Option<String>,
    pub subject_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait DepartmentDirectory: Send + Sync {
    async fn departments(&self, ids: &[String]) -> Result<Vec<Department>, ServiceError>;
}

#[async_trait]
pub trait InfoSystemDirectory: Send + Sync {
    async fn info_systems(&self, ids: &[String]) -> Result<Vec<InfoSystem>, ServiceError>;
}

#[async_trait]
pub trait SubjectDomainService: Send + Sync {
    async fn subjects(&self, ids: &[String]) -> Result<Vec<SubjectNode>, ServiceError>;
}

#[async_trait]
pub trait CategoryTree: Send + Sync {
    async fn nodes(&self, ids: &[String]) -> Result<Vec<CategoryNode>, ServiceError>;
}

#[async_trait]
pub trait StandardsService: Send + Sync {
    async fn standards(&self, codes: &[String]) -> Result<Vec<DataStandard>, ServiceError>;
    async fn code_tables(&self, ids: &[String]) -> Result<Vec<CodeTable>, ServiceError>;
}

#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    async fn resources(
        &self,
        resource_type: ResourceType,
        ids: &[String],
    ) -> Result<Vec<SourceResource>, ServiceError>;

    /// APIs published on top of a logical view.
    async fn bound_apis(&self, view_id: &str) -> Result<Vec<SourceResource>, ServiceError>;
}

/// Issues catalog codes.
#[async_trait]
pub trait CodeSequence: Send + Sync {
    async fn next_code(&self) -> Result<String, ServiceError>;
}

// ─── Workflow ────────────────────────────────────────────────────────────────

/// An approval process bound to an audit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessBinding {
    pub audit_type: AuditType,
    pub process_definition_key: String,
    pub webhook_template: String,
}

impl ProcessBinding {
    pub fn webhook_for(&self, catalog_id: CatalogId) -> String {
        self.webhook_template
            .replace("{catalog_id}", &catalog_id.to_string())
    }
}

#[async_trait]
pub trait ProcessBindings: Send + Sync {
    /// `None` when no approval process is bound to `audit_type`.
    async fn bound_process(
        &self,
        audit_type: AuditType,
    ) -> Result<Option<ProcessBinding>, ServiceError>;
}

/// Summary shown to reviewers in the workflow inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayData {
    pub id: CatalogId,
    pub code: String,
    pub title: String,
    pub submitter: String,
    pub submit_time: DateTime<Utc>,
}

/// Apply message submitted to the workflow service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditApplication {
    pub application_id: ApplicationId,
    pub audit_type: AuditType,
    pub process_definition_key: String,
    pub submitter_id: String,
    pub submitter_name: String,
    pub display_data: DisplayData,
    pub webhook: String,
}

#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn submit(&self, application: &AuditApplication) -> Result<(), ServiceError>;
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[async_trait]
pub trait SearchRepository: Send + Sync {
    async fn upsert(&self, document: &CatalogDocument) -> Result<(), ServiceError>;
    async fn delete(&self, catalog_id: CatalogId) -> Result<(), ServiceError>;
    async fn upsert_apply_count(&self, catalog_id: CatalogId, count: u64)
        -> Result<(), ServiceError>;
}

// ─── Bundle ──────────────────────────────────────────────────────────────────

/// All collaborators, shared by the engine components.
#[derive(Clone)]
pub struct Services {
    pub departments: Arc<dyn DepartmentDirectory>,
    pub info_systems: Arc<dyn InfoSystemDirectory>,
    pub subjects: Arc<dyn SubjectDomainService>,
    pub categories: Arc<dyn CategoryTree>,
    pub standards: Arc<dyn StandardsService>,
    pub resources: Arc<dyn ResourceDirectory>,
    pub sequence: Arc<dyn CodeSequence>,
    pub processes: Arc<dyn ProcessBindings>,
    pub workflow: Arc<dyn WorkflowService>,
    pub search: Arc<dyn SearchRepository>,
}

/// Ids in `requested` that `found` does not cover, in request order.
pub(crate) fn missing_ids<'a>(
    requested: &'a [String],
    found: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let found: std::collections::HashSet<&str> = found.into_iter().collect();
    requested
        .iter()
        .filter(|id| !found.contains(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ids_keeps_request_order() {
        let requested = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = ["c", "a"];
        assert_eq!(missing_ids(&requested, found), vec!["b".to_string()]);
    }
}
