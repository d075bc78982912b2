//! Shared test doubles for the catalog integration tests.
//!
//! `CatalogRig` wires a `CatalogEngine` over `MemoryCatalogStore` with
//! in-memory collaborators. The search index and workflow service record
//! every call and can be switched into failure mode.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use dr_catalog::config::{AuditProcessConfig, AuditProcessIndex};
use dr_catalog::error::ServiceError;
use dr_catalog::services::{
    AuditApplication, CategoryNode, CategoryTree, CodeSequence, CodeTable, DataStandard,
    Department, DepartmentDirectory, InfoSystem, InfoSystemDirectory, ResourceDirectory,
    SearchRepository, Services, SourceResource, StandardsService, SubjectDomainService,
    SubjectNode, WorkflowService,
};
use dr_catalog::store::{AuditTransition, ExpectedState};
use dr_catalog::types::{
    AuditLogEntry, AuditState, AuditType, CatalogId, Lifecycle, OnlineStatus, Operator,
    PublishStatus, ResourceType,
};
use dr_catalog::{
    CatalogDocument, CatalogEngine, CatalogStore, ColumnInput, LookupTables, MemoryCatalogStore,
    MountRequest, SaveRequest,
};

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

pub const DEPT: &str = "dept-finance";
pub const SOURCE_DEPT: &str = "dept-source";
pub const INFO_SYSTEM: &str = "sys-ledger";
pub const SUBJECT: &str = "subj-invoice";
pub const CATEGORY_NODE: &str = "node-open-data";
pub const STANDARD: &str = "GB-0001";
pub const CODE_TABLE: &str = "ct-currency";

/// Directory of departments, subjects, categories, standards and resources.
pub struct FakeDirectory {
    resources: Mutex<Vec<SourceResource>>,
    bound: Mutex<Vec<(String, SourceResource)>>,
    next_code: AtomicU64,
}

impl Default for FakeDirectory {
    fn default() -> Self {
        let dir = Self {
            resources: Mutex::new(Vec::new()),
            bound: Mutex::new(Vec::new()),
            next_code: AtomicU64::new(1),
        };
        for id in ["view-1", "view-2", "view-3"] {
            dir.add_resource(ResourceType::View, id, SOURCE_DEPT);
        }
        dir.add_resource(ResourceType::File, "file-1", SOURCE_DEPT);
        dir.add_resource(ResourceType::File, "file-foreign", "dept-elsewhere");
        dir.add_resource(ResourceType::Api, "api-standalone", SOURCE_DEPT);
        dir.bind_api("view-1", "api-1");
        dir
    }
}

impl FakeDirectory {
    pub fn add_resource(&self, resource_type: ResourceType, id: &str, source_dept: &str) {
        self.resources.lock().unwrap().push(source(resource_type, id, source_dept));
    }

    pub fn bind_api(&self, view_id: &str, api_id: &str) {
        self.bound.lock().unwrap().push((
            view_id.to_string(),
            source(ResourceType::Api, api_id, SOURCE_DEPT),
        ));
    }
}

fn source(resource_type: ResourceType, id: &str, source_dept: &str) -> SourceResource {
    SourceResource {
        id: id.to_string(),
        resource_type,
        name: format!("resource {id}"),
        department_id: Some(DEPT.to_string()),
        source_department_id: Some(source_dept.to_string()),
        subject_id: Some(SUBJECT.to_string()),
        published_at: None,
    }
}

fn known<'a>(ids: &'a [String], known: &[&str]) -> impl Iterator<Item = &'a String> {
    let known: HashSet<String> = known.iter().map(|s| s.to_string()).collect();
    ids.iter().filter(move |id| known.contains(*id))
}

#[async_trait]
impl DepartmentDirectory for FakeDirectory {
    async fn departments(&self, ids: &[String]) -> Result<Vec<Department>, ServiceError> {
        Ok(known(ids, &[DEPT, SOURCE_DEPT])
            .map(|id| Department {
                id: id.clone(),
                name: format!("Department {id}"),
                path: String::new(),
            })
            .collect())
    }
}

#[async_trait]
impl InfoSystemDirectory for FakeDirectory {
    async fn info_systems(&self, ids: &[String]) -> Result<Vec<InfoSystem>, ServiceError> {
        Ok(known(ids, &[INFO_SYSTEM])
            .map(|id| InfoSystem {
                id: id.clone(),
                name: "Ledger".to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl SubjectDomainService for FakeDirectory {
    async fn subjects(&self, ids: &[String]) -> Result<Vec<SubjectNode>, ServiceError> {
        Ok(known(ids, &[SUBJECT])
            .map(|id| SubjectNode {
                id: id.clone(),
                name: "Invoice".to_string(),
                path: "Finance/Invoice".to_string(),
                path_ids: vec!["subj-finance".to_string(), id.clone()],
            })
            .collect())
    }
}

#[async_trait]
impl CategoryTree for FakeDirectory {
    async fn nodes(&self, ids: &[String]) -> Result<Vec<CategoryNode>, ServiceError> {
        Ok(known(ids, &[CATEGORY_NODE])
            .map(|id| CategoryNode {
                id: id.clone(),
                name: "Open data".to_string(),
                tree_id: "tree-usage".to_string(),
                path: "Usage/Open data".to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl StandardsService for FakeDirectory {
    async fn standards(&self, codes: &[String]) -> Result<Vec<DataStandard>, ServiceError> {
        Ok(known(codes, &[STANDARD])
            .map(|code| DataStandard {
                code: code.clone(),
                name: "Amount".to_string(),
            })
            .collect())
    }

    async fn code_tables(&self, ids: &[String]) -> Result<Vec<CodeTable>, ServiceError> {
        Ok(known(ids, &[CODE_TABLE])
            .map(|id| CodeTable {
                id: id.clone(),
                name: "Currency".to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl ResourceDirectory for FakeDirectory {
    async fn resources(
        &self,
        resource_type: ResourceType,
        ids: &[String],
    ) -> Result<Vec<SourceResource>, ServiceError> {
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.resource_type == resource_type && ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn bound_apis(&self, view_id: &str) -> Result<Vec<SourceResource>, ServiceError> {
        Ok(self
            .bound
            .lock()
            .unwrap()
            .iter()
            .filter(|(v, _)| v == view_id)
            .map(|(_, api)| api.clone())
            .collect())
    }
}

#[async_trait]
impl CodeSequence for FakeDirectory {
    async fn next_code(&self) -> Result<String, ServiceError> {
        let n = self.next_code.fetch_add(1, Ordering::SeqCst);
        Ok(format!("X{n:03}"))
    }
}

// ---------------------------------------------------------------------------
// Recording collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSearch {
    pub upserts: Mutex<Vec<CatalogDocument>>,
    pub deletes: Mutex<Vec<CatalogId>>,
    pub apply_counts: Mutex<Vec<(CatalogId, u64)>>,
    pub failing: AtomicBool,
}

impl RecordingSearch {
    pub fn upserted_ids(&self) -> Vec<CatalogId> {
        self.upserts.lock().unwrap().iter().map(|d| d.id).collect()
    }

    pub fn last_document(&self, id: CatalogId) -> Option<CatalogDocument> {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|d| d.id == id)
            .cloned()
    }

    pub fn clear(&self) {
        self.upserts.lock().unwrap().clear();
        self.deletes.lock().unwrap().clear();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ServiceError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ServiceError::unavailable("search", "index offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SearchRepository for RecordingSearch {
    async fn upsert(&self, document: &CatalogDocument) -> Result<(), ServiceError> {
        self.check()?;
        self.upserts.lock().unwrap().push(document.clone());
        Ok(())
    }

    async fn delete(&self, catalog_id: CatalogId) -> Result<(), ServiceError> {
        self.check()?;
        self.deletes.lock().unwrap().push(catalog_id);
        Ok(())
    }

    async fn upsert_apply_count(
        &self,
        catalog_id: CatalogId,
        count: u64,
    ) -> Result<(), ServiceError> {
        self.check()?;
        self.apply_counts.lock().unwrap().push((catalog_id, count));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingWorkflow {
    pub applications: Mutex<Vec<AuditApplication>>,
    pub failing: AtomicBool,
}

impl RecordingWorkflow {
    pub fn last(&self) -> Option<AuditApplication> {
        self.applications.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.applications.lock().unwrap().len()
    }
}

#[async_trait]
impl WorkflowService for RecordingWorkflow {
    async fn submit(&self, application: &AuditApplication) -> Result<(), ServiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::rejected("workflow", "process not deployed"));
        }
        self.applications.lock().unwrap().push(application.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

pub struct CatalogRig {
    pub engine: Arc<CatalogEngine>,
    pub store: Arc<MemoryCatalogStore>,
    pub directory: Arc<FakeDirectory>,
    pub search: Arc<RecordingSearch>,
    pub workflow: Arc<RecordingWorkflow>,
}

impl CatalogRig {
    /// Engine with approval processes bound to `bound` audit types only.
    pub fn new(bound: &[AuditType]) -> Self {
        let store = Arc::new(MemoryCatalogStore::new());
        let directory = Arc::new(FakeDirectory::default());
        let search = Arc::new(RecordingSearch::default());
        let workflow = Arc::new(RecordingWorkflow::default());

        let bindings: Vec<AuditProcessConfig> = bound
            .iter()
            .map(|t| AuditProcessConfig {
                audit_type: *t,
                process_definition_key: format!("catalog-{t}"),
                webhook: "https://gov.example/catalogs/{catalog_id}/owner-audit".to_string(),
            })
            .collect();

        let services = Services {
            departments: directory.clone(),
            info_systems: directory.clone(),
            subjects: directory.clone(),
            categories: directory.clone(),
            standards: directory.clone(),
            resources: directory.clone(),
            sequence: directory.clone(),
            processes: Arc::new(AuditProcessIndex::from_config(&bindings)),
            workflow: workflow.clone(),
            search: search.clone(),
        };

        let engine = Arc::new(CatalogEngine::new(
            store.clone(),
            services,
            LookupTables::standard(),
        ));

        Self {
            engine,
            store,
            directory,
            search,
            workflow,
        }
    }

    /// Create a catalog from [`new_catalog`] and return its id.
    pub async fn create(&self, title: &str) -> CatalogId {
        self.engine
            .save(&new_catalog(title))
            .await
            .unwrap()
            .catalog_id
    }

    /// Overwrite the status pair directly in the store, bypassing the guard.
    pub async fn force_status(&self, id: CatalogId, publish: PublishStatus, online: OnlineStatus) {
        let current = self.store.load_catalog(id).await.unwrap().unwrap();
        let now = Utc::now();
        let transition = AuditTransition {
            catalog_id: id,
            expected: ExpectedState::of(&current.lifecycle),
            lifecycle: Lifecycle {
                publish_status: publish,
                online_status: online,
                ..current.lifecycle.clone()
            },
            merge_draft: false,
            reset_open_catalog: false,
            log: AuditLogEntry {
                catalog_id: id,
                audit_type: AuditType::Publish,
                audit_state: AuditState::None,
                apply_serial: None,
                operator_id: None,
                created_at: now,
            },
            updated_by: None,
            at: now,
        };
        self.store
            .apply_transition(&transition)
            .await
            .unwrap()
            .expect("forced transition applies");
    }
}

pub fn operator() -> Operator {
    Operator::new("u-42", "Reviewer Li")
}

pub fn column(name: &str) -> ColumnInput {
    ColumnInput {
        business_name: name.to_string(),
        technical_name: name.to_lowercase().replace(' ', "_"),
        data_format: "varchar".to_string(),
        data_length: Some(64),
        ..Default::default()
    }
}

/// A create request with one view mount and a column.
pub fn new_catalog(title: &str) -> SaveRequest {
    SaveRequest {
        catalog_id: CatalogId::NEW,
        title: title.to_string(),
        description: Some("test catalog".to_string()),
        department_id: Some(DEPT.to_string()),
        source_department_id: Some(SOURCE_DEPT.to_string()),
        info_system_id: Some(INFO_SYSTEM.to_string()),
        subject_ids: vec![SUBJECT.to_string()],
        custom_category_ids: vec![CATEGORY_NODE.to_string()],
        mounts: vec![MountRequest::new(ResourceType::View, "view-1")],
        columns: vec![column("Invoice No")],
        operator: operator(),
    }
}

/// The same request re-addressed at an existing catalog.
pub fn edit_of(id: CatalogId, base: &SaveRequest) -> SaveRequest {
    SaveRequest {
        catalog_id: id,
        ..base.clone()
    }
}
