//! Draft & publish management: routes every save to a create, an in-place
//! save, or a draft copy shadowing a published catalog.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{CatalogResult, StateConflict, ValidationError};
use crate::search::SearchSynchronizer;
use crate::services::{missing_ids, Services};
use crate::store::CatalogStore;
use crate::types::{
    Catalog, CatalogBundle, CatalogCategory, CatalogColumn, CatalogId, CategoryType, Lifecycle,
    OpenType, Operator, ResourceType, SharedType, OTHER_SUBJECT,
};
use crate::verifier::{MountPolicy, MountRequest, MountVerifier};

// ─── Requests ────────────────────────────────────────────────────────────────

/// Column payload of a save request. Ordinals come from list position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInput {
    pub business_name: String,
    pub technical_name: String,
    pub data_format: String,
    #[serde(default)]
    pub data_length: Option<i32>,
    #[serde(default)]
    pub data_precision: Option<i32>,
    #[serde(default)]
    pub shared_type: SharedType,
    #[serde(default)]
    pub open_type: OpenType,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub timestamp: bool,
    #[serde(default)]
    pub standard_code: Option<String>,
    #[serde(default)]
    pub code_table_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// `CatalogId::NEW` creates a catalog.
    #[serde(default)]
    pub catalog_id: CatalogId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub source_department_id: Option<String>,
    #[serde(default)]
    pub info_system_id: Option<String>,
    #[serde(default)]
    pub subject_ids: Vec<String>,
    #[serde(default)]
    pub custom_category_ids: Vec<String>,
    #[serde(default)]
    pub mounts: Vec<MountRequest>,
    #[serde(default)]
    pub columns: Vec<ColumnInput>,
    pub operator: Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveKind {
    Created,
    SavedInPlace,
    DraftCopyCreated,
    DraftCopyUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// The catalog readers address. For draft-copy saves this is the
    /// published catalog, not the shadow row.
    pub catalog_id: CatalogId,
    pub draft_id: Option<CatalogId>,
    pub kind: SaveKind,
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct DraftPublishManager {
    store: Arc<dyn CatalogStore>,
    services: Services,
    verifier: MountVerifier,
    search: Arc<SearchSynchronizer>,
}

impl DraftPublishManager {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        services: Services,
        search: Arc<SearchSynchronizer>,
    ) -> Self {
        let verifier = MountVerifier::new(services.resources.clone());
        Self {
            store,
            services,
            verifier,
            search,
        }
    }

    pub async fn save(&self, request: &SaveRequest) -> CatalogResult<SaveOutcome> {
        if request.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title").into());
        }

        let current = if request.catalog_id.is_new() {
            None
        } else {
            Some(self.load_target(request.catalog_id).await?)
        };

        if let Some(existing) = &current {
            let lifecycle = &existing.catalog.lifecycle;
            if let (true, Some(audit_type)) = (lifecycle.is_auditing(), lifecycle.audit_type) {
                return Err(StateConflict::UnderAudit {
                    catalog_id: existing.catalog.id,
                    audit_type,
                }
                .into());
            }
        }

        let published = current
            .as_ref()
            .is_some_and(|b| b.catalog.lifecycle.publish_status.is_published_family());
        let current_view = current.as_ref().and_then(|b| {
            b.resources
                .iter()
                .find(|r| r.resource_type == ResourceType::View)
                .map(|r| r.resource_id.as_str())
        });

        let resources = self
            .verifier
            .verify(
                MountPolicy {
                    source_department_id: request.source_department_id.as_deref(),
                    current_view,
                    allow_view_substitution: !published,
                },
                &request.mounts,
            )
            .await?;
        let categories = self.resolve_categories(request).await?;
        let columns = self.resolve_columns(&request.columns).await?;

        let mut exclude = Vec::new();
        if let Some(existing) = &current {
            exclude.push(existing.catalog.id);
            exclude.extend(existing.catalog.draft_id);
        }
        if self.store.title_in_use(&request.title, &exclude).await? {
            return Err(StateConflict::NameTaken(request.title.clone()).into());
        }

        let now = Utc::now();
        let template = Catalog {
            id: CatalogId::NEW,
            title: request.title.clone(),
            description: request.description.clone(),
            code: String::new(),
            department_id: request.department_id.clone(),
            source_department_id: request.source_department_id.clone(),
            info_system_id: request.info_system_id.clone(),
            lifecycle: Lifecycle::default(),
            draft_id: None,
            draft_of: None,
            view_count: 0,
            api_count: 0,
            file_count: 0,
            column_unshared: false,
            created_by: Some(request.operator.id.clone()),
            updated_by: Some(request.operator.id.clone()),
            created_at: now,
            updated_at: now,
        };
        let mut bundle = CatalogBundle {
            catalog: template,
            categories,
            resources,
            columns,
        };
        bundle.refresh_derived();

        match current {
            None => self.create(bundle).await,
            Some(existing) if !published => self.save_in_place(existing, bundle).await,
            Some(existing) => self.save_draft_copy(existing, bundle).await,
        }
    }

    /// Load the catalog a save addresses. A draft-copy id resolves to its
    /// published parent.
    async fn load_target(&self, id: CatalogId) -> CatalogResult<CatalogBundle> {
        let bundle = self
            .store
            .load_bundle(id)
            .await?
            .ok_or(StateConflict::NotFound(id))?;

        match bundle.catalog.draft_of {
            Some(parent_id) => {
                tracing::debug!(
                    catalog_id = %id,
                    parent_id = %parent_id,
                    "Redirecting save to published catalog"
                );
                Ok(self
                    .store
                    .load_bundle(parent_id)
                    .await?
                    .ok_or(StateConflict::NotFound(parent_id))?)
            }
            None => Ok(bundle),
        }
    }

    async fn create(&self, mut bundle: CatalogBundle) -> CatalogResult<SaveOutcome> {
        bundle.catalog.code = self.services.sequence.next_code().await?;

        let id = self.store.insert_catalog(&bundle).await?;
        tracing::info!(catalog_id = %id, code = %bundle.catalog.code, "Created catalog");

        self.search.push(id).await?;
        Ok(SaveOutcome {
            catalog_id: id,
            draft_id: None,
            kind: SaveKind::Created,
        })
    }

    async fn save_in_place(
        &self,
        existing: CatalogBundle,
        mut bundle: CatalogBundle,
    ) -> CatalogResult<SaveOutcome> {
        let id = existing.catalog.id;
        keep_identity(&mut bundle.catalog, &existing.catalog);
        bundle.assign_id(id);

        self.store.replace_content(&bundle).await?;
        tracing::info!(catalog_id = %id, "Saved catalog in place");

        self.search.push(id).await?;
        Ok(SaveOutcome {
            catalog_id: id,
            draft_id: None,
            kind: SaveKind::SavedInPlace,
        })
    }

    async fn save_draft_copy(
        &self,
        existing: CatalogBundle,
        mut bundle: CatalogBundle,
    ) -> CatalogResult<SaveOutcome> {
        let parent_id = existing.catalog.id;
        bundle.catalog.code = existing.catalog.code.clone();

        match existing.catalog.draft_id {
            None => {
                bundle.catalog.draft_of = Some(parent_id);
                let draft_id = self.store.insert_draft_copy(parent_id, &bundle).await?;
                tracing::info!(catalog_id = %parent_id, draft_id = %draft_id, "Created draft copy");
                Ok(SaveOutcome {
                    catalog_id: parent_id,
                    draft_id: Some(draft_id),
                    kind: SaveKind::DraftCopyCreated,
                })
            }
            Some(draft_id) => {
                let draft = self
                    .store
                    .load_catalog(draft_id)
                    .await?
                    .ok_or(StateConflict::NotFound(draft_id))?;
                keep_identity(&mut bundle.catalog, &draft);
                bundle.assign_id(draft_id);

                self.store.replace_content(&bundle).await?;
                tracing::info!(catalog_id = %parent_id, draft_id = %draft_id, "Updated draft copy");
                Ok(SaveOutcome {
                    catalog_id: parent_id,
                    draft_id: Some(draft_id),
                    kind: SaveKind::DraftCopyUpdated,
                })
            }
        }
    }

    // ─── Reference resolution ────────────────────────────────────────────────

    async fn resolve_categories(
        &self,
        request: &SaveRequest,
    ) -> CatalogResult<Vec<CatalogCategory>> {
        let mut categories = Vec::new();
        let row = |category_type, id: &str| CatalogCategory {
            catalog_id: CatalogId::NEW,
            category_id: id.to_string(),
            category_type,
        };

        if let Some(dept) = &request.department_id {
            let ids = [dept.clone()];
            let found = self.services.departments.departments(&ids).await?;
            require_all("department", &ids, found.iter().map(|d| d.id.as_str()))?;
            categories.push(row(CategoryType::Department, dept));
        }

        if let Some(system) = &request.info_system_id {
            let ids = [system.clone()];
            let found = self.services.info_systems.info_systems(&ids).await?;
            require_all("info system", &ids, found.iter().map(|s| s.id.as_str()))?;
            categories.push(row(CategoryType::InfoSystem, system));
        }

        let mut subjects: Vec<String> = Vec::new();
        let mut other = false;
        for id in &request.subject_ids {
            if id == OTHER_SUBJECT {
                other = true;
            } else if !subjects.contains(id) {
                subjects.push(id.clone());
            }
        }
        if !subjects.is_empty() {
            let found = self.services.subjects.subjects(&subjects).await?;
            require_all("subject", &subjects, found.iter().map(|s| s.id.as_str()))?;
        }
        categories.extend(subjects.iter().map(|id| row(CategoryType::Subject, id)));
        if other {
            categories.push(row(CategoryType::Subject, OTHER_SUBJECT));
        }

        let mut custom: Vec<String> = Vec::new();
        for id in &request.custom_category_ids {
            if !custom.contains(id) {
                custom.push(id.clone());
            }
        }
        if !custom.is_empty() {
            let found = self.services.categories.nodes(&custom).await?;
            require_all("category node", &custom, found.iter().map(|n| n.id.as_str()))?;
        }
        categories.extend(custom.iter().map(|id| row(CategoryType::Custom, id)));

        Ok(categories)
    }

    async fn resolve_columns(&self, inputs: &[ColumnInput]) -> CatalogResult<Vec<CatalogColumn>> {
        for (i, c) in inputs.iter().enumerate() {
            if c.technical_name.trim().is_empty() {
                tracing::debug!(index = i, "Column without technical name");
                return Err(ValidationError::MissingField("columns.technical_name").into());
            }
        }

        let standards = distinct(inputs.iter().filter_map(|c| c.standard_code.as_ref()));
        if !standards.is_empty() {
            let found = self.services.standards.standards(&standards).await?;
            require_all("data standard", &standards, found.iter().map(|s| s.code.as_str()))?;
        }

        let tables = distinct(inputs.iter().filter_map(|c| c.code_table_id.as_ref()));
        if !tables.is_empty() {
            let found = self.services.standards.code_tables(&tables).await?;
            require_all("code table", &tables, found.iter().map(|t| t.id.as_str()))?;
        }

        Ok(inputs
            .iter()
            .enumerate()
            .map(|(i, c)| CatalogColumn {
                catalog_id: CatalogId::NEW,
                index: i as u32,
                business_name: c.business_name.clone(),
                technical_name: c.technical_name.clone(),
                data_format: c.data_format.clone(),
                data_length: c.data_length,
                data_precision: c.data_precision,
                shared_type: c.shared_type,
                open_type: c.open_type,
                classification: c.classification.clone(),
                sensitive: c.sensitive,
                primary_key: c.primary_key,
                timestamp: c.timestamp,
                standard_code: c.standard_code.clone(),
                code_table_id: c.code_table_id.clone(),
            })
            .collect())
    }
}

/// Carry over what a save never changes: id, code, lifecycle, draft links
/// and creation stamp.
fn keep_identity(target: &mut Catalog, existing: &Catalog) {
    target.id = existing.id;
    target.code = existing.code.clone();
    target.lifecycle = existing.lifecycle.clone();
    target.draft_id = existing.draft_id;
    target.draft_of = existing.draft_of;
    target.created_by = existing.created_by.clone();
    target.created_at = existing.created_at;
}

fn require_all<'a>(
    kind: &'static str,
    requested: &'a [String],
    found: impl IntoIterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    let missing = missing_ids(requested, found);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UnknownReference { kind, ids: missing })
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}
