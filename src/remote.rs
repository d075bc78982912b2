//! HTTP implementations of the collaborator traits.
//!
//! One `reqwest::Client` is shared by every collaborator; base URLs come
//! from [`ServiceEndpoints`]. Lookups are `POST .../lookup` with an id list,
//! search writes are `PUT`/`DELETE` on `/catalogs/{id}`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ServiceEndpoints;
use crate::error::ServiceError;
use crate::search::CatalogDocument;
use crate::services::{
    AuditApplication, CategoryNode, CategoryTree, CodeSequence, CodeTable, DataStandard,
    Department, DepartmentDirectory, InfoSystem, InfoSystemDirectory, ProcessBindings,
    ResourceDirectory, SearchRepository, Services, SourceResource, StandardsService,
    SubjectDomainService, SubjectNode, WorkflowService,
};
use crate::types::{CatalogId, ResourceType};

const BODY_EXCERPT: usize = 200;

#[derive(Debug, Deserialize)]
struct NextCode {
    code: String,
}

#[derive(Debug, Serialize)]
struct ResourceLookup<'a> {
    resource_type: ResourceType,
    ids: &'a [String],
}

#[derive(Debug, Clone)]
pub struct RemoteServices {
    http: Client,
    endpoints: ServiceEndpoints,
}

impl RemoteServices {
    pub fn new(endpoints: ServiceEndpoints) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(endpoints.timeout_secs))
            .build()
            .map_err(|e| ServiceError::unavailable("http", e))?;
        Ok(Self { http, endpoints })
    }

    /// Bundle this client as every collaborator, with `processes` as the
    /// audit-process lookup.
    pub fn into_services(self, processes: Arc<dyn ProcessBindings>) -> Services {
        let remote = Arc::new(self);
        Services {
            departments: remote.clone(),
            info_systems: remote.clone(),
            subjects: remote.clone(),
            categories: remote.clone(),
            standards: remote.clone(),
            resources: remote.clone(),
            sequence: remote.clone(),
            processes,
            workflow: remote.clone(),
            search: remote,
        }
    }

    async fn send(
        &self,
        service: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ServiceError> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::unavailable(service, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = format!(
            "{status}: {}",
            body.chars().take(BODY_EXCERPT).collect::<String>()
        );
        if status.is_server_error() {
            Err(ServiceError::unavailable(service, reason))
        } else {
            Err(ServiceError::rejected(service, reason))
        }
    }

    async fn decode<T: DeserializeOwned>(
        service: &'static str,
        response: Response,
    ) -> Result<T, ServiceError> {
        response.json().await.map_err(|e| ServiceError::Decode {
            service,
            reason: e.to_string(),
        })
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: String,
        body: serde_json::Value,
    ) -> Result<Vec<T>, ServiceError> {
        debug!(service, url = %url, "Collaborator lookup");
        let response = self.send(service, self.http.post(&url).json(&body)).await?;
        Self::decode(service, response).await
    }
}

#[async_trait]
impl DepartmentDirectory for RemoteServices {
    async fn departments(&self, ids: &[String]) -> Result<Vec<Department>, ServiceError> {
        let url = format!("{}/departments/lookup", self.endpoints.directory);
        self.lookup("department directory", url, json!({ "ids": ids }))
            .await
    }
}

#[async_trait]
impl InfoSystemDirectory for RemoteServices {
    async fn info_systems(&self, ids: &[String]) -> Result<Vec<InfoSystem>, ServiceError> {
        let url = format!("{}/info-systems/lookup", self.endpoints.directory);
        self.lookup("info system directory", url, json!({ "ids": ids }))
            .await
    }
}

#[async_trait]
impl SubjectDomainService for RemoteServices {
    async fn subjects(&self, ids: &[String]) -> Result<Vec<SubjectNode>, ServiceError> {
        let url = format!("{}/subjects/lookup", self.endpoints.subjects);
        self.lookup("subject domain", url, json!({ "ids": ids })).await
    }
}

#[async_trait]
impl CategoryTree for RemoteServices {
    async fn nodes(&self, ids: &[String]) -> Result<Vec<CategoryNode>, ServiceError> {
        let url = format!("{}/category-nodes/lookup", self.endpoints.categories);
        self.lookup("category tree", url, json!({ "ids": ids })).await
    }
}

#[async_trait]
impl StandardsService for RemoteServices {
    async fn standards(&self, codes: &[String]) -> Result<Vec<DataStandard>, ServiceError> {
        let url = format!("{}/standards/lookup", self.endpoints.standards);
        self.lookup("standards", url, json!({ "codes": codes })).await
    }

    async fn code_tables(&self, ids: &[String]) -> Result<Vec<CodeTable>, ServiceError> {
        let url = format!("{}/code-tables/lookup", self.endpoints.standards);
        self.lookup("standards", url, json!({ "ids": ids })).await
    }
}

#[async_trait]
impl ResourceDirectory for RemoteServices {
    async fn resources(
        &self,
        resource_type: ResourceType,
        ids: &[String],
    ) -> Result<Vec<SourceResource>, ServiceError> {
        let url = format!("{}/resources/lookup", self.endpoints.resources);
        let body = ResourceLookup { resource_type, ids };
        let response = self
            .send("resource directory", self.http.post(&url).json(&body))
            .await?;
        Self::decode("resource directory", response).await
    }

    async fn bound_apis(&self, view_id: &str) -> Result<Vec<SourceResource>, ServiceError> {
        let url = format!("{}/views/{view_id}/apis", self.endpoints.resources);
        let response = self.send("resource directory", self.http.get(&url)).await?;
        Self::decode("resource directory", response).await
    }
}

#[async_trait]
impl CodeSequence for RemoteServices {
    async fn next_code(&self) -> Result<String, ServiceError> {
        let url = format!("{}/sequences/catalog-code/next", self.endpoints.sequence);
        let response = self.send("code sequence", self.http.post(&url)).await?;
        let next: NextCode = Self::decode("code sequence", response).await?;
        Ok(next.code)
    }
}

#[async_trait]
impl WorkflowService for RemoteServices {
    async fn submit(&self, application: &AuditApplication) -> Result<(), ServiceError> {
        let url = format!("{}/applications", self.endpoints.workflow);
        self.send("workflow", self.http.post(&url).json(application))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SearchRepository for RemoteServices {
    async fn upsert(&self, document: &CatalogDocument) -> Result<(), ServiceError> {
        let url = format!("{}/catalogs/{}", self.endpoints.search, document.id);
        self.send("search", self.http.put(&url).json(document))
            .await?;
        Ok(())
    }

    async fn delete(&self, catalog_id: CatalogId) -> Result<(), ServiceError> {
        let url = format!("{}/catalogs/{catalog_id}", self.endpoints.search);
        self.send("search", self.http.delete(&url)).await?;
        Ok(())
    }

    async fn upsert_apply_count(
        &self,
        catalog_id: CatalogId,
        count: u64,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/catalogs/{catalog_id}/apply-count", self.endpoints.search);
        self.send("search", self.http.put(&url).json(&json!({ "count": count })))
            .await?;
        Ok(())
    }
}
