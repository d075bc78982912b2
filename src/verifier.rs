//! Mount resource verification.
//!
//! Turns a requested list of `(resource_type, resource_id)` pairs into the
//! mount rows a catalog will carry. A mounted view pulls in its bound APIs
//! as derived, read-only rows; user-supplied API mounts are dropped in that
//! case.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{CatalogResult, ValidationError};
use crate::services::{missing_ids, ResourceDirectory, SourceResource};
use crate::types::{CatalogId, MountedResource, ResourceType};

/// One requested mount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountRequest {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl MountRequest {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
        }
    }
}

/// Constraints derived from the catalog being saved.
#[derive(Debug, Clone, Copy, Default)]
pub struct MountPolicy<'a> {
    /// Declared source department of the catalog. Every mounted resource
    /// that reports a source department must match it.
    pub source_department_id: Option<&'a str>,
    /// View currently mounted on the catalog, if any.
    pub current_view: Option<&'a str>,
    pub allow_view_substitution: bool,
}

pub struct MountVerifier {
    resources: Arc<dyn ResourceDirectory>,
}

impl MountVerifier {
    pub fn new(resources: Arc<dyn ResourceDirectory>) -> Self {
        Self { resources }
    }

    /// Validate `requests` and return the mount rows to persist, derived
    /// APIs included. Rows carry `CatalogId::NEW` until the bundle is
    /// assigned an id.
    pub async fn verify(
        &self,
        policy: MountPolicy<'_>,
        requests: &[MountRequest],
    ) -> CatalogResult<Vec<MountedResource>> {
        let mut seen = HashSet::new();
        let requests: Vec<&MountRequest> = requests.iter().filter(|r| seen.insert(*r)).collect();

        let ids_of = |t: ResourceType| -> Vec<String> {
            requests
                .iter()
                .filter(|r| r.resource_type == t)
                .map(|r| r.resource_id.clone())
                .collect()
        };
        let views = ids_of(ResourceType::View);
        let apis = ids_of(ResourceType::Api);
        let files = ids_of(ResourceType::File);

        if views.len() > 1 {
            return Err(ValidationError::invalid_mount(format!(
                "at most one view may be mounted, got {}",
                views.len()
            ))
            .into());
        }
        let view = views.first().map(String::as_str);

        if let (Some(current), Some(requested)) = (policy.current_view, view) {
            if current != requested && !policy.allow_view_substitution {
                return Err(ValidationError::invalid_mount(format!(
                    "view {current} cannot be replaced by {requested} on a published catalog"
                ))
                .into());
            }
        }

        let mut mounted = Vec::new();

        if let Some(view_id) = view {
            let found = self.lookup(ResourceType::View, &views, policy).await?;
            mounted.extend(found.into_iter().map(|r| to_mount(r, None)));

            if !apis.is_empty() {
                tracing::debug!(
                    view_id,
                    dropped = apis.len(),
                    "Replacing requested API mounts with the view's bound APIs"
                );
            }
            let bound = self.resources.bound_apis(view_id).await?;
            mounted.extend(
                bound
                    .into_iter()
                    .map(|r| to_mount(r, Some(view_id.to_string()))),
            );
        } else if !apis.is_empty() {
            let found = self.lookup(ResourceType::Api, &apis, policy).await?;
            mounted.extend(found.into_iter().map(|r| to_mount(r, None)));
        }

        if !files.is_empty() {
            let found = self.lookup(ResourceType::File, &files, policy).await?;
            mounted.extend(found.into_iter().map(|r| to_mount(r, None)));
        }

        Ok(mounted)
    }

    async fn lookup(
        &self,
        resource_type: ResourceType,
        ids: &[String],
        policy: MountPolicy<'_>,
    ) -> CatalogResult<Vec<SourceResource>> {
        let found = self.resources.resources(resource_type, ids).await?;

        let missing = missing_ids(ids, found.iter().map(|r| r.id.as_str()));
        if !missing.is_empty() {
            return Err(ValidationError::UnknownReference {
                kind: resource_type.as_str(),
                ids: missing,
            }
            .into());
        }

        if let Some(expected) = policy.source_department_id {
            if let Some(bad) = found.iter().find(|r| {
                r.source_department_id
                    .as_deref()
                    .is_some_and(|d| d != expected)
            }) {
                return Err(ValidationError::invalid_mount(format!(
                    "{} {} belongs to source department {}, catalog declares {expected}",
                    resource_type.as_str(),
                    bad.id,
                    bad.source_department_id.as_deref().unwrap_or_default()
                ))
                .into());
            }
        }

        // Keep request order.
        let mut ordered = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(r) = found.iter().find(|r| &r.id == id) {
                ordered.push(r.clone());
            }
        }
        Ok(ordered)
    }
}

fn to_mount(source: SourceResource, derived_from: Option<String>) -> MountedResource {
    MountedResource {
        catalog_id: CatalogId::NEW,
        resource_type: source.resource_type,
        resource_id: source.id,
        name: source.name,
        department_id: source.department_id,
        subject_id: source.subject_id,
        published_at: source.published_at,
        derived_from,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, ServiceError};
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StaticDirectory {
        resources: Vec<SourceResource>,
        bound: HashMap<String, Vec<SourceResource>>,
    }

    fn resource(t: ResourceType, id: &str, source_dept: &str) -> SourceResource {
        SourceResource {
            id: id.to_string(),
            resource_type: t,
            name: format!("{} {id}", t.as_str()),
            department_id: Some("d1".to_string()),
            source_department_id: Some(source_dept.to_string()),
            subject_id: None,
            published_at: None,
        }
    }

    #[async_trait]
    impl ResourceDirectory for StaticDirectory {
        async fn resources(
            &self,
            resource_type: ResourceType,
            ids: &[String],
        ) -> Result<Vec<SourceResource>, ServiceError> {
            Ok(self
                .resources
                .iter()
                .filter(|r| r.resource_type == resource_type && ids.contains(&r.id))
                .cloned()
                .collect())
        }

        async fn bound_apis(&self, view_id: &str) -> Result<Vec<SourceResource>, ServiceError> {
            Ok(self.bound.get(view_id).cloned().unwrap_or_default())
        }
    }

    fn verifier() -> MountVerifier {
        let mut dir = StaticDirectory::default();
        dir.resources = vec![
            resource(ResourceType::View, "v1", "src"),
            resource(ResourceType::View, "v2", "src"),
            resource(ResourceType::Api, "a9", "src"),
            resource(ResourceType::File, "f1", "other-dept"),
        ];
        dir.bound.insert(
            "v1".to_string(),
            vec![resource(ResourceType::Api, "a1", "src")],
        );
        MountVerifier::new(Arc::new(dir))
    }

    fn policy() -> MountPolicy<'static> {
        MountPolicy {
            source_department_id: Some("src"),
            current_view: None,
            allow_view_substitution: true,
        }
    }

    #[tokio::test]
    async fn test_view_pulls_in_bound_apis() {
        let mounts = verifier()
            .verify(
                policy(),
                &[
                    MountRequest::new(ResourceType::View, "v1"),
                    MountRequest::new(ResourceType::Api, "a9"),
                ],
            )
            .await
            .unwrap();

        let ids: Vec<_> = mounts.iter().map(|m| m.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "a1"]);
        assert_eq!(mounts[1].derived_from.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_two_views_rejected() {
        let err = verifier()
            .verify(
                policy(),
                &[
                    MountRequest::new(ResourceType::View, "v1"),
                    MountRequest::new(ResourceType::View, "v2"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::InvalidMount { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_view_request_counts_once() {
        let mounts = verifier()
            .verify(
                policy(),
                &[
                    MountRequest::new(ResourceType::View, "v1"),
                    MountRequest::new(ResourceType::View, "v1"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(mounts.len(), 2);
    }

    #[tokio::test]
    async fn test_view_swap_blocked_without_substitution() {
        let policy = MountPolicy {
            current_view: Some("v1"),
            allow_view_substitution: false,
            ..policy()
        };
        let err = verifier()
            .verify(policy, &[MountRequest::new(ResourceType::View, "v2")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot be replaced"));
    }

    #[tokio::test]
    async fn test_source_department_mismatch() {
        let err = verifier()
            .verify(policy(), &[MountRequest::new(ResourceType::File, "f1")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::InvalidMount { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let err = verifier()
            .verify(policy(), &[MountRequest::new(ResourceType::Api, "nope")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::UnknownReference { kind: "api", .. })
        ));
    }
}
