//! Error types for the catalog lifecycle engine.
//!
//! Four categories reach callers: validation failures (nothing written),
//! state conflicts, collaborator failures and persistence failures.
//! [`CatalogError::kind`] maps any error onto that taxonomy.

use thiserror::Error;

use crate::types::{AuditType, CatalogId, OnlineStatus, PublishStatus};

/// Malformed or disallowed input. Always raised before any write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid mount: {reason}")]
    InvalidMount { reason: String },

    #[error("Unknown {kind} reference(s): {}", .ids.join(", "))]
    UnknownReference { kind: &'static str, ids: Vec<String> },

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Malformed application id '{value}': {reason}")]
    MalformedApplicationId { value: String, reason: String },

    #[error("Catalog {0} is a draft copy; address its published catalog instead")]
    DraftCopyTarget(CatalogId),
}

impl ValidationError {
    pub fn invalid_mount(reason: impl Into<String>) -> Self {
        Self::InvalidMount {
            reason: reason.into(),
        }
    }
}

/// The request is well-formed but conflicts with the catalog's current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateConflict {
    #[error(
        "Audit '{audit_type}' not allowed (publish_status={}, online_status={})",
        .publish_status.as_str(),
        .online_status.as_str()
    )]
    AuditNotAllowed {
        audit_type: AuditType,
        publish_status: PublishStatus,
        online_status: OnlineStatus,
    },

    #[error("Catalog not found: {0}")]
    NotFound(CatalogId),

    #[error("Catalog title '{0}' is already in use")]
    NameTaken(String),

    #[error("Catalog {catalog_id} is under {audit_type} audit")]
    UnderAudit {
        catalog_id: CatalogId,
        audit_type: AuditType,
    },

    #[error("Catalog {catalog_id} cannot be deleted while {online_status:?}")]
    NotDeletable {
        catalog_id: CatalogId,
        online_status: OnlineStatus,
    },
}

/// Failure of an external collaborator (directory, workflow, search, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },

    #[error("{service} rejected the request: {reason}")]
    Rejected {
        service: &'static str,
        reason: String,
    },

    #[error("{service} returned an undecodable response: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },
}

impl ServiceError {
    pub fn unavailable(service: &'static str, reason: impl ToString) -> Self {
        Self::Unavailable {
            service,
            reason: reason.to_string(),
        }
    }

    pub fn rejected(service: &'static str, reason: impl ToString) -> Self {
        Self::Rejected {
            service,
            reason: reason.to_string(),
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            Self::Unavailable { service, .. }
            | Self::Rejected { service, .. }
            | Self::Decode { service, .. } => service,
        }
    }
}

/// Persistence failure. Any open transaction has been rolled back in full.
#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row for catalog {catalog_id}: {reason}")]
    Corrupt { catalog_id: i64, reason: String },

    #[error("Catalog row missing: {0}")]
    NotFound(CatalogId),
}

/// Taxonomy of [`CatalogError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateConflict,
    Dependency,
    Persistence,
}

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State conflict: {0}")]
    StateConflict(#[from] StateConflict),

    #[error("Dependency error: {0}")]
    Dependency(#[from] ServiceError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::StateConflict(_) => ErrorKind::StateConflict,
            Self::Dependency(_) => ErrorKind::Dependency,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
