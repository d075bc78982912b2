//! Engine configuration: load from YAML, overlay environment, index the
//! audit-process bindings.
//!
//! ```yaml
//! database:
//!   database_url: postgresql://localhost:5432/catalog
//! audit_processes:
//!   - audit_type: change
//!     process_definition_key: catalog-change
//!     webhook: https://gov.example/catalogs/{catalog_id}/owner-audit
//! services:
//!   workflow: http://workflow:8080
//! labels:
//!   publish_status:
//!     published: Live
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::ServiceError;
use crate::services::{ProcessBinding, ProcessBindings};
use crate::types::AuditType;

/// Environment variable pointing at the YAML config file.
pub const CONFIG_PATH_ENV: &str = "CATALOG_CONFIG";

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub audit_processes: Vec<AuditProcessConfig>,
    #[serde(default)]
    pub services: ServiceEndpoints,
    #[serde(default)]
    pub labels: LabelOverrides,
}

impl EngineConfig {
    /// Parse a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Parsing {}", path.display()))
    }

    /// Load `.env`, then the file named by `CATALOG_CONFIG` (if set), then
    /// overlay `DATABASE_URL` / `DATABASE_POOL_SIZE`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.database.overlay_env();
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost:5432/catalog".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Apply `DATABASE_URL` / `DATABASE_POOL_SIZE` when set.
    pub fn overlay_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(size) = std::env::var("DATABASE_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.max_connections = size;
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Collaborator endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEndpoints {
    pub workflow: String,
    pub search: String,
    pub directory: String,
    pub subjects: String,
    pub categories: String,
    pub standards: String,
    pub resources: String,
    pub sequence: String,
    pub timeout_secs: u64,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        let local = "http://localhost:8080".to_string();
        Self {
            workflow: local.clone(),
            search: local.clone(),
            directory: local.clone(),
            subjects: local.clone(),
            categories: local.clone(),
            standards: local.clone(),
            resources: local.clone(),
            sequence: local,
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Label overrides keyed by status code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelOverrides {
    pub publish_status: HashMap<String, String>,
    pub online_status: HashMap<String, String>,
    pub audit_state: HashMap<String, String>,
    pub audit_type: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Audit process bindings
// ---------------------------------------------------------------------------

/// One approval process bound to an audit type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditProcessConfig {
    pub audit_type: AuditType,
    pub process_definition_key: String,
    /// Callback URL template; `{catalog_id}` is substituted per application.
    pub webhook: String,
}

/// Indexed audit-process bindings. Audit types with no entry are unbound
/// and resolve synchronously.
#[derive(Debug, Clone, Default)]
pub struct AuditProcessIndex {
    by_type: HashMap<AuditType, ProcessBinding>,
}

impl AuditProcessIndex {
    pub fn from_config(entries: &[AuditProcessConfig]) -> Self {
        let mut by_type = HashMap::new();
        for entry in entries {
            let binding = ProcessBinding {
                audit_type: entry.audit_type,
                process_definition_key: entry.process_definition_key.clone(),
                webhook_template: entry.webhook.clone(),
            };
            if by_type.insert(entry.audit_type, binding).is_some() {
                tracing::warn!(
                    audit_type = %entry.audit_type,
                    "Duplicate audit process binding, last entry wins"
                );
            }
        }
        Self { by_type }
    }

    pub fn binding(&self, audit_type: AuditType) -> Option<&ProcessBinding> {
        self.by_type.get(&audit_type)
    }

    pub fn bound_count(&self) -> usize {
        self.by_type.len()
    }
}

#[async_trait]
impl ProcessBindings for AuditProcessIndex {
    async fn bound_process(
        &self,
        audit_type: AuditType,
    ) -> Result<Option<ProcessBinding>, ServiceError> {
        Ok(self.binding(audit_type).cloned())
    }
}
