//! Catalog domain types.
//!
//! Status enums follow the `as_str` / `parse` pairing used for every value
//! that crosses the persistence boundary. Display labels live in
//! [`crate::lookup::LookupTables`], not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Numeric catalog identifier. `0` on a save request means "create".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogId(pub i64);

impl CatalogId {
    pub const NEW: CatalogId = CatalogId(0);

    pub fn is_new(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-submission token correlating an audit application with its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplySerial(pub Uuid);

impl ApplySerial {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for ApplySerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Who is acting on a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
}

impl Operator {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn system() -> Self {
        Self::new("system", "system")
    }
}

// ─── Status axes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStatus {
    #[default]
    Unpublished,
    PublishAuditing,
    Published,
    PublishRejected,
    ChangeAuditing,
    ChangeRejected,
}

impl PublishStatus {
    pub const ALL: [PublishStatus; 6] = [
        Self::Unpublished,
        Self::PublishAuditing,
        Self::Published,
        Self::PublishRejected,
        Self::ChangeAuditing,
        Self::ChangeRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpublished => "unpublished",
            Self::PublishAuditing => "publish-auditing",
            Self::Published => "published",
            Self::PublishRejected => "publish-rejected",
            Self::ChangeAuditing => "change-auditing",
            Self::ChangeRejected => "change-rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    /// States in which the catalog has a published version that readers see.
    /// Edits in these states go to a draft copy.
    pub fn is_published_family(&self) -> bool {
        matches!(
            self,
            Self::Published | Self::ChangeAuditing | Self::ChangeRejected
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnlineStatus {
    #[default]
    NotOnline,
    Online,
    Offline,
    /// Taken offline automatically after a mounted resource disappeared.
    OfflineAuto,
    OnlineAuditing,
    OfflineAuditing,
    OnlineRejected,
    OfflineRejected,
    OfflineOnlineAuditing,
    OfflineOnlineRejected,
}

impl OnlineStatus {
    pub const ALL: [OnlineStatus; 10] = [
        Self::NotOnline,
        Self::Online,
        Self::Offline,
        Self::OfflineAuto,
        Self::OnlineAuditing,
        Self::OfflineAuditing,
        Self::OnlineRejected,
        Self::OfflineRejected,
        Self::OfflineOnlineAuditing,
        Self::OfflineOnlineRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotOnline => "not-online",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::OfflineAuto => "offline-auto",
            Self::OnlineAuditing => "online-auditing",
            Self::OfflineAuditing => "offline-auditing",
            Self::OnlineRejected => "online-rejected",
            Self::OfflineRejected => "offline-rejected",
            Self::OfflineOnlineAuditing => "offline-online-auditing",
            Self::OfflineOnlineRejected => "offline-online-rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    pub fn is_auditing(&self) -> bool {
        matches!(
            self,
            Self::OnlineAuditing | Self::OfflineAuditing | Self::OfflineOnlineAuditing
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditState {
    #[default]
    None,
    Auditing,
    Pass,
    Reject,
    Withdrawn,
}

impl AuditState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Auditing => "auditing",
            Self::Pass => "pass",
            Self::Reject => "reject",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "auditing" => Some(Self::Auditing),
            "pass" => Some(Self::Pass),
            "reject" => Some(Self::Reject),
            "withdrawn" => Some(Self::Withdrawn),
            _ => None,
        }
    }
}

/// The four guarded transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    Publish,
    Change,
    Online,
    Offline,
}

impl AuditType {
    pub const ALL: [AuditType; 4] = [Self::Publish, Self::Change, Self::Online, Self::Offline];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Change => "change",
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl fmt::Display for AuditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result delivered by the workflow service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Pass,
    Reject,
    Withdrawn,
}

impl AuditOutcome {
    pub fn audit_state(&self) -> AuditState {
        match self {
            Self::Pass => AuditState::Pass,
            Self::Reject => AuditState::Reject,
            Self::Withdrawn => AuditState::Withdrawn,
        }
    }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// The `(publish_status, online_status)` pair restored by a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub publish_status: PublishStatus,
    pub online_status: OnlineStatus,
}

/// Status fields of a catalog. Only the audit orchestrator writes these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub publish_status: PublishStatus,
    pub online_status: OnlineStatus,
    pub audit_state: AuditState,
    pub audit_type: Option<AuditType>,
    pub audit_apply_serial: Option<ApplySerial>,
    pub pre_audit: Option<StatusSnapshot>,
    pub published_at: Option<DateTime<Utc>>,
    pub online_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            publish_status: self.publish_status,
            online_status: self.online_status,
        }
    }

    pub fn is_auditing(&self) -> bool {
        self.audit_state == AuditState::Auditing
    }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// The catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub id: CatalogId,
    pub title: String,
    pub description: Option<String>,
    /// System-generated code, assigned once on creation.
    pub code: String,
    pub department_id: Option<String>,
    pub source_department_id: Option<String>,
    pub info_system_id: Option<String>,
    pub lifecycle: Lifecycle,
    /// Draft copy holding pending edits, if any.
    pub draft_id: Option<CatalogId>,
    /// Set on draft-copy rows: the published catalog they shadow.
    pub draft_of: Option<CatalogId>,
    pub view_count: u32,
    pub api_count: u32,
    pub file_count: u32,
    pub column_unshared: bool,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Catalog {
    pub fn is_draft_copy(&self) -> bool {
        self.draft_of.is_some()
    }
}

/// A catalog with all of its association rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogBundle {
    pub catalog: Catalog,
    pub categories: Vec<CatalogCategory>,
    pub resources: Vec<MountedResource>,
    pub columns: Vec<CatalogColumn>,
}

impl CatalogBundle {
    /// Recompute the denormalized counters and flags from the association rows.
    pub fn refresh_derived(&mut self) {
        let count = |t: ResourceType| {
            self.resources
                .iter()
                .filter(|r| r.resource_type == t)
                .count() as u32
        };
        self.catalog.view_count = count(ResourceType::View);
        self.catalog.api_count = count(ResourceType::Api);
        self.catalog.file_count = count(ResourceType::File);
        self.catalog.column_unshared = self
            .columns
            .iter()
            .any(|c| c.shared_type == SharedType::NotShared);
    }

    /// Rewrite the owning catalog id on every association row.
    pub fn assign_id(&mut self, id: CatalogId) {
        self.catalog.id = id;
        for c in &mut self.categories {
            c.catalog_id = id;
        }
        for r in &mut self.resources {
            r.catalog_id = id;
        }
        for c in &mut self.columns {
            c.catalog_id = id;
        }
    }
}

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Department,
    InfoSystem,
    Subject,
    Custom,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::InfoSystem => "info_system",
            Self::Subject => "subject",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "department" => Some(Self::Department),
            "info_system" => Some(Self::InfoSystem),
            "subject" => Some(Self::Subject),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Reserved subject value standing in for "no real subject".
pub const OTHER_SUBJECT: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub catalog_id: CatalogId,
    pub category_id: String,
    pub category_type: CategoryType,
}

// ─── Mounted resources ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    View,
    Api,
    File,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Api => "api",
            Self::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Self::View),
            "api" => Some(Self::Api),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// A resource bound to a catalog, with the source resource's attributes
/// copied at bind time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountedResource {
    pub catalog_id: CatalogId,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub name: String,
    pub department_id: Option<String>,
    pub subject_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Set on APIs cascade-mounted from a view; such rows are read-only.
    pub derived_from: Option<String>,
}

// ─── Columns ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharedType {
    #[default]
    Unconditional,
    Conditional,
    NotShared,
}

impl SharedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconditional => "unconditional",
            Self::Conditional => "conditional",
            Self::NotShared => "not_shared",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unconditional" => Some(Self::Unconditional),
            "conditional" => Some(Self::Conditional),
            "not_shared" => Some(Self::NotShared),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenType {
    #[default]
    NotOpen,
    Conditional,
    Open,
}

impl OpenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotOpen => "not_open",
            Self::Conditional => "conditional",
            Self::Open => "open",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_open" => Some(Self::NotOpen),
            "conditional" => Some(Self::Conditional),
            "open" => Some(Self::Open),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub catalog_id: CatalogId,
    pub index: u32,
    pub business_name: String,
    pub technical_name: String,
    pub data_format: String,
    pub data_length: Option<i32>,
    pub data_precision: Option<i32>,
    pub shared_type: SharedType,
    pub open_type: OpenType,
    pub classification: Option<String>,
    pub sensitive: bool,
    pub primary_key: bool,
    pub timestamp: bool,
    pub standard_code: Option<String>,
    pub code_table_id: Option<String>,
}

// ─── Audit log ───────────────────────────────────────────────────────────────

/// Append-only record of an audit type/state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub catalog_id: CatalogId,
    pub audit_type: AuditType,
    pub audit_state: AuditState,
    pub apply_serial: Option<ApplySerial>,
    pub operator_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ─── Open-catalog projection ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenStatus {
    #[default]
    NotOpen,
    Open,
}

impl OpenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotOpen => "not-open",
            Self::Open => "open",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not-open" => Some(Self::NotOpen),
            "open" => Some(Self::Open),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenAuditState {
    #[default]
    Unaudited,
    Auditing,
    Pass,
    Reject,
}

impl OpenAuditState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unaudited => "unaudited",
            Self::Auditing => "auditing",
            Self::Pass => "pass",
            Self::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unaudited" => Some(Self::Unaudited),
            "auditing" => Some(Self::Auditing),
            "pass" => Some(Self::Pass),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Exposure state of a catalog in the open-data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCatalog {
    pub catalog_id: CatalogId,
    pub open_status: OpenStatus,
    pub open_audit_state: OpenAuditState,
    pub updated_at: DateTime<Utc>,
}

impl OpenCatalog {
    /// Initial row written alongside a new catalog.
    pub fn not_open(catalog_id: CatalogId, at: DateTime<Utc>) -> Self {
        Self {
            catalog_id,
            open_status: OpenStatus::NotOpen,
            open_audit_state: OpenAuditState::Unaudited,
            updated_at: at,
        }
    }
}
