//! Display-label tables for status codes.
//!
//! Built once at startup (optionally overridden from configuration) and
//! passed by reference to whatever renders statuses for readers, currently
//! the search projection.

use std::collections::HashMap;
use std::hash::Hash;

use crate::config::LabelOverrides;
use crate::types::{AuditState, AuditType, OnlineStatus, PublishStatus};

/// Code → label mapping for one enum.
#[derive(Debug, Clone)]
pub struct LabelTable<T> {
    labels: HashMap<T, String>,
}

impl<T: Copy + Eq + Hash> LabelTable<T> {
    fn new(entries: &[(T, &str)]) -> Self {
        Self {
            labels: entries
                .iter()
                .map(|(k, v)| (*k, v.to_string()))
                .collect(),
        }
    }

    /// Replace labels for the codes present in `overrides`.
    /// Codes that do not parse are reported back to the caller.
    fn apply_overrides(
        &mut self,
        overrides: &HashMap<String, String>,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Vec<String> {
        let mut unknown = Vec::new();
        for (code, label) in overrides {
            match parse(code) {
                Some(key) => {
                    self.labels.insert(key, label.clone());
                }
                None => unknown.push(code.clone()),
            }
        }
        unknown.sort();
        unknown
    }

    pub fn label(&self, value: T) -> &str {
        self.labels.get(&value).map(String::as_str).unwrap_or("")
    }
}

/// All label tables used by the engine.
#[derive(Debug, Clone)]
pub struct LookupTables {
    pub publish_status: LabelTable<PublishStatus>,
    pub online_status: LabelTable<OnlineStatus>,
    pub audit_state: LabelTable<AuditState>,
    pub audit_type: LabelTable<AuditType>,
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::standard()
    }
}

impl LookupTables {
    pub fn standard() -> Self {
        use OnlineStatus as O;
        use PublishStatus as P;

        Self {
            publish_status: LabelTable::new(&[
                (P::Unpublished, "Unpublished"),
                (P::PublishAuditing, "Publish under review"),
                (P::Published, "Published"),
                (P::PublishRejected, "Publish rejected"),
                (P::ChangeAuditing, "Change under review"),
                (P::ChangeRejected, "Change rejected"),
            ]),
            online_status: LabelTable::new(&[
                (O::NotOnline, "Not online"),
                (O::Online, "Online"),
                (O::Offline, "Offline"),
                (O::OfflineAuto, "Offline (automatic)"),
                (O::OnlineAuditing, "Online under review"),
                (O::OfflineAuditing, "Offline under review"),
                (O::OnlineRejected, "Online rejected"),
                (O::OfflineRejected, "Offline rejected"),
                (O::OfflineOnlineAuditing, "Re-online under review"),
                (O::OfflineOnlineRejected, "Re-online rejected"),
            ]),
            audit_state: LabelTable::new(&[
                (AuditState::None, "Not audited"),
                (AuditState::Auditing, "Under review"),
                (AuditState::Pass, "Approved"),
                (AuditState::Reject, "Rejected"),
                (AuditState::Withdrawn, "Withdrawn"),
            ]),
            audit_type: LabelTable::new(&[
                (AuditType::Publish, "Publish"),
                (AuditType::Change, "Change"),
                (AuditType::Online, "Online"),
                (AuditType::Offline, "Offline"),
            ]),
        }
    }

    /// Standard tables with configured overrides applied.
    pub fn with_overrides(overrides: &LabelOverrides) -> Self {
        let mut tables = Self::standard();
        let mut unknown = Vec::new();
        unknown.extend(
            tables
                .publish_status
                .apply_overrides(&overrides.publish_status, PublishStatus::parse),
        );
        unknown.extend(
            tables
                .online_status
                .apply_overrides(&overrides.online_status, OnlineStatus::parse),
        );
        unknown.extend(
            tables
                .audit_state
                .apply_overrides(&overrides.audit_state, AuditState::parse),
        );
        unknown.extend(
            tables
                .audit_type
                .apply_overrides(&overrides.audit_type, AuditType::parse),
        );
        if !unknown.is_empty() {
            tracing::warn!(codes = ?unknown, "Ignoring label overrides for unknown codes");
        }
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_has_a_label() {
        let tables = LookupTables::standard();
        for s in PublishStatus::ALL {
            assert!(!tables.publish_status.label(s).is_empty());
        }
        for s in OnlineStatus::ALL {
            assert!(!tables.online_status.label(s).is_empty());
        }
    }

    #[test]
    fn test_overrides_replace_known_codes_only() {
        let mut overrides = LabelOverrides::default();
        overrides
            .publish_status
            .insert("published".into(), "Live".into());
        overrides
            .publish_status
            .insert("bogus".into(), "Ignored".into());

        let tables = LookupTables::with_overrides(&overrides);
        assert_eq!(tables.publish_status.label(PublishStatus::Published), "Live");
        assert_eq!(
            tables.publish_status.label(PublishStatus::Unpublished),
            "Unpublished"
        );
    }
}
