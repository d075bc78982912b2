//! Which audit types may be submitted from which status pairs.

use crate::error::StateConflict;
use crate::types::{AuditType, OnlineStatus, PublishStatus};

/// Publish statuses from which a catalog may go online or offline.
const SERVABLE: [PublishStatus; 3] = [
    PublishStatus::Published,
    PublishStatus::PublishRejected,
    PublishStatus::ChangeRejected,
];

pub fn is_allowed(
    audit_type: AuditType,
    publish_status: PublishStatus,
    online_status: OnlineStatus,
) -> bool {
    use OnlineStatus as O;
    use PublishStatus as P;

    match audit_type {
        AuditType::Publish => {
            matches!(
                publish_status,
                P::Unpublished | P::PublishRejected | P::ChangeRejected
            ) && online_status == O::NotOnline
        }
        AuditType::Change => {
            matches!(publish_status, P::Published | P::ChangeRejected)
                && !online_status.is_auditing()
        }
        AuditType::Online => {
            SERVABLE.contains(&publish_status)
                && matches!(
                    online_status,
                    O::NotOnline | O::Offline | O::OfflineAuto | O::OnlineRejected
                )
        }
        AuditType::Offline => {
            SERVABLE.contains(&publish_status)
                && matches!(online_status, O::Online | O::OfflineRejected)
        }
    }
}

pub fn check_allowed(
    audit_type: AuditType,
    publish_status: PublishStatus,
    online_status: OnlineStatus,
) -> Result<(), StateConflict> {
    if is_allowed(audit_type, publish_status, online_status) {
        Ok(())
    } else {
        Err(StateConflict::AuditNotAllowed {
            audit_type,
            publish_status,
            online_status,
        })
    }
}
