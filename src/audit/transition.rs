//! Pure lifecycle arithmetic: what a catalog's status fields become when an
//! audit is submitted and when it resolves.

use chrono::{DateTime, Utc};

use crate::types::{
    ApplySerial, AuditOutcome, AuditState, AuditType, Lifecycle, OnlineStatus, PublishStatus,
    StatusSnapshot,
};

/// Status fields after submitting `audit_type`. The caller has already
/// checked the guard.
pub fn submitted(
    current: &Lifecycle,
    audit_type: AuditType,
    serial: Option<ApplySerial>,
) -> Lifecycle {
    let mut next = current.clone();
    next.pre_audit = Some(current.snapshot());
    next.audit_state = AuditState::Auditing;
    next.audit_type = Some(audit_type);
    next.audit_apply_serial = serial;

    match audit_type {
        AuditType::Publish => next.publish_status = PublishStatus::PublishAuditing,
        AuditType::Change => next.publish_status = PublishStatus::ChangeAuditing,
        AuditType::Online => {
            next.online_status = match current.online_status {
                OnlineStatus::Offline | OnlineStatus::OfflineAuto => {
                    OnlineStatus::OfflineOnlineAuditing
                }
                _ => OnlineStatus::OnlineAuditing,
            }
        }
        AuditType::Offline => next.online_status = OnlineStatus::OfflineAuditing,
    }
    next
}

/// Status fields after the pending `audit_type` resolves with `outcome`.
pub fn resolved(
    current: &Lifecycle,
    audit_type: AuditType,
    outcome: AuditOutcome,
    at: DateTime<Utc>,
) -> Lifecycle {
    let mut next = current.clone();
    next.audit_state = outcome.audit_state();
    next.audit_type = Some(audit_type);

    match outcome {
        AuditOutcome::Pass => match audit_type {
            AuditType::Publish | AuditType::Change => {
                next.publish_status = PublishStatus::Published;
                if audit_type == AuditType::Publish {
                    next.published_at = Some(at);
                }
            }
            AuditType::Online => {
                next.online_status = OnlineStatus::Online;
                next.online_at = Some(at);
            }
            AuditType::Offline => next.online_status = OnlineStatus::Offline,
        },
        AuditOutcome::Reject => match audit_type {
            AuditType::Publish => next.publish_status = PublishStatus::PublishRejected,
            AuditType::Change => next.publish_status = PublishStatus::ChangeRejected,
            AuditType::Online => {
                next.online_status = if current.online_status == OnlineStatus::OfflineOnlineAuditing
                {
                    OnlineStatus::OfflineOnlineRejected
                } else {
                    OnlineStatus::OnlineRejected
                }
            }
            AuditType::Offline => next.online_status = OnlineStatus::OfflineRejected,
        },
        AuditOutcome::Withdrawn => {
            let before = current
                .pre_audit
                .unwrap_or_else(|| assumed_pre_audit(current, audit_type));
            next.publish_status = before.publish_status;
            next.online_status = before.online_status;
        }
    }

    next.pre_audit = None;
    next
}

/// Best guess at the pre-audit pair for rows written without a snapshot.
fn assumed_pre_audit(current: &Lifecycle, audit_type: AuditType) -> StatusSnapshot {
    let mut before = current.snapshot();
    match audit_type {
        AuditType::Publish => before.publish_status = PublishStatus::Unpublished,
        AuditType::Change => before.publish_status = PublishStatus::Published,
        AuditType::Online => {
            before.online_status = if current.online_status == OnlineStatus::OfflineOnlineAuditing
            {
                OnlineStatus::Offline
            } else {
                OnlineStatus::NotOnline
            }
        }
        AuditType::Offline => before.online_status = OnlineStatus::Online,
    }
    before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle(publish_status: PublishStatus, online_status: OnlineStatus) -> Lifecycle {
        Lifecycle {
            publish_status,
            online_status,
            ..Default::default()
        }
    }

    #[test]
    fn test_publish_pass_stamps_published_at() {
        let at = Utc::now();
        let start = lifecycle(PublishStatus::Unpublished, OnlineStatus::NotOnline);
        let pending = submitted(&start, AuditType::Publish, Some(ApplySerial::generate()));
        assert_eq!(pending.publish_status, PublishStatus::PublishAuditing);
        assert_eq!(pending.audit_state, AuditState::Auditing);

        let done = resolved(&pending, AuditType::Publish, AuditOutcome::Pass, at);
        assert_eq!(done.publish_status, PublishStatus::Published);
        assert_eq!(done.published_at, Some(at));
        assert_eq!(done.audit_state, AuditState::Pass);
        assert_eq!(done.pre_audit, None);
    }

    #[test]
    fn test_online_from_offline_uses_reonline_states() {
        let start = lifecycle(PublishStatus::Published, OnlineStatus::Offline);
        let pending = submitted(&start, AuditType::Online, None);
        assert_eq!(pending.online_status, OnlineStatus::OfflineOnlineAuditing);

        let rejected = resolved(&pending, AuditType::Online, AuditOutcome::Reject, Utc::now());
        assert_eq!(rejected.online_status, OnlineStatus::OfflineOnlineRejected);
        assert_eq!(rejected.audit_state, AuditState::Reject);
    }

    #[test]
    fn test_withdrawn_restores_snapshot_not_rejected() {
        let start = lifecycle(PublishStatus::ChangeRejected, OnlineStatus::Online);
        let pending = submitted(&start, AuditType::Change, None);
        let withdrawn = resolved(&pending, AuditType::Change, AuditOutcome::Withdrawn, Utc::now());

        assert_eq!(withdrawn.publish_status, PublishStatus::ChangeRejected);
        assert_eq!(withdrawn.online_status, OnlineStatus::Online);
        assert_eq!(withdrawn.audit_state, AuditState::Withdrawn);
    }

    #[test]
    fn test_withdrawn_without_snapshot_falls_back() {
        let mut pending = lifecycle(PublishStatus::Published, OnlineStatus::OfflineAuditing);
        pending.audit_state = AuditState::Auditing;
        let withdrawn = resolved(&pending, AuditType::Offline, AuditOutcome::Withdrawn, Utc::now());
        assert_eq!(withdrawn.online_status, OnlineStatus::Online);
    }

    #[test]
    fn test_every_resolution_leaves_the_auditing_state() {
        for audit_type in AuditType::ALL {
            let start = lifecycle(PublishStatus::Published, OnlineStatus::Online);
            let pending = submitted(&start, audit_type, None);
            for outcome in [AuditOutcome::Pass, AuditOutcome::Reject, AuditOutcome::Withdrawn] {
                let done = resolved(&pending, audit_type, outcome, Utc::now());
                assert_ne!(done.snapshot(), pending.snapshot(), "{audit_type} {outcome:?}");
            }
        }
    }
}
