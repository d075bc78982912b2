//! Audit lifecycle: transition guard, status arithmetic and the
//! orchestrator that drives submissions and callbacks.

pub mod guard;
pub mod orchestrator;
pub mod transition;

pub use guard::{check_allowed, is_allowed};
pub use orchestrator::{
    AuditOrchestrator, AuditResult, CallbackOutcome, IgnoreReason, SubmitOutcome,
};
