//! Data resource catalog lifecycle engine.
//!
//! Governs how a catalog moves between draft, published and online states
//! while an external workflow approves each transition, and keeps the search
//! projection eventually consistent with the stored record.
//!
//! Components, leaves first:
//! - [`store`]: transactional persistence (`CatalogStore`)
//! - [`verifier`]: mount resource validation
//! - [`draft`]: create / in-place save / draft-copy routing
//! - [`audit`]: guard, submission and callback handling
//! - [`search`]: search document projection
//!
//! [`engine::CatalogEngine`] wires them together; [`consumer`] drives the
//! asynchronous callback channels.

pub mod application_id;
pub mod audit;
pub mod config;
pub mod consumer;
pub mod draft;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod remote;
pub mod search;
pub mod services;
pub mod store;
pub mod types;
pub mod verifier;

pub use application_id::ApplicationId;
pub use audit::{AuditResult, CallbackOutcome, IgnoreReason, SubmitOutcome};
pub use config::{AuditProcessIndex, EngineConfig};
pub use consumer::{Delivery, MessageConsumer, MessageHandler};
pub use draft::{ColumnInput, SaveKind, SaveOutcome, SaveRequest};
pub use engine::{AuditResultHandler, CatalogEngine, ResourceEvent, ResourceEventHandler};
pub use error::{CatalogError, CatalogResult, ErrorKind};
pub use lookup::LookupTables;
pub use search::{CatalogDocument, SweepReport};
pub use services::Services;
pub use store::{CatalogStore, MemoryCatalogStore};
#[cfg(feature = "database")]
pub use store::PgCatalogStore;
pub use verifier::MountRequest;
