#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static catalog plugin.
//!
//! Config-seeded, in-memory implementations of the policy engine's
//! collaborator ports:
//!
//! - [`Service`] implements `PrincipalDirectory` and `PolicyStore`
//! - [`TracingAuditSink`] / [`RecordingAuditSink`] implement `AuditSink`
//!
//! Intended for standalone deployments, demos and black-box tests; real
//! hosts back the ports with their own catalog and persistence.

pub mod audit;
pub mod config;
pub mod domain;

pub use audit::{RecordingAuditSink, TracingAuditSink};
pub use config::StaticCatalogConfig;
pub use domain::Service;
