//! Policy Engine Module
//!
//! The decision and what-if simulation core of the authorization platform:
//! context assembly, subject attribute resolution, contextual risk scoring,
//! event-invalidated policy retrieval, rule translation, policy decision
//! evaluation, membership simulation and the wizard session store.
//!
//! The host wires [`domain::Service`] with its collaborator ports
//! (catalog, policy store, condition evaluator, audit sink) and consumes it
//! through `policy_engine_sdk::PolicyEngineClient` via
//! [`domain::PolicyEngineLocalClient`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

pub use config::PolicyEngineConfig;
pub use domain::{PolicyEngineLocalClient, Service};
