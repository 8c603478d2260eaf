//! Tollgate Orchestrator
//!
//! Build admission for freshly created pipelines. For every build the
//! engine decides whether any runner of the current fleet could run it and,
//! if none could, drops the build with a reason the owner can act on.
//!
//! Architecture:
//! - Configuration: admission tunables from environment or defaults
//! - Repositories: traits for the runner source, build source and drop recorder
//! - Services: quota policies, the matching engine and the admission pass

pub mod config;
pub mod repository;
pub mod service;
pub mod telemetry;

pub use config::{AdmissionConfig, QuotaPolicyKind};
pub use service::{AdmissionError, AdmissionReport, AdmissionService};
