//! Scaleway provider for a declarative provisioning engine
//!
//! - [`scw`] - credentials, HTTP client, localities and waiters
//! - [`api`] - typed bindings for the products the provider manages
//! - [`schema`] - declarative resource schemas and validation
//! - [`provider`] - resource trait, per-call data and the type registry
//! - [`resources`] - one module per resource type
//! - [`sweep`] - cleanup of resources leaked by acceptance runs
//! - [`config`] - Scaleway config file and environment

pub mod api;
pub mod config;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod scw;
pub mod sweep;

/// Version reported in the user agent and by `--version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
