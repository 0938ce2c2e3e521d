//! Scaleway API interaction module
//!
//! This module provides the core functionality for talking to the Scaleway
//! REST API: credentials, HTTP client, localities and polling helpers.
//!
//! # Module Structure
//!
//! - [`auth`] - Credentials read from the environment or the config file
//! - [`client`] - Main Scaleway client (URL builders, pagination)
//! - [`error`] - Error type and HTTP 404 classification
//! - [`http`] - HTTP utilities for REST API calls
//! - [`locality`] - Zones, regions and composite `locality/uuid` identifiers
//! - [`wait`] - Polling until a resource reaches a terminal status
//!
//! # Example
//!
//! ```ignore
//! use scw_provider::scw::{auth::Credentials, client::ScwClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ScwClient::new(Credentials::from_env())?;
//!     let zone = client.default_zone().unwrap();
//!     let lbs: serde_json::Value = client.get(&client.zoned_url("lb", "v1", &zone, "lbs")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod locality;
pub mod wait;

pub use auth::Credentials;
pub use client::ScwClient;
pub use error::{is_not_found, ScwError};
pub use locality::{Region, RegionalId, Zone, ZonedId};
pub use wait::WaitOptions;
