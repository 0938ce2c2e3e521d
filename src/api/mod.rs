//! Typed bindings for the Scaleway products used by the provider
//!
//! Each product exposes a small `XxxApi` wrapper borrowing a
//! [`ScwClient`](crate::scw::ScwClient), with request/response structs
//! mirroring the REST documents and waiters for transient statuses.

pub mod account;
pub mod baremetal;
pub mod cockpit;
pub mod lb;
pub mod vpc;

pub use account::AccountApi;
pub use baremetal::BaremetalApi;
pub use cockpit::CockpitApi;
pub use lb::LbApi;
pub use vpc::VpcApi;
