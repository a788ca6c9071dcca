//! Host state shared between workers and the frontier store
//!
//! # Components
//!
//! - `HostStatus`: the claim lifecycle of a host (new, claimed, active, completed, abandoned)
//! - `HostPolicy`: robots rules, crawl delay and page cap for one host

mod host_policy;
mod host_status;

// Re-export main types
pub use host_policy::{HostPolicy, PolicyDefaults, POLICY_VERSION};
pub use host_status::HostStatus;
