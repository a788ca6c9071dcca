//! URL handling for the frontier
//!
//! Every URL that enters the frontier goes through [`normalize`], and every
//! host key is derived with [`host_key`], so that dedup and host scheduling
//! agree on one canonical form.

mod host;
mod normalize;

pub use host::{canonical_host, host_key};
pub use normalize::normalize;
