//! Calendar provider REST client for calhook.
//!
//! This crate owns everything that talks to the provider: the
//! authenticated HTTP client, failure classification, and the
//! shape-fallback executor that retries an update with progressively
//! smaller payloads.

pub mod client;
pub mod executor;

// Re-export the main types at crate root for convenience
pub use client::{ApiFailure, FailureKind, ProviderClient};
pub use executor::{
    ChainStep, UpdateError, UpdateOutcome, execute_update, recurring_chain, single_chain,
};
