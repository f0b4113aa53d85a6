//! Core types for the calhook service.
//!
//! This crate is the pure half of the system, shared by the server binary
//! and the provider client:
//! - `webhook` for the two inbound payload shapes
//! - `descriptor` for the canonical event view
//! - `recurrence` for occurrence-anchor resolution
//! - `payload` for candidate update bodies
//! - `config` for the service configuration
//!
//! Nothing in here performs IO beyond reading the config file.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod payload;
pub mod recurrence;
pub mod webhook;

// Re-export the main types at crate root for convenience
pub use config::{AppConfig, LinkAssignment, LinkTable};
pub use descriptor::{EventDescriptor, INSTANCE_MARKER, normalize};
pub use error::{CalHookError, CalHookResult, NormalizeError};
pub use payload::{PayloadShape, UpdatePayload, build_payload};
pub use recurrence::resolve_instance_anchor;
pub use webhook::{EventFragment, Trigger, WebhookItem, WebhookPayload};
