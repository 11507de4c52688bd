//! Shared building blocks for the hosting control plane.
//!
//! This crate provides:
//! - Validation of user supplied identifiers (application names, hostnames, ports, ...)
//! - Credential generation for provisioned tenant databases
//! - The event protocol spoken with the external CI/CD dispatch target
#![expect(
    clippy::missing_errors_doc,
    reason = "The situation it maps to errors should be obvious."
)]

extern crate alloc;

mod protocol;
mod secrets;
mod validation;

pub use protocol::*;
pub use secrets::*;
pub use validation::*;
