//! Application layer - Use cases and application services
//!
//! This layer orchestrates domain objects to fulfill use cases.
//! It's responsible for:
//! - Readiness and deadline checks around every operation
//! - Id allocation and referential validation
//! - Converting store failures into annotated domain errors

pub mod sip_service;

pub use sip_service::{SipService, DEFAULT_REQUEST_TIMEOUT};
