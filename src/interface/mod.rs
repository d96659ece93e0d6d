//! Interface layer - External interfaces
//!
//! This layer handles:
//! - REST API endpoints over the registry service
//! - Error kind to HTTP status mapping
//! - Request/response formatting

pub mod api;
