//! SIP registry - trunks, dispatch rules and participants for bridging
//! phone calls into rooms
//!
//! Layered like a Domain-Driven Design service: the domain holds entities,
//! the dispatch matcher and storage ports; the application layer is the
//! registry service; infrastructure provides entity stores; the interface
//! layer exposes everything over HTTP.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use application::SipService;
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
