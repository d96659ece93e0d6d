//! Shared kernel - Common types used across the registry

pub mod error;
pub mod id;
pub mod result;

pub use error::DomainError;
pub use id::{IdAllocator, RandomIdAllocator};
pub use result::Result;
