//! API interface implementations

pub mod metrics_handler;
pub mod router;
pub mod sip_dto;
pub mod sip_handler;

pub use metrics_handler::init_metrics;
pub use router::build_router;
pub use sip_handler::{ApiError, AppState};
