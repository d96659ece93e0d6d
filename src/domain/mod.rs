//! Domain layer - Core registry rules
//!
//! This layer contains:
//! - Entities: trunks, dispatch rules, participants
//! - The dispatch matcher
//! - Repository and collaborator ports (store, id allocation, call control)

pub mod dispatch;
pub mod dispatch_rule;
pub mod participant;
pub mod shared;
pub mod sip_trunk;
pub mod store;

// Re-export commonly used types
pub use dispatch::{DispatchDecision, DispatchMatcher, InboundCall};
pub use dispatch_rule::{CreateSipDispatchRule, DispatchRuleKind, SipDispatchRule};
pub use participant::{CallControl, CreateSipParticipant, DtmfDigits, DtmfResult, SipParticipant};
pub use shared::{DomainError, Result};
pub use sip_trunk::{CreateSipTrunk, SipTrunk};
pub use store::{Entity, EntityKind, EntityStore, Repository};
