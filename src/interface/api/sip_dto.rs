//! SIP API DTOs (Data Transfer Objects)

use crate::domain::{
    CreateSipDispatchRule, CreateSipParticipant, CreateSipTrunk, DispatchDecision,
    DispatchRuleKind, InboundCall, SipDispatchRule, SipParticipant, SipTrunk,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generic API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Machine-readable error kind
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn error(code: &str, message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            code: Some(code.to_string()),
        }
    }
}

/// List response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn from_items<S: Into<T>>(items: Vec<S>) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

// ---- Trunks ----

/// Create trunk request
#[derive(Debug, Deserialize)]
pub struct CreateTrunkRequest {
    #[serde(default)]
    pub inbound_addresses: Vec<String>,
    #[serde(default)]
    pub outbound_address: String,
    #[serde(default)]
    pub outbound_number: String,
    #[serde(default)]
    pub inbound_numbers_regex: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Trunk response. Never carries the password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrunkResponse {
    pub sip_trunk_id: String,
    pub inbound_addresses: Vec<String>,
    pub outbound_address: String,
    pub outbound_number: String,
    pub inbound_numbers_regex: String,
    pub username: String,
}

impl From<CreateTrunkRequest> for CreateSipTrunk {
    fn from(req: CreateTrunkRequest) -> Self {
        Self {
            inbound_addresses: req.inbound_addresses,
            outbound_address: req.outbound_address,
            outbound_number: req.outbound_number,
            inbound_numbers_regex: req.inbound_numbers_regex,
            username: req.username,
            password: req.password,
        }
    }
}

impl From<SipTrunk> for TrunkResponse {
    fn from(trunk: SipTrunk) -> Self {
        Self {
            sip_trunk_id: trunk.sip_trunk_id,
            inbound_addresses: trunk.inbound_addresses,
            outbound_address: trunk.outbound_address,
            outbound_number: trunk.outbound_number,
            inbound_numbers_regex: trunk.inbound_numbers_regex,
            username: trunk.username,
        }
    }
}

// ---- Dispatch rules ----

/// Create dispatch rule request
#[derive(Debug, Deserialize)]
pub struct CreateDispatchRuleRequest {
    pub rule: DispatchRuleKind,
    #[serde(default)]
    pub trunk_ids: Vec<String>,
    #[serde(default)]
    pub hide_phone_number: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRuleResponse {
    pub sip_dispatch_rule_id: String,
    pub rule: DispatchRuleKind,
    pub trunk_ids: Vec<String>,
    pub hide_phone_number: bool,
}

impl From<CreateDispatchRuleRequest> for CreateSipDispatchRule {
    fn from(req: CreateDispatchRuleRequest) -> Self {
        Self {
            rule: req.rule,
            trunk_ids: req.trunk_ids,
            hide_phone_number: req.hide_phone_number,
        }
    }
}

impl From<SipDispatchRule> for DispatchRuleResponse {
    fn from(rule: SipDispatchRule) -> Self {
        Self {
            sip_dispatch_rule_id: rule.sip_dispatch_rule_id,
            rule: rule.rule,
            trunk_ids: rule.trunk_ids,
            hide_phone_number: rule.hide_phone_number,
        }
    }
}

// ---- Participants ----

/// Create participant request
#[derive(Debug, Deserialize)]
pub struct CreateParticipantRequest {
    pub sip_trunk_id: String,
    pub sip_call_to: String,
    pub room_name: String,
    pub participant_identity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub sip_participant_id: String,
    pub sip_call_id: String,
    pub sip_trunk_id: String,
    pub sip_call_to: String,
    pub room_name: String,
    pub participant_identity: String,
    pub created_at: DateTime<Utc>,
}

impl From<CreateParticipantRequest> for CreateSipParticipant {
    fn from(req: CreateParticipantRequest) -> Self {
        Self {
            sip_trunk_id: req.sip_trunk_id,
            sip_call_to: req.sip_call_to,
            room_name: req.room_name,
            participant_identity: req.participant_identity,
        }
    }
}

impl From<SipParticipant> for ParticipantResponse {
    fn from(p: SipParticipant) -> Self {
        Self {
            sip_participant_id: p.sip_participant_id,
            sip_call_id: p.sip_call_id,
            sip_trunk_id: p.sip_trunk_id,
            sip_call_to: p.sip_call_to,
            room_name: p.room_name,
            participant_identity: p.participant_identity,
            created_at: p.created_at,
        }
    }
}

/// Send DTMF request
#[derive(Debug, Deserialize)]
pub struct DtmfRequest {
    pub digits: String,
}

// ---- Dispatch ----

/// Inbound call to route
#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub trunk_address: String,
    pub called_number: String,
    #[serde(default)]
    pub caller_number: String,
}

impl From<DispatchRequest> for InboundCall {
    fn from(req: DispatchRequest) -> Self {
        Self {
            trunk_address: req.trunk_address,
            called_number: req.called_number,
            caller_number: req.caller_number,
        }
    }
}

pub type DispatchResponse = DispatchDecision;

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
}
