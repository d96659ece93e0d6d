//! SIP participants: call legs bridged into a room

use crate::domain::shared::{DomainError, Result};
use crate::domain::store::{Entity, EntityKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An active SIP call leg. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipParticipant {
    pub sip_participant_id: String,
    /// Call session assigned when the leg was bridged
    pub sip_call_id: String,
    pub sip_trunk_id: String,
    pub sip_call_to: String,
    pub room_name: String,
    pub participant_identity: String,
    pub created_at: DateTime<Utc>,
}

/// Request to bridge an outbound call into a room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateSipParticipant {
    pub sip_trunk_id: String,
    pub sip_call_to: String,
    pub room_name: String,
    /// Defaults to `sip_<sip_call_to>`
    pub participant_identity: Option<String>,
}

impl CreateSipParticipant {
    pub fn validate(&self) -> Result<()> {
        if self.sip_trunk_id.is_empty() {
            return Err(DomainError::InvalidArgument(
                "sip trunk id is required".to_string(),
            ));
        }
        if self.sip_call_to.is_empty() {
            return Err(DomainError::InvalidArgument(
                "number to call is required".to_string(),
            ));
        }
        if self.room_name.is_empty() {
            return Err(DomainError::InvalidArgument(
                "room name is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl SipParticipant {
    pub fn new(sip_participant_id: String, sip_call_id: String, req: CreateSipParticipant) -> Self {
        let participant_identity = req
            .participant_identity
            .filter(|identity| !identity.is_empty())
            .unwrap_or_else(|| format!("sip_{}", req.sip_call_to));

        Self {
            sip_participant_id,
            sip_call_id,
            sip_trunk_id: req.sip_trunk_id,
            sip_call_to: req.sip_call_to,
            room_name: req.room_name,
            participant_identity,
            created_at: Utc::now(),
        }
    }
}

impl Entity for SipParticipant {
    const KIND: EntityKind = EntityKind::SipParticipant;

    fn id(&self) -> &str {
        &self.sip_participant_id
    }
}

/// DTMF digits validated for sending on a call leg.
///
/// Accepts `0-9`, `*`, `#`, `A-D` and `w` (half-second pause).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtmfDigits(String);

impl DtmfDigits {
    pub fn parse(digits: &str) -> Result<Self> {
        if digits.is_empty() {
            return Err(DomainError::InvalidArgument(
                "dtmf digits must not be empty".to_string(),
            ));
        }
        if let Some(bad) = digits
            .chars()
            .find(|c| !matches!(c, '0'..='9' | '*' | '#' | 'A'..='D' | 'w'))
        {
            return Err(DomainError::InvalidArgument(format!(
                "invalid dtmf digit {:?}",
                bad
            )));
        }
        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of a DTMF send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtmfResult {
    pub sip_participant_id: String,
    pub digits: String,
}

/// Side channel to live call legs.
///
/// Nothing here touches the stored participant record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallControl: Send + Sync {
    async fn send_dtmf(&self, participant: &SipParticipant, digits: &DtmfDigits)
        -> Result<DtmfResult>;
}
