/// SIP dispatch rules: which inbound calls go to which room
use crate::domain::shared::{DomainError, Result};
use crate::domain::store::{Entity, EntityKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Routing directive of a dispatch rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchRuleKind {
    /// Every matching call joins the same room
    Direct { room_name: String },
    /// Each caller gets a room of its own, named `<room_prefix><caller>`
    Individual { room_prefix: String },
}

/// Dispatch rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipDispatchRule {
    pub sip_dispatch_rule_id: String,
    pub rule: DispatchRuleKind,

    /// Trunks the rule applies to. Empty applies to every trunk.
    pub trunk_ids: Vec<String>,

    /// Redact the caller number from everything the rule produces
    pub hide_phone_number: bool,
}

/// Caller supplied fields of a new dispatch rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSipDispatchRule {
    pub rule: DispatchRuleKind,
    #[serde(default)]
    pub trunk_ids: Vec<String>,
    #[serde(default)]
    pub hide_phone_number: bool,
}

impl CreateSipDispatchRule {
    /// Shape checks that need no store access
    pub fn validate(&self) -> Result<()> {
        if let DispatchRuleKind::Direct { room_name } = &self.rule {
            if room_name.is_empty() {
                return Err(DomainError::InvalidArgument(
                    "direct dispatch rule requires a room name".to_string(),
                ));
            }
        }
        if self.trunk_ids.iter().any(|id| id.is_empty()) {
            return Err(DomainError::InvalidArgument(
                "trunk id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a call ends up once a rule is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAssignment {
    pub room_name: String,
    pub participant_identity: String,
    /// `None` when the rule hides the caller number
    pub caller_number: Option<String>,
}

impl SipDispatchRule {
    pub fn new(sip_dispatch_rule_id: String, req: CreateSipDispatchRule) -> Self {
        let mut trunk_ids: Vec<String> = Vec::with_capacity(req.trunk_ids.len());
        for id in req.trunk_ids {
            if !trunk_ids.contains(&id) {
                trunk_ids.push(id);
            }
        }

        Self {
            sip_dispatch_rule_id,
            rule: req.rule,
            trunk_ids,
            hide_phone_number: req.hide_phone_number,
        }
    }

    /// A rule without trunk ids applies to all trunks
    pub fn is_wildcard(&self) -> bool {
        self.trunk_ids.is_empty()
    }

    /// Check if the rule covers calls arriving on the trunk
    pub fn applies_to(&self, trunk_id: &str) -> bool {
        self.is_wildcard() || self.trunk_ids.iter().any(|id| id == trunk_id)
    }

    pub fn references(&self, trunk_id: &str) -> bool {
        self.trunk_ids.iter().any(|id| id == trunk_id)
    }

    /// Resolve the room for a caller.
    ///
    /// Individual rooms are keyed by the caller, so an anonymous caller is
    /// rejected rather than parked in a room shared by every such call.
    pub fn assign_room(&self, caller_number: &str) -> Result<RoomAssignment> {
        if caller_number.is_empty() {
            if let DispatchRuleKind::Individual { .. } = &self.rule {
                return Err(DomainError::InvalidArgument(format!(
                    "dispatch rule {} gives each caller a room and needs a caller number",
                    self.sip_dispatch_rule_id
                )));
            }
        }

        let caller = if self.hide_phone_number {
            redact_number(caller_number)
        } else {
            caller_number.to_string()
        };

        let room_name = match &self.rule {
            DispatchRuleKind::Direct { room_name } => room_name.clone(),
            DispatchRuleKind::Individual { room_prefix } => format!("{}{}", room_prefix, caller),
        };

        Ok(RoomAssignment {
            room_name,
            participant_identity: format!("sip_{}", caller),
            caller_number: (!self.hide_phone_number).then(|| caller_number.to_string()),
        })
    }
}

impl Entity for SipDispatchRule {
    const KIND: EntityKind = EntityKind::SipDispatchRule;

    fn id(&self) -> &str {
        &self.sip_dispatch_rule_id
    }
}

/// Stable stand-in for a hidden number: the same caller always gets the same
/// room, but the number cannot be read back from it.
fn redact_number(number: &str) -> String {
    let digest = Sha256::digest(number.as_bytes());
    hex::encode(&digest[..8])
}
