//! Dispatch matching
//!
//! Decides which dispatch rule governs an inbound call:
//!
//! 1. pick the trunk the call arrived on: trunks listing the address, or
//!    wildcard trunks when none does, narrowed to those whose pattern accepts
//!    the dialed number; smallest id among equals
//! 2. reject the call if no such trunk accepts the number
//! 3. collect rules scoped to that trunk or to all trunks
//! 4. prefer trunk-scoped rules over wildcard rules, then the smallest id
//!
//! Selection is a pure function over a snapshot of trunks and rules, so a
//! rule or trunk deleted while a match runs only ever produces "no route".

use crate::domain::dispatch_rule::SipDispatchRule;
use crate::domain::shared::{DomainError, Result};
use crate::domain::sip_trunk::SipTrunk;
use crate::domain::store::{EntityStore, Repository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Inbound call as seen by the ingress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundCall {
    /// Source address of the SIP request
    pub trunk_address: String,
    /// Number the caller dialed
    pub called_number: String,
    /// Number of the caller
    #[serde(default)]
    pub caller_number: String,
}

/// Routing decision for an inbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchDecision {
    pub sip_trunk_id: String,
    pub sip_dispatch_rule_id: String,
    pub room_name: String,
    pub participant_identity: String,
    /// `None` when the rule hides the caller number
    pub caller_number: Option<String>,
}

/// Select the trunk a call arrived on.
///
/// Trunks listing the address are the candidates; only when none does are
/// wildcard trunks considered. Among the candidates whose number pattern
/// accepts the dialed number the smallest id wins. Fails with `NotFound` when
/// there is no candidate and `InvalidArgument` when no candidate accepts the
/// number.
pub fn select_trunk<'a>(
    trunks: &'a [SipTrunk],
    address: &str,
    called_number: &str,
) -> Result<&'a SipTrunk> {
    let mut candidates: Vec<&SipTrunk> =
        trunks.iter().filter(|t| t.lists_address(address)).collect();
    if candidates.is_empty() {
        candidates = trunks.iter().filter(|t| t.is_wildcard()).collect();
    }
    if candidates.is_empty() {
        return Err(DomainError::NotFound(format!(
            "no trunk accepts calls from {}",
            address
        )));
    }

    let mut accepting = Vec::with_capacity(candidates.len());
    for trunk in &candidates {
        if trunk.accepts_number(called_number)? {
            accepting.push(*trunk);
        }
    }

    accepting
        .into_iter()
        .min_by(|a, b| a.sip_trunk_id.cmp(&b.sip_trunk_id))
        .ok_or_else(|| {
            let ids: Vec<&str> = candidates.iter().map(|t| t.sip_trunk_id.as_str()).collect();
            DomainError::InvalidArgument(format!(
                "number {} is not accepted by trunks {}",
                called_number,
                ids.join(", ")
            ))
        })
}

/// Select the winning rule for a trunk.
///
/// Trunk-scoped rules beat wildcard rules; among equals the smallest id wins.
pub fn select_rule<'a>(rules: &'a [SipDispatchRule], trunk_id: &str) -> Option<&'a SipDispatchRule> {
    rules
        .iter()
        .filter(|r| r.applies_to(trunk_id))
        .min_by(|a, b| {
            (a.is_wildcard(), &a.sip_dispatch_rule_id).cmp(&(b.is_wildcard(), &b.sip_dispatch_rule_id))
        })
}

/// Full matching algorithm over a snapshot
pub fn select_route(
    trunks: &[SipTrunk],
    rules: &[SipDispatchRule],
    call: &InboundCall,
) -> Result<DispatchDecision> {
    let trunk = select_trunk(trunks, &call.trunk_address, &call.called_number)?;

    let rule = select_rule(rules, &trunk.sip_trunk_id).ok_or_else(|| {
        DomainError::NotFound(format!(
            "no dispatch rule for trunk {}",
            trunk.sip_trunk_id
        ))
    })?;

    let room = rule.assign_room(&call.caller_number)?;

    Ok(DispatchDecision {
        sip_trunk_id: trunk.sip_trunk_id.clone(),
        sip_dispatch_rule_id: rule.sip_dispatch_rule_id.clone(),
        room_name: room.room_name,
        participant_identity: room.participant_identity,
        caller_number: room.caller_number,
    })
}

/// Matches inbound calls against the stored trunks and rules
#[derive(Clone)]
pub struct DispatchMatcher {
    trunks: Repository<SipTrunk>,
    rules: Repository<SipDispatchRule>,
}

impl DispatchMatcher {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            trunks: Repository::new(store.clone()),
            rules: Repository::new(store),
        }
    }

    /// Route one call. Reads the trunks and rules once; holds no lock while
    /// selecting.
    pub async fn match_call(&self, call: &InboundCall) -> Result<DispatchDecision> {
        let trunks = self.trunks.list().await?;
        let rules = self.rules.list().await?;

        match select_route(&trunks, &rules, call) {
            Ok(decision) => {
                debug!(
                    "Call from {} to {} dispatched by {} to room {}",
                    call.trunk_address,
                    call.called_number,
                    decision.sip_dispatch_rule_id,
                    decision.room_name
                );
                Ok(decision)
            }
            Err(e) => {
                warn!(
                    "Call from {} to {} rejected: {}",
                    call.trunk_address, call.called_number, e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dispatch_rule::{CreateSipDispatchRule, DispatchRuleKind};
    use crate::domain::sip_trunk::CreateSipTrunk;

    fn trunk(id: &str, addresses: &[&str], regex: &str) -> SipTrunk {
        SipTrunk::new(
            id.to_string(),
            CreateSipTrunk {
                inbound_addresses: addresses.iter().map(|a| a.to_string()).collect(),
                inbound_numbers_regex: regex.to_string(),
                ..Default::default()
            },
        )
    }

    fn rule(id: &str, trunk_ids: &[&str], room: &str) -> SipDispatchRule {
        SipDispatchRule::new(
            id.to_string(),
            CreateSipDispatchRule {
                rule: DispatchRuleKind::Direct {
                    room_name: room.to_string(),
                },
                trunk_ids: trunk_ids.iter().map(|t| t.to_string()).collect(),
                hide_phone_number: false,
            },
        )
    }

    fn call(address: &str, number: &str) -> InboundCall {
        InboundCall {
            trunk_address: address.to_string(),
            called_number: number.to_string(),
            caller_number: "+15559999".to_string(),
        }
    }

    #[test]
    fn test_scoped_rule_beats_wildcard() {
        let trunks = vec![trunk("trunk_1", &["10.0.0.5"], "")];
        let rules = vec![
            rule("rule_b", &[], "everyone"),
            rule("rule_a", &["trunk_1"], "trunk-one"),
        ];

        let decision = select_route(&trunks, &rules, &call("10.0.0.5", "+15551234")).unwrap();
        assert_eq!(decision.sip_dispatch_rule_id, "rule_a");
        assert_eq!(decision.sip_trunk_id, "trunk_1");
        assert_eq!(decision.room_name, "trunk-one");
    }

    #[test]
    fn test_scoped_rule_wins_even_with_larger_id() {
        let trunks = vec![trunk("trunk_1", &["10.0.0.5"], "")];
        let rules = vec![
            rule("rule_a", &[], "everyone"),
            rule("rule_z", &["trunk_1"], "trunk-one"),
        ];

        let decision = select_route(&trunks, &rules, &call("10.0.0.5", "1")).unwrap();
        assert_eq!(decision.sip_dispatch_rule_id, "rule_z");
    }

    #[test]
    fn test_overlapping_rules_pick_smallest_id() {
        let trunks = vec![trunk("trunk_1", &["10.0.0.5"], "")];
        let rules = vec![
            rule("rule_c", &["trunk_1"], "c"),
            rule("rule_a", &["trunk_2", "trunk_1"], "a"),
            rule("rule_b", &["trunk_1"], "b"),
        ];

        for _ in 0..10 {
            let decision = select_route(&trunks, &rules, &call("10.0.0.5", "1")).unwrap();
            assert_eq!(decision.sip_dispatch_rule_id, "rule_a");
        }

        let mut reversed = rules.clone();
        reversed.reverse();
        let decision = select_route(&trunks, &reversed, &call("10.0.0.5", "1")).unwrap();
        assert_eq!(decision.sip_dispatch_rule_id, "rule_a");
    }

    #[test]
    fn test_unknown_address_without_wildcard_trunk() {
        let trunks = vec![trunk("trunk_1", &["10.0.0.5"], "")];
        let rules = vec![rule("rule_a", &[], "lobby")];

        let err = select_route(&trunks, &rules, &call("10.9.9.9", "1")).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn test_wildcard_trunk_catches_unknown_address() {
        let trunks = vec![
            trunk("trunk_1", &["10.0.0.5"], ""),
            trunk("trunk_any", &[], ""),
        ];
        let rules = vec![rule("rule_a", &["trunk_any"], "anywhere")];

        let decision = select_route(&trunks, &rules, &call("10.9.9.9", "1")).unwrap();
        assert_eq!(decision.sip_trunk_id, "trunk_any");
        assert_eq!(decision.room_name, "anywhere");
    }

    #[test]
    fn test_listed_trunk_beats_wildcard_trunk() {
        let trunks = vec![
            trunk("trunk_a", &[], ""),
            trunk("trunk_b", &["10.0.0.5"], ""),
        ];
        assert_eq!(
            select_trunk(&trunks, "10.0.0.5", "+15551234")
                .unwrap()
                .sip_trunk_id,
            "trunk_b"
        );
    }

    #[test]
    fn test_shared_address_routes_by_number() {
        let trunks = vec![
            trunk("ST_a", &["10.0.0.5"], r"^\+1555"),
            trunk("ST_b", &["10.0.0.5"], r"^\+1666"),
        ];
        let rules = vec![
            rule("SDR_a", &["ST_a"], "five"),
            rule("SDR_b", &["ST_b"], "six"),
        ];

        let decision = select_route(&trunks, &rules, &call("10.0.0.5", "+16661234")).unwrap();
        assert_eq!(decision.sip_trunk_id, "ST_b");
        assert_eq!(decision.sip_dispatch_rule_id, "SDR_b");
        assert_eq!(decision.room_name, "six");

        let decision = select_route(&trunks, &rules, &call("10.0.0.5", "+15551234")).unwrap();
        assert_eq!(decision.sip_trunk_id, "ST_a");
        assert_eq!(decision.sip_dispatch_rule_id, "SDR_a");

        let err = select_route(&trunks, &rules, &call("10.0.0.5", "+4420")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn test_shared_address_overlapping_patterns_pick_smallest_id() {
        let trunks = vec![
            trunk("ST_b", &["10.0.0.5"], r"^\+1"),
            trunk("ST_a", &["10.0.0.5"], r"^\+1555"),
            trunk("ST_c", &["10.0.0.5"], ""),
        ];

        let chosen = select_trunk(&trunks, "10.0.0.5", "+15551234").unwrap();
        assert_eq!(chosen.sip_trunk_id, "ST_a");

        let chosen = select_trunk(&trunks, "10.0.0.5", "+4420").unwrap();
        assert_eq!(chosen.sip_trunk_id, "ST_c");
    }

    #[test]
    fn test_listed_trunk_rejecting_number_does_not_fall_back_to_wildcard() {
        let trunks = vec![
            trunk("trunk_a", &[], ""),
            trunk("trunk_b", &["10.0.0.5"], r"^\+1555"),
        ];

        let err = select_trunk(&trunks, "10.0.0.5", "+4420").unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn test_anonymous_caller_rejected_by_individual_rule() {
        let trunks = vec![trunk("trunk_1", &["10.0.0.5"], "")];
        let rules = vec![SipDispatchRule::new(
            "rule_a".to_string(),
            CreateSipDispatchRule {
                rule: DispatchRuleKind::Individual {
                    room_prefix: "call-".to_string(),
                },
                trunk_ids: vec![],
                hide_phone_number: false,
            },
        )];
        let anonymous = InboundCall {
            caller_number: String::new(),
            ..call("10.0.0.5", "+15551234")
        };

        let err = select_route(&trunks, &rules, &anonymous).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn test_number_rejected_by_pattern() {
        let trunks = vec![trunk("trunk_1", &["10.0.0.5"], r"^\+1555")];
        let rules = vec![rule("rule_a", &[], "lobby")];

        let err = select_route(&trunks, &rules, &call("10.0.0.5", "+4420")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        assert!(select_route(&trunks, &rules, &call("10.0.0.5", "+15551234")).is_ok());
    }

    #[test]
    fn test_no_applicable_rule() {
        let trunks = vec![
            trunk("trunk_1", &["10.0.0.5"], ""),
            trunk("trunk_2", &["10.0.0.6"], ""),
        ];
        let rules = vec![rule("rule_a", &["trunk_2"], "two")];

        let err = select_route(&trunks, &rules, &call("10.0.0.5", "1")).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn test_stale_trunk_reference_is_ignored() {
        let trunks = vec![trunk("trunk_1", &["10.0.0.5"], "")];
        let rules = vec![
            rule("rule_a", &["trunk_deleted"], "gone"),
            rule("rule_b", &[], "lobby"),
        ];

        let decision = select_route(&trunks, &rules, &call("10.0.0.5", "1")).unwrap();
        assert_eq!(decision.sip_dispatch_rule_id, "rule_b");
    }
}
