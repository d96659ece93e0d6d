/// SIP Trunk configuration
use crate::domain::shared::{DomainError, Result};
use crate::domain::store::{Entity, EntityKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Compiled number patterns of stored trunks, keyed by pattern text
static NUMBER_PATTERNS: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

/// Cached patterns are dropped wholesale past this many entries
const NUMBER_PATTERN_CACHE_LIMIT: usize = 1024;

/// SIP trunk: a carrier link calls arrive on and leave through.
///
/// Address and number fields are carrier supplied and stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipTrunk {
    pub sip_trunk_id: String,

    /// Addresses allowed to send inbound calls. Empty accepts any address.
    pub inbound_addresses: Vec<String>,

    // Outbound destination
    pub outbound_address: String,
    pub outbound_number: String,

    /// Pattern dialed numbers must match. Empty accepts any number.
    pub inbound_numbers_regex: String,

    // Carrier authentication
    pub username: String,
    pub password: String,
}

/// Caller supplied fields of a new trunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateSipTrunk {
    pub inbound_addresses: Vec<String>,
    pub outbound_address: String,
    pub outbound_number: String,
    pub inbound_numbers_regex: String,
    pub username: String,
    pub password: String,
}

impl CreateSipTrunk {
    /// Reject fields that could never match a call
    pub fn validate(&self) -> Result<()> {
        if self.inbound_addresses.iter().any(|a| a.is_empty()) {
            return Err(DomainError::InvalidArgument(
                "inbound address must not be empty".to_string(),
            ));
        }
        compile_number_pattern(&self.inbound_numbers_regex)?;
        Ok(())
    }
}

impl SipTrunk {
    /// Build a trunk from a request and an allocated id
    pub fn new(sip_trunk_id: String, req: CreateSipTrunk) -> Self {
        Self {
            sip_trunk_id,
            inbound_addresses: req.inbound_addresses,
            outbound_address: req.outbound_address,
            outbound_number: req.outbound_number,
            inbound_numbers_regex: req.inbound_numbers_regex,
            username: req.username,
            password: req.password,
        }
    }

    /// A trunk without inbound addresses accepts calls from anywhere
    pub fn is_wildcard(&self) -> bool {
        self.inbound_addresses.is_empty()
    }

    /// Check if the address is explicitly listed on this trunk
    pub fn lists_address(&self, address: &str) -> bool {
        self.inbound_addresses.iter().any(|a| a == address)
    }

    /// Check the dialed number against the trunk's pattern.
    ///
    /// The pattern is unanchored; use `^...$` to match the whole number.
    pub fn accepts_number(&self, number: &str) -> Result<bool> {
        let pattern = &self.inbound_numbers_regex;
        if pattern.is_empty() {
            return Ok(true);
        }

        let cache = NUMBER_PATTERNS.get_or_init(Default::default);
        if let Ok(patterns) = cache.read() {
            if let Some(re) = patterns.get(pattern) {
                return Ok(re.is_match(number));
            }
        }

        let Some(re) = compile_number_pattern(pattern)? else {
            return Ok(true);
        };
        let matched = re.is_match(number);
        if let Ok(mut patterns) = cache.write() {
            if patterns.len() >= NUMBER_PATTERN_CACHE_LIMIT {
                patterns.clear();
            }
            patterns.insert(pattern.clone(), re);
        }
        Ok(matched)
    }
}

impl Entity for SipTrunk {
    const KIND: EntityKind = EntityKind::SipTrunk;

    fn id(&self) -> &str {
        &self.sip_trunk_id
    }
}

fn compile_number_pattern(pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern).map(Some).map_err(|e| {
        DomainError::InvalidArgument(format!("inbound numbers regex {:?}: {}", pattern, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trunk(addresses: &[&str], regex: &str) -> SipTrunk {
        SipTrunk::new(
            "ST_test".to_string(),
            CreateSipTrunk {
                inbound_addresses: addresses.iter().map(|a| a.to_string()).collect(),
                inbound_numbers_regex: regex.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_fields_kept_verbatim() {
        let trunk = SipTrunk::new(
            "ST_abc".to_string(),
            CreateSipTrunk {
                inbound_addresses: vec![" 10.0.0.5 ".to_string()],
                outbound_address: "sip.carrier.example:5061".to_string(),
                outbound_number: "+1 (555) 000".to_string(),
                inbound_numbers_regex: String::new(),
                username: "user".to_string(),
                password: "secret".to_string(),
            },
        );

        assert_eq!(trunk.sip_trunk_id, "ST_abc");
        assert_eq!(trunk.inbound_addresses, vec![" 10.0.0.5 "]);
        assert_eq!(trunk.outbound_number, "+1 (555) 000");
        assert_eq!(trunk.password, "secret");
    }

    #[test]
    fn test_address_matching() {
        let listed = trunk(&["10.0.0.5", "10.0.0.6"], "");
        assert!(listed.lists_address("10.0.0.6"));
        assert!(!listed.lists_address("10.0.0.7"));
        assert!(!listed.is_wildcard());

        let any = trunk(&[], "");
        assert!(any.is_wildcard());
        assert!(!any.lists_address("10.0.0.5"));
    }

    #[test]
    fn test_empty_pattern_matches_any_number() {
        let trunk = trunk(&["10.0.0.5"], "");
        assert!(trunk.accepts_number("+15551234").unwrap());
        assert!(trunk.accepts_number("").unwrap());
    }

    #[test]
    fn test_number_pattern() {
        let trunk = trunk(&["10.0.0.5"], r"^\+1555\d{4}$");
        assert!(trunk.accepts_number("+15551234").unwrap());
        assert!(!trunk.accepts_number("+15551234999").unwrap());
        assert!(!trunk.accepts_number("+4420").unwrap());
    }

    #[test]
    fn test_pattern_compiled_once() {
        let pattern = r"^\+4930\d+$";
        let trunk = trunk(&["10.0.0.5"], pattern);

        assert!(trunk.accepts_number("+49301234").unwrap());
        let cached = NUMBER_PATTERNS
            .get()
            .and_then(|cache| cache.read().ok().map(|p| p.contains_key(pattern)));
        assert_eq!(cached, Some(true));

        assert!(!trunk.accepts_number("+4940").unwrap());
        assert!(trunk.accepts_number("+49309").unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let req = CreateSipTrunk {
            inbound_numbers_regex: "+[".to_string(),
            ..Default::default()
        };
        assert!(matches!(req.validate(), Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn test_validate_rejects_empty_address() {
        let req = CreateSipTrunk {
            inbound_addresses: vec!["10.0.0.5".to_string(), String::new()],
            ..Default::default()
        };
        assert!(matches!(req.validate(), Err(DomainError::InvalidArgument(_))));
    }
}
