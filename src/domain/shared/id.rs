//! Identifier allocation

use rand::Rng;

/// Prefix of SIP trunk ids
pub const SIP_TRUNK_PREFIX: &str = "ST_";
/// Prefix of SIP dispatch rule ids
pub const SIP_DISPATCH_RULE_PREFIX: &str = "SDR_";
/// Prefix of SIP participant ids
pub const SIP_PARTICIPANT_PREFIX: &str = "SP_";
/// Prefix of SIP call-session ids
pub const SIP_CALL_PREFIX: &str = "SCL_";

/// Symbols used for random suffixes. Look-alikes (0/O, 1/l/I) are left out.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of the random part of an id (57^12 ≈ 2^70 possibilities)
const SUFFIX_LEN: usize = 12;

/// Produces globally unique, kind-prefixed identifiers.
///
/// Kept apart from storage so it can be swapped out in tests.
#[cfg_attr(test, mockall::automock)]
pub trait IdAllocator: Send + Sync {
    /// Allocate a new id starting with `prefix`
    fn allocate(&self, prefix: &str) -> String;
}

/// Allocator drawing suffixes from the thread-local CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdAllocator;

impl RandomIdAllocator {
    pub fn new() -> Self {
        Self
    }
}

impl IdAllocator for RandomIdAllocator {
    fn allocate(&self, prefix: &str) -> String {
        let mut rng = rand::thread_rng();
        let mut id = String::with_capacity(prefix.len() + SUFFIX_LEN);
        id.push_str(prefix);
        for _ in 0..SUFFIX_LEN {
            let idx = rng.gen_range(0..ALPHABET.len());
            id.push(ALPHABET[idx] as char);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocate_has_prefix_and_length() {
        let ids = RandomIdAllocator::new();
        let id = ids.allocate(SIP_TRUNK_PREFIX);

        assert!(id.starts_with("ST_"));
        assert_eq!(id.len(), SIP_TRUNK_PREFIX.len() + SUFFIX_LEN);
        assert!(id[3..].bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_allocate_is_unique() {
        let ids = RandomIdAllocator::new();
        let generated: HashSet<String> = (0..10_000)
            .map(|_| ids.allocate(SIP_DISPATCH_RULE_PREFIX))
            .collect();
        assert_eq!(generated.len(), 10_000);
    }
}
