use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Hash a node address or file key onto the ring: the top 8 bytes of its
/// SHA-256 digest, big-endian, as an unsigned 64-bit integer. Addresses and
/// file keys must go through the same function or routing breaks.
pub fn hash_key(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// The routing key for an artifact. The slash separator is significant: a
/// different separator hashes differently and strands existing objects.
pub fn file_key(video_id: &str, filename: &str) -> String {
    format!("{}/{}", video_id, filename)
}

#[derive(Debug, PartialEq, Eq)]
pub enum RingError {
    AlreadyMember(String),
    /// Two addresses share a 64-bit ring hash. Effectively impossible by
    /// accident, but the address-to-hash bijection must hold.
    HashCollision { address: String, existing: String },
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingError::AlreadyMember(addr) => write!(f, "node already in the ring: {}", addr),
            RingError::HashCollision { address, existing } => write!(
                f,
                "ring hash collision between {} and {}",
                address, existing
            ),
        }
    }
}

impl std::error::Error for RingError {}

/// Consistent-hash ring mapping keys to node addresses by clockwise
/// successor: the smallest ring hash greater than or equal to the key hash,
/// wrapping to the smallest hash overall.
///
/// The map keeps positions strictly increasing and unique; mutation happens
/// only under the owning router's exclusive lock.
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    ring: BTreeMap<u64, String>,
}

impl HashRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.ring.get(&hash_key(address)).map(String::as_str) == Some(address)
    }

    pub fn insert(&mut self, address: &str) -> Result<(), RingError> {
        let position = hash_key(address);
        match self.ring.get(&position) {
            Some(existing) if existing == address => {
                Err(RingError::AlreadyMember(address.to_string()))
            }
            Some(existing) => Err(RingError::HashCollision {
                address: address.to_string(),
                existing: existing.clone(),
            }),
            None => {
                self.ring.insert(position, address.to_string());
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, address: &str) -> bool {
        let position = hash_key(address);
        if self.contains(address) {
            self.ring.remove(&position);
            true
        } else {
            false
        }
    }

    /// The node responsible for `key` under the current membership, or
    /// `None` when the ring is empty. A key hashing exactly onto a node's
    /// position belongs to that node.
    pub fn owner(&self, key: &str) -> Option<&str> {
        let hash = hash_key(key);
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, address)| address.as_str())
    }

    /// The node that would own `key` if `excluded` were not a member. Used
    /// during membership changes to answer "where did this key live before
    /// the new node was added?" without copying the ring.
    pub fn owner_excluding(&self, key: &str, excluded: &str) -> Option<&str> {
        let hash = hash_key(key);
        self.ring
            .range(hash..)
            .find(|(_, address)| address.as_str() != excluded)
            .or_else(|| {
                self.ring
                    .iter()
                    .find(|(_, address)| address.as_str() != excluded)
            })
            .map(|(_, address)| address.as_str())
    }

    /// Current members, sorted lexicographically for deterministic output.
    pub fn addresses(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self.ring.values().cloned().collect();
        addrs.sort();
        addrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_of(addrs: &[&str]) -> HashRing {
        let mut ring = HashRing::new();
        for addr in addrs {
            ring.insert(addr).unwrap();
        }
        ring
    }

    fn sample_keys() -> Vec<String> {
        (0..500)
            .map(|i| file_key(&format!("video-{}", i), "manifest.mpd"))
            .collect()
    }

    #[test]
    fn empty_ring_owns_nothing() {
        let ring = HashRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.owner("v/manifest.mpd"), None);
    }

    #[test]
    fn single_node_owns_everything() {
        let ring = ring_of(&["n1:9001"]);
        for key in sample_keys() {
            assert_eq!(ring.owner(&key), Some("n1:9001"));
        }
    }

    #[test]
    fn lookup_is_deterministic() {
        let ring = ring_of(&["n1:9001", "n2:9002", "n3:9003"]);
        for key in sample_keys() {
            let first = ring.owner(&key).map(str::to_string);
            for _ in 0..3 {
                assert_eq!(ring.owner(&key).map(str::to_string), first);
            }
        }
    }

    #[test]
    fn owner_matches_clockwise_successor_of_key_hash() {
        let ring = ring_of(&["n1:9001", "n2:9002", "n3:9003"]);
        let positions: Vec<(u64, &str)> = [
            ("n1:9001", hash_key("n1:9001")),
            ("n2:9002", hash_key("n2:9002")),
            ("n3:9003", hash_key("n3:9003")),
        ]
        .iter()
        .map(|(a, h)| (*h, *a))
        .collect();

        let key = "alpha/manifest.mpd";
        let hash = hash_key(key);
        let expected = positions
            .iter()
            .filter(|(h, _)| *h >= hash)
            .min_by_key(|(h, _)| *h)
            .or_else(|| positions.iter().min_by_key(|(h, _)| *h))
            .map(|(_, a)| *a)
            .unwrap();
        assert_eq!(ring.owner(key), Some(expected));
    }

    #[test]
    fn adding_a_node_only_moves_keys_to_it() {
        let before = ring_of(&["n1:9001", "n2:9002", "n3:9003"]);
        let mut after = before.clone();
        after.insert("n4:9004").unwrap();

        let mut moved = 0;
        for key in sample_keys() {
            let old = before.owner(&key).unwrap();
            let new = after.owner(&key).unwrap();
            if new != old {
                assert_eq!(new, "n4:9004");
                moved += 1;
            }
        }
        // With four nodes the new one should pick up some share of keys.
        assert!(moved > 0);
    }

    #[test]
    fn removing_a_non_owner_never_moves_a_key() {
        let before = ring_of(&["n1:9001", "n2:9002", "n3:9003"]);
        let mut after = before.clone();
        assert!(after.remove("n2:9002"));

        for key in sample_keys() {
            let old = before.owner(&key).unwrap();
            if old != "n2:9002" {
                assert_eq!(after.owner(&key), Some(old));
            }
        }
    }

    #[test]
    fn owner_excluding_agrees_with_actual_removal() {
        let full = ring_of(&["n1:9001", "n2:9002", "n3:9003"]);
        let mut without = full.clone();
        without.remove("n3:9003");

        for key in sample_keys() {
            assert_eq!(
                full.owner_excluding(&key, "n3:9003"),
                without.owner(&key),
                "mismatch for {}",
                key
            );
        }
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut ring = ring_of(&["n1:9001"]);
        assert_eq!(
            ring.insert("n1:9001"),
            Err(RingError::AlreadyMember("n1:9001".to_string()))
        );
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn remove_of_unknown_address_is_false() {
        let mut ring = ring_of(&["n1:9001"]);
        assert!(!ring.remove("n9:9999"));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn addresses_are_sorted() {
        let ring = ring_of(&["n3:9003", "n1:9001", "n2:9002"]);
        assert_eq!(
            ring.addresses(),
            vec!["n1:9001", "n2:9002", "n3:9003"]
        );
    }

    #[test]
    fn file_key_uses_slash_separator() {
        assert_eq!(file_key("demo", "manifest.mpd"), "demo/manifest.mpd");
        assert_ne!(hash_key("demo/manifest.mpd"), hash_key("demo:manifest.mpd"));
    }
}
