use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of a string
pub fn hash_string(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Hash the compact JSON serialization of `value`.
///
/// Field order is the serialization order, so equal records always hash equal.
pub fn hash_json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => hash_string(&json),
        Err(e) => {
            log::error!("Failed to serialize record for hashing: {}", e);
            hash_string("")
        }
    }
}

/// Records carrying a content hash used for import dedup and change detection
pub trait Fingerprint: Serialize + Clone {
    fn hash(&self) -> &str;

    fn set_hash(&mut self, hash: String);

    /// Hash of the record with its own `hash` field cleared
    fn content_hash(&self) -> String {
        let mut copy = self.clone();
        copy.set_hash(String::new());
        hash_json(&copy)
    }

    fn refresh_hash(&mut self) {
        let hash = self.content_hash();
        self.set_hash(hash);
    }

    /// The stored hash matches the current content
    fn is_hash_current(&self) -> bool {
        self.hash() == self.content_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::dns::DnsTableRow;

    #[test]
    fn test_hash_string_is_hex_sha256() {
        assert_eq!(
            hash_string("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_excludes_itself() {
        let mut row = DnsTableRow {
            name: "Cloudflare".to_string(),
            ipv4: "1.1.1.1".to_string(),
            ..Default::default()
        };
        row.refresh_hash();
        let first = row.hash.clone();
        assert!(row.is_hash_current());

        row.refresh_hash();
        assert_eq!(row.hash, first);

        let mut cleared = row.clone();
        cleared.hash = "stale".to_string();
        assert_eq!(cleared.content_hash(), first);
    }

    #[test]
    fn test_content_change_changes_hash() {
        let mut a = DnsTableRow::default();
        a.refresh_hash();
        let mut b = a.clone();
        b.doh = "https://dns.google/dns-query".to_string();
        b.refresh_hash();
        assert_ne!(a.hash, b.hash);
    }
}
