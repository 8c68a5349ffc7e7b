use sha2::{Digest, Sha256};

/// Stable hash of a host name
///
/// Derived from the first eight bytes of the SHA-256 digest, so the value is
/// identical across processes and platforms. Sub-bucket and back-queue
/// selection are both `host_hash(host) % n`.
pub fn host_hash(host: &str) -> u64 {
    let digest = Sha256::digest(host.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(host_hash("example.com"), host_hash("example.com"));
    }

    #[test]
    fn test_hash_differs_between_hosts() {
        assert_ne!(host_hash("example.com"), host_hash("example.org"));
    }

    #[test]
    fn test_hash_spreads_over_buckets() {
        let buckets: std::collections::HashSet<u64> = (0..50)
            .map(|i| host_hash(&format!("host{}.example", i)) % 3)
            .collect();
        assert_eq!(buckets.len(), 3);
    }
}
