use base64::Engine;
use sha2::{Digest, Sha256};

/// SHA-256 of the artifact bytes, base64 encoded.
pub fn compute_content_hash(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    base64::engine::general_purpose::STANDARD.encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_deterministic() {
        let h1 = compute_content_hash(b"heart model weights");
        let h2 = compute_content_hash(b"heart model weights");
        assert_eq!(h1, h2);
        assert!(!h1.is_empty());
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(compute_content_hash(b"model A"), compute_content_hash(b"model B"));
    }

    #[test]
    fn hash_is_base64_of_32_bytes() {
        let hash = compute_content_hash(b"");
        let decoded = base64::engine::general_purpose::STANDARD.decode(&hash).unwrap();
        assert_eq!(decoded.len(), 32);
    }
}
