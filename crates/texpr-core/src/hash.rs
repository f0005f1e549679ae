use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 of raw bytes, used to fingerprint input files.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{:x}", digest)
}
