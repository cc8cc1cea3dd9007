//! Hashing utilities for content-addressed chunk names.

use sha2::{Digest, Sha256};

/// Number of hex digits of the content hash embedded in code-split file names.
pub const CONTENT_HASH_LEN: usize = 8;

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}

/// Short content hash used in `<name>-<hash>.<ext>` file names.
pub fn content_hash(code: &str) -> String {
    let mut hash = sha256_str(code);
    hash.truncate(CONTENT_HASH_LEN);
    hash
}

/// A hasher for building fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0"); // Separator
        self
    }

    /// Add multiple strings to the fingerprint.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize and return a short fingerprint.
    pub fn finish_short(self) -> String {
        self.finish()[..CONTENT_HASH_LEN].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_str() {
        let hash = sha256_str("hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_content_hash_is_prefix() {
        assert_eq!(content_hash("hello"), "2cf24dba");
        assert_eq!(content_hash("hello").len(), CONTENT_HASH_LEN);
    }

    #[test]
    fn test_fingerprint_separates_components() {
        let joined = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["ab", "c"]);
            fp.finish()
        };

        let split = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["a", "bc"]);
            fp.finish()
        };

        assert_ne!(joined, split);
    }

    #[test]
    fn test_fingerprint_short() {
        let mut fp = Fingerprint::new();
        fp.update_str("client");
        assert_eq!(fp.finish_short().len(), CONTENT_HASH_LEN);
    }
}
