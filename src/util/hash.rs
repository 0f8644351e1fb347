//! Hashing utilities for spec identities and DAG hashes.

use sha2::{Digest, Sha256};

/// A hasher for building fingerprints from multiple components.
///
/// Every component is length-delimited by a separator byte so that
/// `["ab", "c"]` and `["a", "bc"]` never collide.
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
        self.hasher.update(b"\0");
        self
    }

    /// Add a `key=value` pair.
    pub fn update_kv(&mut self, key: &str, value: &str) -> &mut Self {
        self.hasher.update(key.as_bytes());
        self.hasher.update(b"=");
        self.update_str(value)
    }

    /// Add multiple strings, prefixed with their count.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        let items: Vec<&str> = items.into_iter().collect();
        self.update_str(&items.len().to_string());
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Add an optional string component.
    pub fn update_opt(&mut self, opt: Option<&str>) -> &mut Self {
        match opt {
            Some(s) => {
                self.hasher.update(b"\x01");
                self.update_str(s);
            }
            None => {
                self.hasher.update(b"\x00");
            }
        }
        self
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let fp = || {
            let mut fp = Fingerprint::new();
            fp.update_str("zlib").update_kv("shared", "true");
            fp.finish()
        };
        assert_eq!(fp(), fp());
    }

    #[test]
    fn test_fingerprint_component_boundaries() {
        let a = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["ab", "c"]);
            fp.finish()
        };
        let b = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["a", "bc"]);
            fp.finish()
        };
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_optional() {
        let present = {
            let mut fp = Fingerprint::new();
            fp.update_opt(Some(""));
            fp.finish()
        };
        let absent = {
            let mut fp = Fingerprint::new();
            fp.update_opt(None);
            fp.finish()
        };
        assert_ne!(present, absent);
    }
}
