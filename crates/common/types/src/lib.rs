pub mod attestation;
pub mod committee;
pub mod config;
pub mod header;
pub mod participation;
pub mod serde_utils;

/// Display helper for truncated root hashes (`0x` plus 8 hex chars)
pub struct ShortRoot<'a>(pub &'a str);

impl std::fmt::Display for ShortRoot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root = self.0;
        match root.get(..10) {
            Some(prefix) if root.len() > 10 => write!(f, "{prefix}…"),
            _ => f.write_str(root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ShortRoot;

    #[test]
    fn short_root_truncates_long_hashes() {
        let root = "0x4d611d5b93fdab69013a7f0a2f961caca0c853f87cfe9595fe50038163079360";
        assert_eq!(ShortRoot(root).to_string(), "0x4d611d5b…");
    }

    #[test]
    fn short_root_keeps_short_strings() {
        assert_eq!(ShortRoot("0xabcd").to_string(), "0xabcd");
        assert_eq!(ShortRoot("").to_string(), "");
    }
}
