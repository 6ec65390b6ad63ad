//! Input validation utilities.
//!
//! Document keys (collection names and document ids) end up as path components in the
//! file-backed store, so both stores apply the same conservative rules.

use crate::error::{StoreError, StoreResult};

const MAX_KEY_LEN: usize = 128;

/// Validates that a collection name or document id is safe to use as a storage key.
///
/// Accepts 1..=128 ASCII characters drawn from alphanumerics, `.`, `-` and `_`, not starting
/// with `.` (which also rules out `.` and `..`).
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] if the key is invalid.
pub fn validate_document_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key cannot be empty".into()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidKey(format!(
            "key exceeds maximum length of {} characters",
            MAX_KEY_LEN
        )));
    }

    if key.starts_with('.') {
        return Err(StoreError::InvalidKey(format!(
            "key {key:?} cannot start with '.'"
        )));
    }

    let ok = key
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok {
        return Err(StoreError::InvalidKey(format!(
            "key {key:?} contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_typical_ids() {
        for key in ["u1", "users", "550e8400e29b41d4a716446655440000", "a.b-c_d"] {
            assert!(validate_document_key(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn test_rejects_path_like_ids() {
        for key in ["", ".", "..", ".hidden", "a/b", "a\\b", "a b", "caf\u{e9}"] {
            assert!(
                matches!(validate_document_key(key), Err(StoreError::InvalidKey(_))),
                "{key:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_overlong_ids() {
        let key = "a".repeat(MAX_KEY_LEN + 1);
        assert!(validate_document_key(&key).is_err());
    }
}
