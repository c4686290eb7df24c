//! Key-name validation policy shared by every backend.

use crate::error::StoreError;

/// Account name backends reserve for their own bookkeeping (the keychain
/// backend's name index). Rejected as a user-supplied key name everywhere,
/// not just in the keychain backend, so the same validator can be shared.
pub const RESERVED_INDEX_NAME: &str = "_keylist";

const MAX_NAME_LEN: usize = 256;

/// Validates a key name against the shared policy. Backends may layer
/// stricter limits on top (the keychain backend additionally caps length for
/// portability across credential stores).
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidKeyName("name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::InvalidKeyName(format!(
            "name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(StoreError::InvalidKeyName(
            "name must not contain '/', '\\' or NUL".into(),
        ));
    }
    if name == ".." {
        return Err(StoreError::InvalidKeyName("name must not be '..'".into()));
    }
    if name.starts_with('.') {
        return Err(StoreError::InvalidKeyName("name must not start with '.'".into()));
    }
    if name.bytes().any(|b| b < 32) {
        return Err(StoreError::InvalidKeyName(
            "name must not contain control bytes".into(),
        ));
    }
    if name == RESERVED_INDEX_NAME {
        return Err(StoreError::InvalidKeyName(format!(
            "'{RESERVED_INDEX_NAME}' is reserved"
        )));
    }
    Ok(())
}
