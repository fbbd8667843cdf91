//! Pagination cursors.
//!
//! A cursor wraps the engine's last evaluated key in an opaque token
//! (base64url of its JSON form). It is only meaningful for the query shape
//! that produced it.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::storage::{LastKey, Result, StorageError};

/// Opaque token resuming a query after the last item of a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a last evaluated key.
    pub fn encode(last_key: &LastKey) -> Result<Self> {
        let json = serde_json::to_vec(last_key)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(json)))
    }

    /// Recovers the last evaluated key.
    pub fn decode(&self) -> Result<LastKey> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|e| StorageError::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::InvalidCursor(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_recovers_last_key() {
        let last_key = LastKey::from([
            ("partitionKey".to_string(), "Task#userId#u1".to_string()),
            ("sortKey".to_string(), "status#open".to_string()),
        ]);
        let cursor = Cursor::encode(&last_key).unwrap();

        assert!(!cursor.as_str().contains('#'));
        assert_eq!(Cursor::from(cursor.to_string()).decode().unwrap(), last_key);
    }

    #[test]
    fn test_malformed_cursor_is_rejected() {
        assert!(matches!(
            Cursor::from("not base64!").decode(),
            Err(StorageError::InvalidCursor(_))
        ));
        let not_json = Cursor(URL_SAFE_NO_PAD.encode(b"plain"));
        assert!(matches!(
            not_json.decode(),
            Err(StorageError::InvalidCursor(_))
        ));
    }
}
