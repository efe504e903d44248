//! Continuation tokens for paged reads.

use serde::{Deserialize, Serialize};

use crate::types::Record;

/// Opaque resume point for a paged query or scan.
///
/// A token carries the key attributes of the last record a store evaluated.
/// Only store backends look inside it; the paging engine hands it back
/// verbatim. On the wire it is the plain key map, the same shape DynamoDB
/// uses for `LastEvaluatedKey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(Record);

impl ContinuationToken {
    /// Wrap the key attributes of the last evaluated record.
    pub fn from_key(key: Record) -> Self {
        Self(key)
    }

    /// Key attributes to resume after. For store backends only.
    pub fn key(&self) -> &Record {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape_is_key_map() {
        let key = json!({"groupid": "g1", "created_at": "2024-01-01T00:00:00Z"});
        let token = ContinuationToken::from_key(key.as_object().unwrap().clone());

        let wire = serde_json::to_value(&token).unwrap();
        assert_eq!(wire, key);

        let back: ContinuationToken = serde_json::from_value(wire).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(serde_json::from_value::<ContinuationToken>(json!("abc")).is_err());
    }
}
