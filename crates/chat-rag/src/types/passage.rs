//! Passage types with source tags for citations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque passage identifier, unique within a store
///
/// Stores use integers, strings or ObjectIds; all of them are carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassageId(String);

impl PassageId {
    /// Create an identifier from its text form
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Text form of the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse an identifier from a JSON (extended JSON) value
    ///
    /// Accepts numbers, strings, `{"$oid": ..}`, `{"$numberInt": ..}` and
    /// `{"$numberLong": ..}`. Anything else is not a usable identifier.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Object(map) => ["$oid", "$numberInt", "$numberLong"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
                .map(|s| Self(s.to_string())),
            _ => None,
        }
    }

    /// The citation tag used when a record carries no source
    pub fn default_source(&self) -> String {
        format!("doc_{}", self.0)
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PassageId {
                fn from(id: $t) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<&str> for PassageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PassageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A search hit as returned by a backend, before normalization
#[derive(Debug, Clone, Default)]
pub struct PassageRecord {
    pub id: Option<PassageId>,
    pub text: Option<String>,
    pub source: Option<String>,
    pub score: Option<f32>,
}

/// A stored passage with its embedding, as enumerated by a store scan
#[derive(Debug, Clone)]
pub struct StoredPassage {
    pub id: PassageId,
    pub text: Option<String>,
    pub source: Option<String>,
    pub embedding: Vec<f32>,
}

impl StoredPassage {
    /// Create a stored passage
    pub fn new(
        id: impl Into<PassageId>,
        text: impl Into<String>,
        source: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
            source: Some(source.into()),
            embedding,
        }
    }
}

/// A retrieved, normalized passage
///
/// `source` is never empty once a passage leaves the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Store identifier
    pub id: PassageId,
    /// Raw chunk text (empty when the record had none)
    pub text: String,
    /// Citation tag
    pub source: String,
    /// Similarity score, higher is more relevant
    pub score: f32,
}

impl RetrievedPassage {
    /// Normalize a backend record, filling defaults
    ///
    /// Returns `None` for a record without a usable identifier.
    pub fn from_record(record: PassageRecord) -> Option<Self> {
        let id = record.id?;
        Some(Self {
            source: resolve_source(&id, record.source),
            text: record.text.unwrap_or_default(),
            score: record.score.unwrap_or(0.0),
            id,
        })
    }

    /// Normalize a scanned record with the score computed for it
    pub fn from_stored(stored: StoredPassage, score: f32) -> Self {
        Self {
            source: resolve_source(&stored.id, stored.source),
            text: stored.text.unwrap_or_default(),
            score,
            id: stored.id,
        }
    }
}

fn resolve_source(id: &PassageId, source: Option<String>) -> String {
    match source {
        Some(source) if !source.trim().is_empty() => source,
        _ => id.default_source(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_from_extended_json() {
        assert_eq!(PassageId::from_json(&json!(7)).unwrap().as_str(), "7");
        assert_eq!(PassageId::from_json(&json!("abc")).unwrap().as_str(), "abc");
        assert_eq!(
            PassageId::from_json(&json!({"$oid": "65f0c0ffee"})).unwrap().as_str(),
            "65f0c0ffee"
        );
        assert_eq!(
            PassageId::from_json(&json!({"$numberLong": "42"})).unwrap().as_str(),
            "42"
        );
        assert!(PassageId::from_json(&json!(null)).is_none());
        assert!(PassageId::from_json(&json!("")).is_none());
    }

    #[test]
    fn test_missing_source_and_text_are_filled() {
        let passage = RetrievedPassage::from_record(PassageRecord {
            id: Some(PassageId::from(3)),
            text: None,
            source: Some("  ".to_string()),
            score: Some(0.5),
        })
        .unwrap();

        assert_eq!(passage.source, "doc_3");
        assert_eq!(passage.text, "");
        assert_eq!(passage.score, 0.5);
    }

    #[test]
    fn test_record_without_id_is_rejected() {
        let record = PassageRecord {
            text: Some("orphan".to_string()),
            ..Default::default()
        };
        assert!(RetrievedPassage::from_record(record).is_none());
    }
}
