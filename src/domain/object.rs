use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A record destined for a collection in the remote store.
///
/// This is the canonical caller-facing representation throughout the
/// pipeline, from the add call through framing to outcome reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    /// Target collection name.
    pub collection: String,

    /// Caller-supplied identifier; generated (UUID v4) at submission when
    /// absent. Must be unique within a session's submission.
    #[serde(default)]
    pub id: Option<String>,

    /// Arbitrary field map.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Object {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: None,
            properties: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Identifier of this object, generating and assigning a fresh UUID v4
    /// if the caller did not supply one.
    pub fn ensure_id(&mut self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        let id = Uuid::new_v4().to_string();
        self.id = Some(id.clone());
        id
    }
}
