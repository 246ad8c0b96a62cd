use serde::{Deserialize, Serialize};

/// A relationship between a source object and one or more target objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    /// Collection holding the source object.
    pub from_collection: String,

    /// Identifier of the source object.
    pub from_id: String,

    /// Name of the link property on the source object.
    pub property: String,

    /// Target object identifier(s).
    pub to_ids: Vec<String>,
}

impl Reference {
    pub fn new(
        from_collection: impl Into<String>,
        from_id: impl Into<String>,
        property: impl Into<String>,
        to_ids: Vec<String>,
    ) -> Self {
        Self {
            from_collection: from_collection.into(),
            from_id: from_id.into(),
            property: property.into(),
            to_ids,
        }
    }

    /// Deterministic correlation key for this relationship, composed from
    /// every addressing component so equal references yield equal beacons.
    pub fn beacon(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.from_collection,
            self.from_id,
            self.property,
            self.to_ids.join(",")
        )
    }
}
