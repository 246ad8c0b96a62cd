use bytes::Bytes;
use thiserror::Error;

use crate::domain::{Object, QueueEntry, Reference};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Object has no identifier")]
    MissingId,
}

/// One encoded item: the wire fragment, its correlation key, and the
/// fragment's encoded byte size.
#[derive(Debug, Clone)]
pub struct EncodedItem {
    pub payload: Bytes,
    pub key: String,
    pub size: usize,
}

/// Turns one caller-supplied item into a wire-format fragment and measures
/// it. Must be deterministic and side-effect-free: encoding the same item
/// twice yields the same fragment, key, and size.
pub trait Codec: Send + Sync + 'static {
    fn encode_object(&self, object: &Object) -> Result<EncodedItem, CodecError>;

    fn encode_reference(&self, reference: &Reference) -> Result<EncodedItem, CodecError>;

    fn encode(&self, entry: &QueueEntry) -> Result<EncodedItem, CodecError> {
        match entry {
            QueueEntry::Object(object) => self.encode_object(object),
            QueueEntry::Reference(reference) => self.encode_reference(reference),
        }
    }
}

/// JSON wire encoding. The engine is generic over [`Codec`]; this default
/// keeps it usable against JSON-speaking endpoints and test harnesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode_object(&self, object: &Object) -> Result<EncodedItem, CodecError> {
        let key = object.id.clone().ok_or(CodecError::MissingId)?;
        let payload = Bytes::from(serde_json::to_vec(object)?);
        let size = payload.len();
        Ok(EncodedItem { payload, key, size })
    }

    fn encode_reference(&self, reference: &Reference) -> Result<EncodedItem, CodecError> {
        let key = reference.beacon();
        let payload = Bytes::from(serde_json::to_vec(reference)?);
        let size = payload.len();
        Ok(EncodedItem { payload, key, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_encoding_is_deterministic() {
        let object = Object::new("Article")
            .with_id("a1")
            .with_property("title", json!("x"));
        let first = JsonCodec.encode_object(&object).unwrap();
        let second = JsonCodec.encode_object(&object).unwrap();
        assert_eq!(first.payload, second.payload);
        assert_eq!(first.key, "a1");
        assert_eq!(first.size, first.payload.len());
    }

    #[test]
    fn object_without_id_is_rejected() {
        let object = Object::new("Article");
        assert!(matches!(
            JsonCodec.encode_object(&object),
            Err(CodecError::MissingId)
        ));
    }

    #[test]
    fn reference_key_is_the_beacon() {
        let reference = Reference::new("Article", "a1", "author", vec!["p1".into()]);
        let encoded = JsonCodec.encode_reference(&reference).unwrap();
        assert_eq!(encoded.key, reference.beacon());
    }
}
