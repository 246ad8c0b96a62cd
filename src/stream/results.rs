use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;

use crate::domain::{Object, Reference};

/// A server-rejected object, surfaced through the session's error map.
#[derive(Debug, Clone)]
pub struct FailedObject {
    pub message: String,
    pub object: Object,
}

/// A server-rejected reference, surfaced through the session's error map.
#[derive(Debug, Clone)]
pub struct FailedReference {
    pub message: String,
    pub reference: Reference,
}

#[derive(Debug, Default)]
struct ResultsInner {
    uuids: HashMap<usize, String>,
    beacons: HashMap<usize, String>,
    object_errors: HashMap<usize, FailedObject>,
    reference_errors: HashMap<usize, FailedReference>,
}

/// Reconciled outcomes, indexed by per-kind submission order. Partial
/// results are visible to the caller at any point mid-flight.
#[derive(Debug, Default)]
pub(crate) struct ResultSink {
    inner: Mutex<ResultsInner>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_object_success(&self, index: usize, uuid: String) {
        if self.inner.lock().uuids.insert(index, uuid).is_some() {
            warn!(index, "duplicate success outcome for object");
        }
    }

    pub fn record_reference_success(&self, index: usize, beacon: String) {
        if self.inner.lock().beacons.insert(index, beacon).is_some() {
            warn!(index, "duplicate success outcome for reference");
        }
    }

    pub fn record_object_error(&self, index: usize, message: String, object: Object) {
        if self
            .inner
            .lock()
            .object_errors
            .insert(index, FailedObject { message, object })
            .is_some()
        {
            warn!(index, "duplicate error outcome for object");
        }
    }

    pub fn record_reference_error(&self, index: usize, message: String, reference: Reference) {
        if self
            .inner
            .lock()
            .reference_errors
            .insert(index, FailedReference { message, reference })
            .is_some()
        {
            warn!(index, "duplicate error outcome for reference");
        }
    }

    pub fn uuids(&self) -> HashMap<usize, String> {
        self.inner.lock().uuids.clone()
    }

    pub fn beacons(&self) -> HashMap<usize, String> {
        self.inner.lock().beacons.clone()
    }

    pub fn object_errors(&self) -> HashMap<usize, FailedObject> {
        self.inner.lock().object_errors.clone()
    }

    pub fn reference_errors(&self) -> HashMap<usize, FailedReference> {
        self.inner.lock().reference_errors.clone()
    }

    pub fn has_errors(&self) -> bool {
        let inner = self.inner.lock();
        !inner.object_errors.is_empty() || !inner.reference_errors.is_empty()
    }

    pub fn success_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.uuids.len() + inner.beacons.len()
    }

    pub fn error_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.object_errors.len() + inner.reference_errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_accumulate_by_submission_index() {
        let sink = ResultSink::new();
        sink.record_object_success(0, "u0".to_string());
        sink.record_object_error(1, "boom".to_string(), Object::new("Article"));
        sink.record_reference_success(0, "b0".to_string());

        assert_eq!(sink.uuids().get(&0).map(String::as_str), Some("u0"));
        assert_eq!(sink.beacons().get(&0).map(String::as_str), Some("b0"));
        assert_eq!(sink.object_errors()[&1].message, "boom");
        assert!(sink.has_errors());
        assert_eq!(sink.success_count(), 2);
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn empty_sink_reports_no_errors() {
        let sink = ResultSink::new();
        assert!(!sink.has_errors());
        assert_eq!(sink.success_count(), 0);
    }
}
