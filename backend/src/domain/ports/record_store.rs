//! Port abstraction for the hierarchical JSON record store.
//!
//! The durable store behind the guest portal is a REST-accessible document
//! tree addressed by slash-delimited paths. The [`RecordStore`] trait models
//! the four operations the portal needs: point reads, point writes,
//! multi-path patches, and deletes. A multi-path patch applies every entry of
//! the patch map relative to a base path as one logical write, which is what
//! keeps fan-out index views consistent with their primary records.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::define_port_error;

define_port_error! {
    /// Errors raised by record store adapters.
    pub enum RecordStoreError {
        /// The store could not be reached.
        Connection { message: String } => "record store connection failed: {message}",
        /// The store rejected the request.
        Request { status: u16, message: String } => "record store request failed ({status}): {message}",
        /// Response serialization or deserialization failed.
        Serialization { message: String } => "record store serialization failed: {message}",
    }
}

/// Port for the hierarchical JSON record store.
///
/// Paths are slash-delimited (`bookings/BOOK123/occ_aaa`); values are JSON
/// documents. Writing `null` at a path removes the node, mirroring the
/// semantics of the backing store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the JSON value at `path`, or `None` when nothing is stored there.
    async fn get(&self, path: &str) -> Result<Option<Value>, RecordStoreError>;

    /// Replace the value at `path`.
    async fn set(&self, path: &str, value: &Value) -> Result<(), RecordStoreError>;

    /// Apply a multi-path patch rooted at `path`.
    ///
    /// Every key of `patch` is a relative slash-delimited path; all entries
    /// are applied as one logical write. A `null` entry removes that node.
    async fn update(&self, path: &str, patch: &Map<String, Value>) -> Result<(), RecordStoreError>;

    /// Remove the value at `path`.
    async fn delete(&self, path: &str) -> Result<(), RecordStoreError>;
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn node_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn write_at(root: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = segments(path).collect();
    let Some((leaf, parents)) = parts.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = match current.as_object_mut() {
            Some(map) => map,
            None => return,
        };
        current = map
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        if value.is_null() {
            map.remove(*leaf);
        } else {
            map.insert((*leaf).to_owned(), value);
        }
    }
}

/// In-memory implementation backed by a JSON tree.
///
/// Used by unit and integration tests in place of the REST adapter. Tracks
/// the number of mutating calls so tests can assert that replayed operations
/// perform no new writes.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    root: std::sync::Mutex<Value>,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls (`set`, `update`, `delete`) observed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Snapshot the value at `path` synchronously, for test assertions.
    pub fn peek(&self, path: &str) -> Option<Value> {
        let root = self.root.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        node_at(&root, path).filter(|value| !value.is_null()).cloned()
    }

    fn bump_writes(&self) {
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, RecordStoreError> {
        Ok(self.peek(path))
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), RecordStoreError> {
        self.bump_writes();
        let mut root = self.root.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        write_at(&mut root, path, value.clone());
        Ok(())
    }

    async fn update(&self, path: &str, patch: &Map<String, Value>) -> Result<(), RecordStoreError> {
        self.bump_writes();
        let mut root = self.root.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (relative, value) in patch {
            let full = format!("{path}/{relative}");
            write_at(&mut root, &full, value.clone());
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), RecordStoreError> {
        self.bump_writes();
        let mut root = self.root.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        write_at(&mut root, path, Value::Null);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_returns_none_for_missing_path() {
        let store = MemoryRecordStore::new();
        let value = store.get("bookings/NOPE").await.expect("get succeeds");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryRecordStore::new();
        store
            .set("bookings/BOOK123/occ_aaa", &json!({ "firstName": "Jane" }))
            .await
            .expect("set succeeds");

        let value = store
            .get("bookings/BOOK123/occ_aaa")
            .await
            .expect("get succeeds");
        assert_eq!(value, Some(json!({ "firstName": "Jane" })));
    }

    #[tokio::test]
    async fn get_returns_subtree_for_parent_path() {
        let store = MemoryRecordStore::new();
        store
            .set("bookings/BOOK123/occ_aaa", &json!({ "firstName": "Jane" }))
            .await
            .expect("set succeeds");

        let value = store.get("bookings/BOOK123").await.expect("get succeeds");
        assert_eq!(value, Some(json!({ "occ_aaa": { "firstName": "Jane" } })));
    }

    #[tokio::test]
    async fn multi_path_update_applies_all_entries_and_null_removes() {
        let store = MemoryRecordStore::new();
        store
            .set("requests/byStatus/pending/req_1", &json!(true))
            .await
            .expect("seed succeeds");

        let mut patch = Map::new();
        patch.insert("byStatus/pending/req_1".to_owned(), Value::Null);
        patch.insert("byStatus/approved/req_1".to_owned(), json!(true));
        patch.insert("byId/req_1/status".to_owned(), json!("approved"));
        store.update("requests", &patch).await.expect("update succeeds");

        assert!(store.peek("requests/byStatus/pending/req_1").is_none());
        assert_eq!(store.peek("requests/byStatus/approved/req_1"), Some(json!(true)));
        assert_eq!(store.peek("requests/byId/req_1/status"), Some(json!("approved")));
    }

    #[tokio::test]
    async fn delete_removes_node() {
        let store = MemoryRecordStore::new();
        store
            .set("sessions/tok", &json!({ "bookingId": "B" }))
            .await
            .expect("set succeeds");
        store.delete("sessions/tok").await.expect("delete succeeds");
        assert!(store.peek("sessions/tok").is_none());
    }

    #[tokio::test]
    async fn write_count_tracks_mutations() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.write_count(), 0);
        store.set("a/b", &json!(1)).await.expect("set succeeds");
        store.delete("a/b").await.expect("delete succeeds");
        assert_eq!(store.write_count(), 2);
    }
}
