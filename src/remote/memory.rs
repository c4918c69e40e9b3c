//! In-process store with Drive-like semantics
//!
//! Ids are opaque, names are not unique within a folder, trashed objects stay
//! in the tree but are hidden from every call. Clones share the same state, so
//! a caller can keep a handle for inspection after handing one to a session.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::{ObjectId, ObjectKind, ObjectRef, RemoteStore, StoreError, StoreResult};

#[derive(Debug)]
struct Node {
    name: String,
    kind: ObjectKind,
    parent: Option<ObjectId>,
    content: Vec<u8>,
    trashed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: IndexMap<ObjectId, Node>,
    next_id: u64,
    writes: usize,
    failing_names: HashSet<String>,
}

impl Inner {
    fn live(&self, id: &ObjectId) -> StoreResult<&Node> {
        match self.nodes.get(id) {
            Some(node) if !node.trashed => Ok(node),
            _ => Err(StoreError::NotFound { id: id.clone() }),
        }
    }

    fn live_folder(&self, id: &ObjectId) -> StoreResult<&Node> {
        let node = self.live(id)?;
        if node.kind != ObjectKind::Folder {
            return Err(StoreError::WrongKind {
                id: id.clone(),
                expected: ObjectKind::Folder,
            });
        }
        Ok(node)
    }

    fn check_injected(&self, name: &str) -> StoreResult<()> {
        if self.failing_names.contains(name) {
            return Err(StoreError::Backend(format!("injected failure writing '{}'", name)));
        }
        Ok(())
    }

    fn insert(&mut self, parent: &ObjectId, name: &str, kind: ObjectKind, content: Vec<u8>) -> ObjectRef {
        self.next_id += 1;
        let id = ObjectId::new(format!("obj-{}", self.next_id));
        self.nodes.insert(
            id.clone(),
            Node {
                name: name.to_string(),
                kind,
                parent: Some(parent.clone()),
                content,
                trashed: false,
            },
        );
        self.writes += 1;
        ObjectRef {
            id,
            name: name.to_string(),
            kind,
        }
    }

    fn is_hidden(&self, id: &ObjectId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            match self.nodes.get(cur) {
                Some(node) if !node.trashed => current = node.parent.as_ref(),
                _ => return true,
            }
        }
        false
    }

    fn path_of(&self, id: &ObjectId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            match self.nodes.get(cur) {
                Some(node) if node.parent.is_some() => {
                    parts.push(node.name.as_str());
                    current = node.parent.as_ref();
                }
                _ => break,
            }
        }
        parts.reverse();
        parts.join("/")
    }
}

/// Shared in-memory store
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Identifier of the pre-created root folder
    pub const ROOT_ID: &'static str = "root";

    /// Create a store holding only an empty root folder
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.nodes.insert(
            ObjectId::from(Self::ROOT_ID),
            Node {
                name: String::new(),
                kind: ObjectKind::Folder,
                parent: None,
                content: Vec::new(),
                trashed: false,
            },
        );
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Root folder id
    pub fn root_id(&self) -> ObjectId {
        ObjectId::from(Self::ROOT_ID)
    }

    /// Number of successful mutating calls so far
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes
    }

    /// Make every create/update of an object with this name fail
    pub fn fail_writes_to(&self, name: impl Into<String>) {
        self.inner.lock().failing_names.insert(name.into());
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.inner.lock().failing_names.clear();
    }

    /// Move an object to the trash; it disappears from all store calls
    pub fn trash(&self, id: &ObjectId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        match inner.nodes.get_mut(id) {
            Some(node) => {
                node.trashed = true;
                Ok(())
            }
            None => Err(StoreError::NotFound { id: id.clone() }),
        }
    }

    /// Visible files by slash-separated path, with their content
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        let inner = self.inner.lock();
        inner
            .nodes
            .iter()
            .filter(|(id, node)| node.kind == ObjectKind::File && !inner.is_hidden(id))
            .map(|(id, node)| (inner.path_of(id), node.content.clone()))
            .collect()
    }
}

impl RemoteStore for MemoryStore {
    fn list_children(
        &self,
        parent: &ObjectId,
        name: Option<&str>,
        kind: Option<ObjectKind>,
    ) -> StoreResult<Vec<ObjectRef>> {
        let inner = self.inner.lock();
        inner.live_folder(parent)?;
        Ok(inner
            .nodes
            .iter()
            .filter(|(_, node)| !node.trashed && node.parent.as_ref() == Some(parent))
            .filter(|(_, node)| name.map_or(true, |n| node.name == n))
            .filter(|(_, node)| kind.map_or(true, |k| node.kind == k))
            .map(|(id, node)| ObjectRef {
                id: id.clone(),
                name: node.name.clone(),
                kind: node.kind,
            })
            .collect())
    }

    fn create_folder(&self, parent: &ObjectId, name: &str) -> StoreResult<ObjectRef> {
        let mut inner = self.inner.lock();
        inner.live_folder(parent)?;
        inner.check_injected(name)?;
        Ok(inner.insert(parent, name, ObjectKind::Folder, Vec::new()))
    }

    fn create_file(&self, parent: &ObjectId, name: &str, content: &[u8]) -> StoreResult<ObjectRef> {
        let mut inner = self.inner.lock();
        inner.live_folder(parent)?;
        inner.check_injected(name)?;
        Ok(inner.insert(parent, name, ObjectKind::File, content.to_vec()))
    }

    fn update_content(&self, file: &ObjectRef, content: &[u8]) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.live(&file.id)?.kind != ObjectKind::File {
            return Err(StoreError::WrongKind {
                id: file.id.clone(),
                expected: ObjectKind::File,
            });
        }
        inner.check_injected(&file.name)?;
        if let Some(node) = inner.nodes.get_mut(&file.id) {
            node.content = content.to_vec();
        }
        inner.writes += 1;
        Ok(())
    }

    fn download(&self, file: &ObjectRef) -> StoreResult<Vec<u8>> {
        let inner = self.inner.lock();
        let node = inner.live(&file.id)?;
        if node.kind != ObjectKind::File {
            return Err(StoreError::WrongKind {
                id: file.id.clone(),
                expected: ObjectKind::File,
            });
        }
        Ok(node.content.clone())
    }

    fn delete(&self, object: &ObjectRef) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.live(&object.id)?;

        let mut doomed = vec![object.id.clone()];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let parent = doomed[cursor].clone();
            doomed.extend(
                inner
                    .nodes
                    .iter()
                    .filter(|(_, node)| node.parent.as_ref() == Some(&parent))
                    .map(|(id, _)| id.clone()),
            );
            cursor += 1;
        }
        for id in &doomed {
            inner.nodes.shift_remove(id);
        }
        inner.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_listed_in_creation_order() {
        let store = MemoryStore::new();
        let root = store.root_id();
        let first = store.create_folder(&root, "t").unwrap();
        let second = store.create_folder(&root, "t").unwrap();

        let found = store.list_children(&root, Some("t"), Some(ObjectKind::Folder)).unwrap();
        assert_eq!(found, vec![first, second]);
    }

    #[test]
    fn test_trashed_objects_are_hidden() {
        let store = MemoryStore::new();
        let root = store.root_id();
        let folder = store.create_folder(&root, "t").unwrap();
        store.create_file(&folder.id, "t.parquet", b"data").unwrap();

        store.trash(&folder.id).unwrap();

        assert!(store.list_children(&root, None, None).unwrap().is_empty());
        assert!(store.snapshot().is_empty());
        assert!(matches!(
            store.list_children(&folder.id, None, None),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_folder_is_recursive() {
        let store = MemoryStore::new();
        let root = store.root_id();
        let folder = store.create_folder(&root, "t").unwrap();
        let file = store.create_file(&folder.id, "t.log", b"x").unwrap();

        store.delete(&folder).unwrap();

        assert!(matches!(store.download(&file), Err(StoreError::NotFound { .. })));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_injected_failures_do_not_count_as_writes() {
        let store = MemoryStore::new();
        let root = store.root_id();
        store.fail_writes_to("t");

        assert!(store.create_folder(&root, "t").is_err());
        assert_eq!(store.write_count(), 0);

        store.clear_failures();
        store.create_folder(&root, "t").unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_snapshot_uses_paths() {
        let store = MemoryStore::new();
        let root = store.root_id();
        let folder = store.create_folder(&root, "t").unwrap();
        let file = store.create_file(&folder.id, "t.log", b"one").unwrap();
        store.update_content(&file, b"two").unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.get("t/t.log").map(Vec::as_slice), Some(&b"two"[..]));
    }
}
