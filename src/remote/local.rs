//! Directory-backed store
//!
//! Folders are directories and files are files below a base directory. Object
//! ids are `/`-separated paths relative to the base, with the empty id naming
//! the base itself. Entries whose name starts with `.` are hidden, which covers
//! in-flight staging files.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use super::{ObjectId, ObjectKind, ObjectRef, RemoteStore, StoreError, StoreResult};

/// Store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    base: PathBuf,
}

impl LocalStore {
    /// Open (and create if needed) a store at `base`
    pub fn open(base: impl Into<PathBuf>) -> StoreResult<Self> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|source| StoreError::Io {
            id: ObjectId::from(base.display().to_string()),
            source,
        })?;
        Ok(Self { base })
    }

    /// Base directory of the store
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_of(&self, id: &ObjectId) -> StoreResult<PathBuf> {
        let rel = Path::new(id.as_str());
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::NotFound { id: id.clone() });
        }
        Ok(self.base.join(rel))
    }

    fn child_id(parent: &ObjectId, name: &str) -> ObjectId {
        if parent.as_str().is_empty() {
            ObjectId::from(name)
        } else {
            ObjectId::new(format!("{}/{}", parent, name))
        }
    }

    fn existing_dir(&self, id: &ObjectId) -> StoreResult<PathBuf> {
        let path = self.path_of(id)?;
        if !path.is_dir() {
            return Err(StoreError::NotFound { id: id.clone() });
        }
        Ok(path)
    }

    fn check_name(name: &str) -> StoreResult<()> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(StoreError::Backend(format!("invalid object name '{}'", name)));
        }
        Ok(())
    }

    /// Write `content` to a staging file next to `target` and move it into place.
    /// The staging file is removed if anything fails before the move.
    fn stage_and_persist(dir: &Path, target: &Path, content: &[u8], replace: bool) -> io::Result<()> {
        let mut staged = tempfile::Builder::new()
            .prefix(".staging-")
            .tempfile_in(dir)?;
        staged.write_all(content)?;
        staged.as_file().sync_all()?;
        persist(staged, target, replace)
    }
}

fn persist(staged: NamedTempFile, target: &Path, replace: bool) -> io::Result<()> {
    let result = if replace {
        staged.persist(target)
    } else {
        staged.persist_noclobber(target)
    };
    result.map(|_| ()).map_err(|e| e.error)
}

impl RemoteStore for LocalStore {
    fn list_children(
        &self,
        parent: &ObjectId,
        name: Option<&str>,
        kind: Option<ObjectKind>,
    ) -> StoreResult<Vec<ObjectRef>> {
        let dir = self.existing_dir(parent)?;
        let io_err = |source: io::Error| StoreError::Io {
            id: parent.clone(),
            source,
        };

        let mut children = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let Some(entry_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if entry_name.starts_with('.') || name.is_some_and(|n| n != entry_name) {
                continue;
            }
            let entry_kind = if entry.file_type().map_err(io_err)?.is_dir() {
                ObjectKind::Folder
            } else {
                ObjectKind::File
            };
            if kind.is_some_and(|k| k != entry_kind) {
                continue;
            }
            children.push(ObjectRef {
                id: Self::child_id(parent, &entry_name),
                name: entry_name,
                kind: entry_kind,
            });
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    fn create_folder(&self, parent: &ObjectId, name: &str) -> StoreResult<ObjectRef> {
        Self::check_name(name)?;
        let dir = self.existing_dir(parent)?;
        let id = Self::child_id(parent, name);
        fs::create_dir(dir.join(name)).map_err(|source| StoreError::Io {
            id: id.clone(),
            source,
        })?;
        Ok(ObjectRef {
            id,
            name: name.to_string(),
            kind: ObjectKind::Folder,
        })
    }

    fn create_file(&self, parent: &ObjectId, name: &str, content: &[u8]) -> StoreResult<ObjectRef> {
        Self::check_name(name)?;
        let dir = self.existing_dir(parent)?;
        let id = Self::child_id(parent, name);
        Self::stage_and_persist(&dir, &dir.join(name), content, false).map_err(|source| {
            StoreError::Io {
                id: id.clone(),
                source,
            }
        })?;
        Ok(ObjectRef {
            id,
            name: name.to_string(),
            kind: ObjectKind::File,
        })
    }

    fn update_content(&self, file: &ObjectRef, content: &[u8]) -> StoreResult<()> {
        let path = self.path_of(&file.id)?;
        if !path.is_file() {
            return Err(StoreError::NotFound { id: file.id.clone() });
        }
        let dir = path.parent().unwrap_or(&self.base);
        Self::stage_and_persist(dir, &path, content, true).map_err(|source| StoreError::Io {
            id: file.id.clone(),
            source,
        })
    }

    fn download(&self, file: &ObjectRef) -> StoreResult<Vec<u8>> {
        let path = self.path_of(&file.id)?;
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound { id: file.id.clone() },
            _ => StoreError::Io {
                id: file.id.clone(),
                source,
            },
        })
    }

    fn delete(&self, object: &ObjectRef) -> StoreResult<()> {
        let path = self.path_of(&object.id)?;
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound {
                id: object.id.clone(),
            },
            _ => StoreError::Io {
                id: object.id.clone(),
                source,
            },
        })
    }
}
