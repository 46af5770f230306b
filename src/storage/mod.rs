//! Object store gateway.
//!
//! Photos are written under `<owner>/<uuid>.<ext>` and served from a public
//! base URL. [`LocalObjectStore`] keeps objects on the local filesystem; any
//! other backend only has to implement [`ObjectStore`].

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::StorageConfig;

pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`. Never overwrites an existing object.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Public URL of the object at `path`. Pure derivation, cannot fail.
    fn public_url(&self, path: &str) -> String;

    /// Remove every object in `paths`. Paths that are already gone are ignored.
    fn remove(&self, paths: &[String]) -> Result<()>;

    /// All objects below `prefix`, sorted by path.
    fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;

    fn exists(&self, path: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    /// Last write time, when the backend reports one.
    pub modified: Option<DateTime<Utc>>,
}

/// Owner ids name a single top-level directory of the store.
pub fn check_owner_id(owner_id: &str) -> Result<()> {
    if owner_id.is_empty()
        || owner_id == "."
        || owner_id == ".."
        || owner_id.contains(['/', '\\'])
        || owner_id.chars().any(char::is_control)
    {
        bail!("Invalid owner id: {:?}", owner_id);
    }
    Ok(())
}

/// Build a fresh storage path for an upload, keeping the original extension.
pub fn storage_path_for(owner_id: &str, original_name: &str) -> Result<String> {
    check_owner_id(owner_id)?;

    let extension = Path::new(original_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    Ok(format!("{}/{}{}", owner_id, uuid::Uuid::new_v4(), extension))
}

/// Whether `path` is an object directly under the owner's directory.
pub fn is_owner_object(owner_id: &str, path: &str) -> bool {
    path.strip_prefix(owner_id)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object path onto the filesystem, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("Invalid object path: {:?}", path);
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .with_context(|| format!("Failed to create object {}", path))?;

        if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(&target);
            return Err(e).with_context(|| format!("Failed to write object {}", path));
        }

        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    fn remove(&self, paths: &[String]) -> Result<()> {
        // Validate everything up front so a bad path removes nothing
        let targets = paths
            .iter()
            .map(|p| self.resolve(p))
            .collect::<Result<Vec<_>>>()?;

        for (target, path) in targets.iter().zip(paths) {
            match fs::remove_file(target) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove object {}", path));
                }
            }
        }

        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let base = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix)?
        };

        if !base.exists() {
            return Ok(Vec::new());
        }

        let mut objects = Vec::new();
        for entry in WalkDir::new(&base).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root)?;
            let key: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);

            objects.push(StoredObject {
                path: key.join("/"),
                modified,
            });
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> LocalObjectStore {
        LocalObjectStore::new(&StorageConfig {
            root: dir.to_path_buf(),
            public_base_url: "http://cdn.test/photos/".to_string(),
            ..StorageConfig::default()
        })
    }

    #[test]
    fn test_storage_path_keeps_extension() {
        let path = storage_path_for("alice", "IMG_0001.JPG").unwrap();
        assert!(path.starts_with("alice/"));
        assert!(path.ends_with(".JPG"));

        let bare = storage_path_for("alice", "README").unwrap();
        assert!(!bare.contains('.'));
        assert_ne!(
            storage_path_for("alice", "a.jpg").unwrap(),
            storage_path_for("alice", "a.jpg").unwrap()
        );
    }

    #[test]
    fn test_owner_id_must_be_one_directory() {
        for bad in ["", ".", "..", "alice/team", "alice\\team", "a\nb"] {
            assert!(check_owner_id(bad).is_err(), "{:?} accepted", bad);
            assert!(storage_path_for(bad, "x.jpg").is_err());
        }
        assert!(check_owner_id("alice").is_ok());
        assert!(check_owner_id("3f2c-uuid-owner").is_ok());
    }

    #[test]
    fn test_is_owner_object() {
        assert!(is_owner_object("alice", "alice/one.jpg"));
        assert!(!is_owner_object("alice", "alice/team/one.jpg"));
        assert!(!is_owner_object("alice", "alicebob/one.jpg"));
        assert!(!is_owner_object("alice", "alice/"));
    }

    #[test]
    fn test_put_list_remove() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.put("alice/one.jpg", b"one").unwrap();
        store.put("alice/two.jpg", b"two").unwrap();
        store.put("bob/three.jpg", b"three").unwrap();

        let listed = store.list("alice").unwrap();
        let paths: Vec<&str> = listed.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(paths, vec!["alice/one.jpg", "alice/two.jpg"]);
        assert!(listed.iter().all(|o| o.modified.is_some()));
        assert_eq!(store.list("").unwrap().len(), 3);
        assert_eq!(store.public_url("alice/one.jpg"), "http://cdn.test/photos/alice/one.jpg");

        store.remove(&["alice/one.jpg".to_string(), "alice/missing.jpg".to_string()]).unwrap();
        assert!(!store.exists("alice/one.jpg").unwrap());
        assert!(store.exists("alice/two.jpg").unwrap());
    }

    #[test]
    fn test_put_refuses_overwrite_and_escape() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.put("alice/one.jpg", b"one").unwrap();
        assert!(store.put("alice/one.jpg", b"again").is_err());
        assert!(store.put("../outside.jpg", b"x").is_err());
        assert!(store.put("/etc/passwd", b"x").is_err());
        assert_eq!(fs::read(dir.path().join("alice/one.jpg")).unwrap(), b"one");
    }

    #[test]
    fn test_list_missing_prefix_is_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.list("nobody").unwrap().is_empty());
    }
}
