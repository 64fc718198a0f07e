use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use lambda_runtime::tracing;

use crate::error::RelayError;
use crate::object_ref::ObjectRef;

/// A retrieved object held on local disk until it is relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub source: ObjectRef,
    pub path: PathBuf,
}

impl StagedFile {
    /// Objects land in the destination bucket under their staged path.
    pub fn destination_key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Directory that staged files are written under.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StagingArea { root: root.into() }
    }

    /// Staging path for an object key: the root joined with the key. Keys that
    /// would escape the root or that name a folder are refused.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, RelayError> {
        let invalid = |reason: &'static str| RelayError::InvalidKey {
            key: key.to_string(),
            reason,
        };
        if key.ends_with('/') {
            return Err(invalid("key names a folder"));
        }
        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => {
                    return Err(invalid("key contains a parent directory segment"))
                }
                Component::CurDir => {
                    return Err(invalid("key contains a current directory segment"))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("key is an absolute path"))
                }
            }
        }
        Ok(self.root.join(relative))
    }

    /// Removes whatever was staged for `refs`, along with any directories under
    /// the root left empty by it. Missing files are expected when a batch failed
    /// part way through; other failures are logged and skipped.
    pub async fn discard(&self, refs: &[ObjectRef]) -> usize {
        let mut removed = 0;
        for object in refs {
            let Ok(path) = self.path_for(&object.key) else {
                continue;
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Unable to remove staged file"
                    );
                }
            }
            self.prune_parents(&path).await;
        }
        removed
    }

    /// Walks up from `path` towards the root, removing directories until one is
    /// still in use. The root itself is kept.
    async fn prune_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root.as_path() || !current.starts_with(&self.root) {
                break;
            }
            match tokio::fs::remove_dir(current).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(_) => break,
            }
            dir = current.parent();
        }
    }
}
