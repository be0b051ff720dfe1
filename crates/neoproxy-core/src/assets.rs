//! Substitute payload lookup.
//!
//! Payloads live at `<root>/<game name>/<swf file name>`. A missing file is
//! the common case and is reported as `Ok(None)`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::AssetError;
use crate::registry::ResourceName;

/// Read-by-path primitive backing the resolver.
pub trait AssetStore: Send + Sync {
    /// Reads the whole file at `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Local filesystem store.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAssetStore;

impl AssetStore for FsAssetStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Resolves `(game name, file name)` pairs to payload bytes.
#[derive(Clone)]
pub struct AssetResolver {
    root: PathBuf,
    store: Arc<dyn AssetStore>,
}

impl std::fmt::Debug for AssetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetResolver")
            .field("root", &self.root)
            .field("store", &"AssetStore")
            .finish()
    }
}

impl AssetResolver {
    /// Creates a resolver over the local filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_store(root, Arc::new(FsAssetStore))
    }

    /// Creates a resolver over a custom store.
    pub fn with_store(root: impl Into<PathBuf>, store: Arc<dyn AssetStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Builds the payload path for a game name and asset file name.
    pub fn path_for(&self, name: &ResourceName, file_name: &str) -> Result<PathBuf, AssetError> {
        check_component(name.as_str())?;
        check_component(file_name)?;
        Ok(self.root.join(name.as_str()).join(file_name))
    }

    /// Reads the substitute payload, `Ok(None)` if there is none.
    pub fn resolve(&self, name: &ResourceName, file_name: &str) -> Result<Option<Bytes>, AssetError> {
        let path = self.path_for(name, file_name)?;
        match self.store.read(&path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(AssetError::Io { path, source }),
        }
    }
}

/// Names scraped from pages end up as path components; keep them inside the root.
fn check_component(component: &str) -> Result<(), AssetError> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\'])
    {
        return Err(AssetError::InvalidPath(component.to_string()));
    }
    Ok(())
}
