#![forbid(unsafe_code)]

//! Reader for the update shipped inside the running binary.

use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;
use updraft_core::{Asset, Update};
use updraft_platform::IoPool;

use crate::error::{LaunchError, LaunchResult};

/// File name of the manifest inside the embedded resource directory.
pub const EMBEDDED_MANIFEST_FILENAME: &str = "app.manifest";

/// The update statically bundled with the binary and the assets it is made of.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedManifest {
    pub update: Update,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl EmbeddedManifest {
    pub fn launch_asset(&self) -> Option<&Asset> {
        self.assets.iter().find(|a| a.is_launch_asset)
    }

    pub fn asset(&self, key: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.key == key)
    }
}

/// Access to the binary's static resources.
pub trait EmbeddedBundle: Send + Sync {
    /// The embedded update, independent of any record store. `None` if the binary ships none.
    fn embedded_manifest(&self) -> Option<&EmbeddedManifest>;

    /// Location of an embedded resource, or `None` if the name cannot refer to one.
    fn resource_path(&self, main_bundle_filename: &str) -> Option<PathBuf>;
}

/// Embedded resources laid out in one directory, described by [`EMBEDDED_MANIFEST_FILENAME`].
#[derive(Clone, Debug)]
pub struct DirEmbeddedBundle {
    dir: PathBuf,
    manifest: Option<EmbeddedManifest>,
}

impl DirEmbeddedBundle {
    /// Read the manifest from `dir`. A missing manifest means the binary has no embedded update.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::EmbeddedManifest`] if the manifest exists but does not parse, or
    /// [`LaunchError::Io`] if it cannot be read.
    pub async fn open<P: Into<PathBuf>>(dir: P, pool: &IoPool) -> LaunchResult<Self> {
        let dir = dir.into();
        let path = dir.join(EMBEDDED_MANIFEST_FILENAME);
        let bytes = pool
            .run(move || match std::fs::read(&path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            })
            .await?;

        let manifest = match bytes {
            Some(bytes) => Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| LaunchError::EmbeddedManifest(e.to_string()))?,
            ),
            None => None,
        };
        debug!(dir = ?dir, embedded = manifest.is_some(), "embedded bundle opened");
        Ok(Self::from_parts(dir, manifest))
    }

    pub fn from_parts(dir: PathBuf, manifest: Option<EmbeddedManifest>) -> Self {
        Self { dir, manifest }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl EmbeddedBundle for DirEmbeddedBundle {
    fn embedded_manifest(&self) -> Option<&EmbeddedManifest> {
        self.manifest.as_ref()
    }

    fn resource_path(&self, main_bundle_filename: &str) -> Option<PathBuf> {
        let single_segment = !main_bundle_filename.is_empty()
            && main_bundle_filename != "."
            && main_bundle_filename != ".."
            && !main_bundle_filename.contains(['/', '\\', '\0']);
        single_segment.then(|| self.dir.join(main_bundle_filename))
    }
}
