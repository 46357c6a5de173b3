// fraud-core/src/interfaces/file_store.rs
// ============================================================================
// Module: File-Backed Artifact Store
// Description: Local-directory `ArtifactStore` implementation (§6.2).
// Purpose: Let tests and single-node deployments install rulesets without an
//          object-storage dependency; a real deployment swaps this for an
//          S3/GCS-backed implementation behind the same trait.
// Dependencies: crate::interfaces::{ArtifactStore, ...}, async_trait, tokio::fs
// ============================================================================

//! ## Overview
//! [`FileArtifactStore`] reads `manifest.json` and the sibling artifact body
//! it references from a directory tree rooted at one path per
//! `(ruleset_key, environment)` (§6.2 "Artifact layout (informational)...").
//! The runtime relies only on the manifest fields `version`, `artifact_uri`,
//! `checksum`, `schema_version`, `published_at` (§6.2); this store treats
//! `artifact_uri` as a path relative to the same directory the manifest was
//! read from, so a ruleset's manifest and its `ruleset.json` body live side
//! by side on disk.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::RulesetKey;
use crate::interfaces::ArtifactManifest;
use crate::interfaces::ArtifactStore;
use crate::interfaces::ArtifactStoreError;

/// Reads manifests and artifacts from a local directory tree (§6.2).
///
/// # Invariants
/// - The directory for `(key, environment)` is `root/{environment}/{key}/`;
///   it must contain `manifest.json` and the artifact file
///   `manifest.artifact_uri` points to, relative to that same directory.
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn manifest_dir(&self, key: &RulesetKey, environment: &str) -> PathBuf {
        self.root.join(environment).join(key.as_str())
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn fetch_manifest(
        &self,
        key: &RulesetKey,
        environment: &str,
    ) -> Result<ArtifactManifest, ArtifactStoreError> {
        let dir = self.manifest_dir(key, environment);
        let path = dir.join("manifest.json");
        let bytes = tokio::fs::read(&path).await.map_err(|err| ArtifactStoreError::ManifestFetch {
            key: key.as_str().to_string(),
            environment: environment.to_string(),
            detail: format!("{}: {err}", path.display()),
        })?;
        serde_json::from_slice(&bytes).map_err(|err| ArtifactStoreError::ManifestFetch {
            key: key.as_str().to_string(),
            environment: environment.to_string(),
            detail: err.to_string(),
        })
    }

    async fn fetch_artifact(&self, uri: &str) -> Result<Vec<u8>, ArtifactStoreError> {
        let path = Path::new(uri);
        let resolved = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };
        tokio::fs::read(&resolved).await.map_err(|err| ArtifactStoreError::ArtifactFetch {
            uri: uri.to_string(),
            detail: format!("{}: {err}", resolved.display()),
        })
    }
}
