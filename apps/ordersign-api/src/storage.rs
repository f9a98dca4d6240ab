//! Filesystem-backed artifact storage with public-URL addressing.
//!
//! Blobs live under a configured root directory and are dereferenced through
//! the API's own `/storage/<bucket>/<key>` route, so an uploaded key maps to
//! exactly one durable URL.

use crate::error::ApiError;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Single bucket, mirroring the original deployment.
pub const BUCKET: &str = "documents";

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: String,
    /// Overwrite an existing key. Off by default; callers avoid collisions
    /// by timestamp-qualifying every key.
    pub upsert: bool,
}

impl UploadOptions {
    pub fn pdf() -> Self {
        Self {
            content_type: "application/pdf".to_string(),
            cache_control: "3600".to_string(),
            upsert: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    public_base: String,
}

impl ArtifactStore {
    pub fn new(root: PathBuf, public_base: &str) -> Self {
        Self {
            root,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// Write an immutable blob under `key` and return the key.
    ///
    /// Fails with `KeyConflict` when the key exists and upsert is disabled.
    pub fn upload(&self, key: &str, bytes: &[u8], opts: &UploadOptions) -> Result<String, ApiError> {
        let path = self.blob_path(key)?;
        if !opts.upsert && path.exists() {
            return Err(ApiError::KeyConflict(key.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(transient)?;
        }
        fs::write(&path, bytes).map_err(transient)?;
        tracing::debug!(
            key,
            content_type = %opts.content_type,
            cache_control = %opts.cache_control,
            size = bytes.len(),
            "stored artifact"
        );
        Ok(key.to_string())
    }

    /// Durable, dereferenceable URL for an uploaded key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/storage/{}/{}", self.public_base, BUCKET, key)
    }

    /// Inverse of [`public_url`]; `None` for URLs this store never issued.
    ///
    /// [`public_url`]: ArtifactStore::public_url
    pub fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&format!("{}/storage/{}/", self.public_base, BUCKET))
            .map(str::to_string)
    }

    /// Full byte content for a URL previously returned by [`public_url`].
    ///
    /// [`public_url`]: ArtifactStore::public_url
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let key = self
            .key_for_url(url)
            .ok_or_else(|| ApiError::ArtifactNotFound(url.to_string()))?;
        self.read(&key)
    }

    /// Read a blob by key.
    pub fn read(&self, key: &str) -> Result<Vec<u8>, ApiError> {
        let path = self.blob_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ApiError::ArtifactNotFound(key.to_string()))
            }
            Err(e) => Err(transient(e)),
        }
    }

    /// Best-effort deletion, used when an order is removed.
    pub fn remove(&self, key: &str) {
        if let Ok(path) = self.blob_path(key) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::debug!(key, error = %e, "artifact removal skipped");
            }
        }
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, ApiError> {
        let valid = !key.is_empty()
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        if !valid {
            return Err(ApiError::InvalidRequest(format!(
                "invalid storage key: {key}"
            )));
        }
        Ok(self.root.join(key))
    }
}

/// Media type for serving a stored key.
pub fn content_type_for(key: &str) -> &'static str {
    if key.ends_with(".pdf") {
        "application/pdf"
    } else if key.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

fn transient(e: io::Error) -> ApiError {
    ApiError::TransientIo(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scratch_store() -> ArtifactStore {
        let root = std::env::temp_dir()
            .join("ordersign-storage-tests")
            .join(uuid::Uuid::new_v4().to_string());
        ArtifactStore::new(root, "http://localhost:3001")
    }

    #[test]
    fn upload_then_fetch_round_trips() {
        let store = scratch_store();
        let bytes = b"%PDF-1.7 fake".to_vec();
        store
            .upload("orders/1700000000000-budget.pdf", &bytes, &UploadOptions::pdf())
            .unwrap();

        let url = store.public_url("orders/1700000000000-budget.pdf");
        assert_eq!(store.fetch(&url).unwrap(), bytes);
    }

    #[test]
    fn second_upload_without_upsert_conflicts() {
        let store = scratch_store();
        let opts = UploadOptions::pdf();
        store.upload("signatures/1-signed.pdf", b"one", &opts).unwrap();
        assert!(matches!(
            store.upload("signatures/1-signed.pdf", b"two", &opts),
            Err(ApiError::KeyConflict(_))
        ));
        // Upsert opts in, and the overwrite goes through.
        let upsert = UploadOptions {
            upsert: true,
            ..opts
        };
        store.upload("signatures/1-signed.pdf", b"two", &upsert).unwrap();
        assert_eq!(store.read("signatures/1-signed.pdf").unwrap(), b"two");
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let store = scratch_store();
        assert!(matches!(
            store.read("orders/never-uploaded.pdf"),
            Err(ApiError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn foreign_urls_are_not_found() {
        let store = scratch_store();
        assert!(matches!(
            store.fetch("https://elsewhere.example/file.pdf"),
            Err(ApiError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn traversal_keys_are_rejected() {
        let store = scratch_store();
        for key in ["../escape.pdf", "orders//x.pdf", "", "/abs.pdf"] {
            assert!(
                matches!(
                    store.read(key),
                    Err(ApiError::InvalidRequest(_))
                ),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn key_for_url_inverts_public_url() {
        let store = scratch_store();
        let url = store.public_url("orders/1-a.pdf");
        assert_eq!(store.key_for_url(&url).as_deref(), Some("orders/1-a.pdf"));
        assert_eq!(store.key_for_url("http://other/storage/documents/x"), None);
    }
}
