use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::AppError;

/// Upper bound for a single attachment.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Declared content types we accept, with the extension each implies.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

const MAX_EXT_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("attachment exceeds the {MAX_UPLOAD_BYTES} byte limit")]
    TooLarge,
    #[error("content type is not an accepted image type")]
    UnsupportedType,
    #[error("file name is not a stored upload name")]
    BadName,
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::TooLarge => AppError::new(
                "UPLOADS/TOO_LARGE",
                "Attachment is larger than the 5 MiB limit",
            ),
            UploadError::UnsupportedType => AppError::new(
                "UPLOADS/UNSUPPORTED_MEDIA_TYPE",
                "Only JPEG, PNG and WEBP images are accepted",
            ),
            UploadError::BadName => {
                AppError::new("UPLOADS/MALFORMED", "Upload name is not valid")
            }
        }
    }
}

/// Owns the on-disk attachment store. Records point at files by generated
/// name only; cleanup is always driven from record mutation, so deletion here
/// is best-effort and a missing file is never an error.
#[derive(Debug, Clone)]
pub struct UploadStore {
    base: Arc<PathBuf>,
}

impl UploadStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Arc::new(base.into()),
        }
    }

    pub fn base(&self) -> &Path {
        self.base.as_path()
    }

    pub async fn ensure_dir(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(self.base.as_path())
            .await
            .map_err(|e| AppError::from(e).with_context("operation", "uploads_ensure_dir"))
    }

    /// Validate a buffered attachment and reject before anything touches disk.
    ///
    /// The declared content type must be an accepted image type and the magic
    /// bytes must agree, so a renamed binary does not slip through with an
    /// image content type.
    pub fn check(&self, content_type: Option<&str>, bytes: &[u8]) -> Result<(), UploadError> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge);
        }
        let declared = content_type.unwrap_or_default();
        if !ALLOWED_TYPES.iter().any(|(mime, _)| *mime == declared) {
            return Err(UploadError::UnsupportedType);
        }
        match infer::get(bytes) {
            Some(kind) if ALLOWED_TYPES.iter().any(|(mime, _)| *mime == kind.mime_type()) => Ok(()),
            _ => Err(UploadError::UnsupportedType),
        }
    }

    /// Store an already-validated attachment under a generated collision-free
    /// name, preserving the original extension where it is sane.
    pub async fn store(
        &self,
        original_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        self.check(content_type, bytes)?;

        let ext = original_name
            .and_then(sanitize_extension)
            .unwrap_or_else(|| {
                let declared = content_type.unwrap_or_default();
                ALLOWED_TYPES
                    .iter()
                    .find(|(mime, _)| *mime == declared)
                    .map(|(_, ext)| (*ext).to_string())
                    .unwrap_or_else(|| "bin".to_string())
            });
        let name = format!("{}.{ext}", Uuid::now_v7().simple());

        let path = self.base.join(&name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            AppError::from(e)
                .with_context("operation", "uploads_store")
                .with_context("name", name.clone())
        })?;
        tracing::info!(
            target = "foundling",
            event = "upload_stored",
            name = %name,
            bytes = bytes.len()
        );
        Ok(name)
    }

    /// Best-effort delete. Absence is fine; other failures are logged and
    /// swallowed so record cleanup never fails on the filesystem side.
    pub async fn remove(&self, name: &str) {
        let path = match self.resolve(name) {
            Ok(path) => path,
            Err(_) => {
                tracing::warn!(target = "foundling", event = "upload_remove_bad_name", name = %name);
                return;
            }
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(target = "foundling", event = "upload_removed", name = %name);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    target = "foundling",
                    event = "upload_remove_failed",
                    name = %name,
                    error = %e
                );
            }
        }
    }

    /// Resolve a stored name to its on-disk path. Only plain generated names
    /// pass; anything with separators or relative segments is rejected.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, UploadError> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
            || name.starts_with('.')
        {
            return Err(UploadError::BadName);
        }
        Ok(self.base.join(name))
    }
}

/// Extract a usable lower-case extension from a client-supplied file name.
/// The name itself is never used for storage, so this is the only part of it
/// that survives.
fn sanitize_extension(original_name: &str) -> Option<String> {
    let ext = original_name.rsplit_once('.')?.1.to_ascii_lowercase();
    if ext.is_empty()
        || ext.len() > MAX_EXT_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext)
}
