//! Attachment upload pipeline.
//!
//! Every gate runs before anything is written: size, content sniffing, type
//! allow-list, extension cross-check, path construction, traversal guard and
//! symlink guard. Only then is the file created and the owning record updated.

use crate::models::StoredAttachment;
use crate::services::media::{self, StoreError};
use crate::Database;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "application/pdf"];

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "pdf"];

/// Extensions accepted for each allowed type. The first entry is the one
/// used when the client supplied none.
const EXTENSION_TABLE: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/gif", &["gif"]),
    ("application/pdf", &["pdf"]),
];

const TRAVERSAL_DETECTED: &str = "Path traversal attempt detected";
const SYMLINK_DETECTED: &str = "Symlinks in path are not allowed";
const DESTINATION_EXISTS: &str = "Destination file already exists";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File size exceeds {limit} bytes limit")]
    Oversized { size: usize, limit: usize },

    #[error("Could not determine file type")]
    UnknownContentType,

    #[error("File type {0} is not supported")]
    UnsupportedMediaType(String),

    #[error("File extension .{extension} does not match MIME type {mime_type}")]
    ExtensionMismatch {
        extension: String,
        mime_type: String,
    },

    #[error("{0}")]
    InvalidPath(&'static str),

    #[error("Media item not found")]
    MediaNotFound,

    #[error("No storage extension is mapped for detected type {0}")]
    UnmappedType(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for UploadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::MediaNotFound,
            other => Self::Store(other),
        }
    }
}

pub fn expected_extensions(mime_type: &str) -> Option<&'static [&'static str]> {
    EXTENSION_TABLE
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, extensions)| *extensions)
}

/// Determines the content type from magic bytes alone.
pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.mime_type())
}

/// Lower-cased extension of a client-supplied filename, if it has one.
pub fn declared_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Source of the random part of stored filenames.
pub trait FileNamer: Send + Sync {
    fn token(&self) -> String;
}

pub struct RandomNamer;

impl FileNamer for RandomNamer {
    fn token(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspection {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// A destination that passed every check but has not been written yet.
#[derive(Debug)]
pub struct PendingFile {
    pub file_name: String,
    pub path: PathBuf,
    pub mime_type: &'static str,
}

impl PendingFile {
    /// Creates the file, refusing to touch anything that already exists at
    /// the destination (including a dangling symlink).
    /// A failed write or sync removes the partly written file.
    fn write(&self, data: &[u8]) -> io::Result<()> {
        self.write_with(data, |file, data| {
            file.write_all(data)?;
            file.sync_all()
        })
    }

    fn write_with<F>(&self, data: &[u8], fill: F) -> io::Result<()>
    where
        F: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        if let Err(e) = fill(&mut file, data) {
            drop(file);
            self.discard();
            return Err(e);
        }
        Ok(())
    }

    fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove unreferenced upload");
        }
    }
}

pub struct UploadGuard {
    root: PathBuf,
    max_size: usize,
    namer: Box<dyn FileNamer>,
}

impl UploadGuard {
    pub fn new(root: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            root: root.into(),
            max_size,
            namer: Box::new(RandomNamer),
        }
    }

    pub fn with_namer(mut self, namer: impl FileNamer + 'static) -> Self {
        self.namer = Box::new(namer);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content checks: size, sniffed type, allow-list and extension.
    pub fn inspect(&self, data: &[u8], declared_filename: &str) -> Result<Inspection, UploadError> {
        if data.len() > self.max_size {
            return Err(UploadError::Oversized {
                size: data.len(),
                limit: self.max_size,
            });
        }

        let mime_type = sniff_mime_type(data).ok_or(UploadError::UnknownContentType)?;
        if !ALLOWED_MIME_TYPES.contains(&mime_type) {
            return Err(UploadError::UnsupportedMediaType(mime_type.to_string()));
        }

        let declared = declared_extension(declared_filename);
        if let (Some(extension), Some(expected)) = (&declared, expected_extensions(mime_type)) {
            if !expected.contains(&extension.as_str()) {
                return Err(UploadError::ExtensionMismatch {
                    extension: extension.clone(),
                    mime_type: mime_type.to_string(),
                });
            }
        }

        let extension = declared
            .and_then(|ext| ALLOWED_EXTENSIONS.iter().find(|e| **e == ext).copied())
            .or_else(|| expected_extensions(mime_type).and_then(|e| e.first().copied()))
            .ok_or_else(|| UploadError::UnmappedType(mime_type.to_string()))?;

        Ok(Inspection {
            mime_type,
            extension,
        })
    }

    /// Runs every gate and returns the destination to write. Creates the
    /// storage root if needed but never writes a file.
    pub fn prepare(&self, data: &[u8], declared_filename: &str) -> Result<PendingFile, UploadError> {
        let inspection = self.inspect(data, declared_filename)?;

        fs::create_dir_all(&self.root)?;
        let canonical_root = self.root.canonicalize()?;

        let file_name = format!("{}.{}", self.namer.token(), inspection.extension);
        let candidate = self.root.join(&file_name);

        let resolved = resolve_candidate(&candidate)?;
        if !resolved.starts_with(&canonical_root) {
            tracing::warn!(
                candidate = %candidate.display(),
                root = %canonical_root.display(),
                "Rejected upload path outside storage root"
            );
            return Err(UploadError::InvalidPath(TRAVERSAL_DETECTED));
        }

        reject_symlinks(&self.root, &candidate)?;

        if fs::symlink_metadata(&resolved).is_ok() {
            return Err(UploadError::InvalidPath(DESTINATION_EXISTS));
        }

        Ok(PendingFile {
            file_name,
            path: resolved,
            mime_type: inspection.mime_type,
        })
    }

    /// Removes a previously stored attachment by its stored name. Names that
    /// are not a single plain path component are ignored.
    pub fn discard(&self, stored_name: &str) {
        let path = Path::new(stored_name);
        if path.file_name().and_then(|n| n.to_str()) != Some(stored_name) {
            tracing::warn!(filename = %stored_name, "Refusing to remove attachment with a non-plain name");
            return;
        }

        let full = self.root.join(path);
        match fs::remove_file(&full) {
            Ok(()) => tracing::debug!(path = %full.display(), "Removed attachment"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %full.display(), error = %e, "Failed to remove attachment")
            }
        }
    }
}

/// Canonical form of a path whose final component does not exist yet.
fn resolve_candidate(candidate: &Path) -> Result<PathBuf, UploadError> {
    let name = candidate
        .file_name()
        .ok_or(UploadError::InvalidPath(TRAVERSAL_DETECTED))?;
    let parent = candidate
        .parent()
        .ok_or(UploadError::InvalidPath(TRAVERSAL_DETECTED))?
        .canonicalize()
        .map_err(|_| UploadError::InvalidPath(TRAVERSAL_DETECTED))?;
    Ok(parent.join(name))
}

/// Checks every directory from the configured root down to the candidate's
/// parent, on the unresolved path.
fn reject_symlinks(root: &Path, candidate: &Path) -> Result<(), UploadError> {
    for ancestor in candidate.ancestors().skip(1) {
        if !ancestor.starts_with(root) {
            break;
        }
        let is_symlink = fs::symlink_metadata(ancestor)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if is_symlink {
            tracing::warn!(path = %ancestor.display(), "Rejected upload path through symlink");
            return Err(UploadError::InvalidPath(SYMLINK_DETECTED));
        }
    }
    Ok(())
}

/// Full pipeline for one upload: every gate, then the file write and the
/// record update as a single unit. Nothing is left on disk when the record
/// is gone or the update fails. A replaced attachment file is removed.
pub fn validate_and_store(
    db: &Database,
    guard: &UploadGuard,
    media_id: Uuid,
    data: &[u8],
    declared_filename: &str,
) -> Result<StoredAttachment, UploadError> {
    let pending = guard.prepare(data, declared_filename)?;

    let mut written = false;
    let result = media::replace_attachment(db, media_id, &pending.file_name, || {
        pending.write(data)?;
        written = true;
        Ok::<(), UploadError>(())
    });

    match result {
        Ok(previous) => {
            tracing::info!(
                media_id = %media_id,
                filename = %pending.file_name,
                mime_type = pending.mime_type,
                size_bytes = data.len(),
                "Attachment stored"
            );
            if let Some(previous) = previous {
                guard.discard(&previous);
            }
            Ok(StoredAttachment::uploaded(pending.file_name))
        }
        Err(e) => {
            if written {
                pending.discard();
            }
            Err(e)
        }
    }
}
