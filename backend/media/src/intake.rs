//! Intake surface: turn user-selected files into pending images.
//!
//! Files in a batch are decoded concurrently and joined; the output keeps
//! submission order no matter which decode finishes first.

use std::path::PathBuf;

use bytes::Bytes;
use futures::future::join_all;
use kaitai_core::{ImageFile, PendingImage};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::data_url::encode_data_url;
use crate::mime_detect::{OCTET_STREAM, detect_mime_type, sniff_mime_type};

/// A file handle as handed over by the calling surface.
#[derive(Debug, Clone)]
pub enum SelectedFile {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An in-memory upload, e.g. one multipart field.
    Upload {
        name: String,
        mime_type: Option<String>,
        bytes: Bytes,
    },
}

impl SelectedFile {
    pub fn upload(name: impl Into<String>, mime_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self::Upload {
            name: name.into(),
            mime_type,
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Upload { name, .. } => name.clone(),
        }
    }
}

impl From<PathBuf> for SelectedFile {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is empty")]
    Empty(String),
}

/// Decode a single file into a pending image with a data-URL preview.
pub async fn decode_file(file: SelectedFile) -> Result<PendingImage, IntakeError> {
    let name = file.name();
    let (declared, bytes) = match file {
        SelectedFile::Path(path) => {
            let bytes = fs::read(&path).await.map_err(|source| IntakeError::Read {
                name: name.clone(),
                source,
            })?;
            let detected = detect_mime_type(&path);
            let declared = (detected != OCTET_STREAM).then(|| detected.to_string());
            (declared, Bytes::from(bytes))
        }
        SelectedFile::Upload { mime_type, bytes, .. } => (mime_type, bytes),
    };

    if bytes.is_empty() {
        return Err(IntakeError::Empty(name));
    }

    let mime_type = declared
        .filter(|m| !m.trim().is_empty())
        .or_else(|| sniff_mime_type(&bytes).map(str::to_string))
        .unwrap_or_else(|| OCTET_STREAM.to_string());

    let preview = encode_data_url(&mime_type, &bytes);
    debug!(name = %name, mime = %mime_type, size = bytes.len(), "Decoded image");
    Ok(PendingImage::new(ImageFile::new(name, mime_type, bytes), preview))
}

/// Decode a batch of selected files.
///
/// Unreadable files are skipped without affecting their siblings. The
/// result is in submission order.
pub async fn submit_files(selected: Vec<SelectedFile>) -> Vec<PendingImage> {
    if selected.is_empty() {
        return Vec::new();
    }

    let submitted = selected.len();
    let results = join_all(selected.into_iter().map(decode_file)).await;

    let mut images = Vec::with_capacity(submitted);
    for result in results {
        match result {
            Ok(image) => images.push(image),
            Err(e) => warn!(error = %e, "Skipping unreadable file"),
        }
    }

    debug!(submitted, decoded = images.len(), "Decoded submission batch");
    images
}
