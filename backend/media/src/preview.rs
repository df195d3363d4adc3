//! Ordered collection of pending images shown as previews.

use kaitai_core::{ImageId, MAX_IMAGES, PendingImage};
use tracing::info;

/// What happened to a batch appended to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendReport {
    /// Ids kept, in order.
    pub accepted: Vec<ImageId>,
    /// Ids dropped because the collection was capped.
    pub dropped: Vec<ImageId>,
}

/// Insertion-ordered store capped at [`MAX_IMAGES`].
#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    images: Vec<PendingImage>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch, then keep only the first [`MAX_IMAGES`] entries.
    ///
    /// Excess images are dropped without error; the report lists them.
    pub fn append(&mut self, batch: Vec<PendingImage>) -> AppendReport {
        let mut report = AppendReport::default();
        for image in batch {
            if self.images.len() < MAX_IMAGES {
                report.accepted.push(image.id());
                self.images.push(image);
            } else {
                report.dropped.push(image.id());
            }
        }
        if !report.dropped.is_empty() {
            info!(
                dropped = report.dropped.len(),
                limit = MAX_IMAGES,
                "Image limit reached; extra photos were not added"
            );
        }
        report
    }

    /// Remove an image by id. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &ImageId) -> bool {
        let before = self.images.len();
        self.images.retain(|image| image.id() != *id);
        self.images.len() != before
    }

    pub fn get(&self, id: &ImageId) -> Option<&PendingImage> {
        self.images.iter().find(|image| image.id() == *id)
    }

    pub fn images(&self) -> &[PendingImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.images.len() >= MAX_IMAGES
    }
}
