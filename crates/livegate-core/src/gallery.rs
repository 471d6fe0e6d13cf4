//! Enrolled identities and their reference descriptors.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::source::EmbeddingSource;
use crate::types::{Descriptor, Frame};

/// One enrolled identity with all of its reference descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    label: String,
    descriptors: Vec<Descriptor>,
}

impl GalleryEntry {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Never empty.
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }
}

/// Immutable label -> descriptors mapping, iterated in lexicographic label
/// order.
///
/// A gallery is never mutated after it is built. Enrolling a new identity
/// builds a new gallery and publishes it through a [`GalleryHandle`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gallery {
    entries: BTreeMap<String, GalleryEntry>,
    dimension: Option<usize>,
}

impl Gallery {
    /// A gallery with no enrolled identities. Matching against it fails
    /// with `EmptyGallery` until an identity is enrolled.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from precomputed descriptors. Repeated labels accumulate; label
    /// comparison is exact and case-sensitive.
    pub fn from_descriptors<I, S>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Descriptor)>,
        S: Into<String>,
    {
        let mut entries: BTreeMap<String, GalleryEntry> = BTreeMap::new();
        let mut dimension = None;

        for (label, descriptor) in descriptors {
            let expected = *dimension.get_or_insert(descriptor.dimension());
            if descriptor.dimension() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: descriptor.dimension(),
                });
            }

            let label = label.into();
            entries
                .entry(label.clone())
                .or_insert_with(|| GalleryEntry {
                    label,
                    descriptors: Vec::new(),
                })
                .descriptors
                .push(descriptor);
        }

        if dimension.is_none() {
            return Err(Error::EmptyGallery);
        }
        Ok(Self { entries, dimension })
    }

    /// Build from reference images, extracting one descriptor per image.
    ///
    /// A reference image with no detectable face, or one the source fails on,
    /// is skipped with a warning; a single bad photo must not lock every other
    /// identity out. Fails with `EmptyGallery` if nothing survives.
    pub async fn build<E, I, S>(source: &E, references: I) -> Result<Self>
    where
        E: EmbeddingSource + ?Sized,
        I: IntoIterator<Item = (S, Frame)>,
        S: Into<String>,
    {
        let mut descriptors = Vec::new();
        let mut skipped = 0usize;

        for (label, frame) in references {
            let label = label.into();
            match source.embedding(&frame).await {
                Ok(Some(descriptor)) => descriptors.push((label, descriptor)),
                Ok(None) => {
                    skipped += 1;
                    tracing::warn!(label = %label, frame = %frame.id, "no face in reference image, skipping");
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(label = %label, frame = %frame.id, error = %e, "reference image extraction failed, skipping");
                }
            }
        }

        let gallery = Self::from_descriptors(descriptors)?;
        tracing::info!(
            identities = gallery.len(),
            descriptors = gallery.descriptor_count(),
            dimension = ?gallery.dimension(),
            skipped,
            "gallery built"
        );
        Ok(gallery)
    }

    /// A new gallery holding every current descriptor plus `descriptor`
    /// under `label`.
    pub fn with_descriptor(&self, label: impl Into<String>, descriptor: Descriptor) -> Result<Self> {
        let existing = self
            .entries()
            .flat_map(|e| e.descriptors.iter().map(move |d| (e.label.clone(), d.clone())));
        Self::from_descriptors(existing.chain(std::iter::once((label.into(), descriptor))))
    }

    /// Entries in lexicographic label order.
    pub fn entries(&self) -> impl Iterator<Item = &GalleryEntry> {
        self.entries.values()
    }

    pub fn get(&self, label: &str) -> Option<&GalleryEntry> {
        self.entries.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total reference descriptors across all identities.
    pub fn descriptor_count(&self) -> usize {
        self.entries.values().map(|e| e.descriptors.len()).sum()
    }

    /// Dimensionality shared by every descriptor, `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

/// Shared, atomically replaceable reference to the current gallery.
///
/// Readers take an `Arc` snapshot and match against it without holding the
/// lock; a reload swaps the whole `Arc`, so an in-flight match sees either
/// the old gallery or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct GalleryHandle {
    current: Arc<RwLock<Arc<Gallery>>>,
}

impl GalleryHandle {
    pub fn new(gallery: Gallery) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(gallery))),
        }
    }

    pub fn snapshot(&self) -> Arc<Gallery> {
        // A poisoned lock still holds a complete Arc: writers only swap it.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Publish `gallery`, returning the one it replaced.
    pub fn replace(&self, gallery: Gallery) -> Arc<Gallery> {
        let next = Arc::new(gallery);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let previous = std::mem::replace(&mut *guard, next);
        tracing::info!(
            identities = guard.len(),
            descriptors = guard.descriptor_count(),
            "gallery replaced"
        );
        previous
    }

    /// Rebuild the current gallery with one more descriptor and publish the
    /// result.
    ///
    /// The rebuild runs under the write lock so concurrent enrollments are
    /// serialised and none is lost; readers keep their existing snapshots.
    pub fn enroll(&self, label: impl Into<String>, descriptor: Descriptor) -> Result<Arc<Gallery>> {
        let label = label.into();
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let next = Arc::new(guard.with_descriptor(label.clone(), descriptor)?);
        *guard = Arc::clone(&next);
        tracing::info!(
            label = %label,
            identities = next.len(),
            descriptors = next.descriptor_count(),
            "identity enrolled"
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use async_trait::async_trait;

    fn d(values: &[f32]) -> Descriptor {
        Descriptor::new(values.to_vec()).unwrap()
    }

    /// Embedding source keyed on the frame id: "nf-*" has no face, "err-*"
    /// fails, anything else maps to a descriptor derived from its length.
    struct CannedEmbeddings;

    #[async_trait]
    impl EmbeddingSource for CannedEmbeddings {
        async fn embedding(&self, frame: &Frame) -> Result<Option<Descriptor>, SourceError> {
            if frame.id.starts_with("nf-") {
                return Ok(None);
            }
            if frame.id.starts_with("err-") {
                return Err(SourceError::Model("decode failed".to_string()));
            }
            Ok(Some(d(&[frame.id.len() as f32, 1.0])))
        }
    }

    fn frame(id: &str) -> Frame {
        Frame::new(id, 1, 1, vec![0, 0, 0])
    }

    #[test]
    fn test_duplicate_labels_accumulate() {
        let g = Gallery::from_descriptors([
            ("alice", d(&[0.0, 0.0])),
            ("bob", d(&[1.0, 1.0])),
            ("alice", d(&[0.5, 0.5])),
        ])
        .unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.descriptor_count(), 3);
        assert_eq!(g.get("alice").unwrap().descriptors().len(), 2);
        assert_eq!(g.dimension(), Some(2));
    }

    #[test]
    fn test_labels_case_sensitive_and_sorted() {
        let g = Gallery::from_descriptors([
            ("bob", d(&[0.0])),
            ("Alice", d(&[0.0])),
            ("alice", d(&[0.0])),
        ])
        .unwrap();
        let labels: Vec<&str> = g.labels().collect();
        assert_eq!(labels, vec!["Alice", "alice", "bob"]);
    }

    #[test]
    fn test_empty_input_is_empty_gallery() {
        let err = Gallery::from_descriptors(Vec::<(String, Descriptor)>::new()).unwrap_err();
        assert_eq!(err, Error::EmptyGallery);
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let err =
            Gallery::from_descriptors([("a", d(&[0.0, 0.0])), ("b", d(&[0.0, 0.0, 0.0]))])
                .unwrap_err();
        assert_eq!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[tokio::test]
    async fn test_build_skips_faceless_reference() {
        let refs = vec![
            ("a", frame("a.jpg")),
            ("b", frame("b.jpg")),
            ("c", frame("nf-c.jpg")),
            ("d", frame("d.jpg")),
            ("e", frame("e.jpg")),
        ];
        let g = Gallery::build(&CannedEmbeddings, refs).await.unwrap();
        assert_eq!(g.len(), 4);
        assert!(g.get("c").is_none());
    }

    #[tokio::test]
    async fn test_build_skips_failing_reference() {
        let refs = vec![("a", frame("a.jpg")), ("b", frame("err-b.jpg"))];
        let g = Gallery::build(&CannedEmbeddings, refs).await.unwrap();
        assert_eq!(g.labels().collect::<Vec<_>>(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_build_all_faceless_is_empty_gallery() {
        let refs = vec![("a", frame("nf-a.jpg")), ("b", frame("nf-b.jpg"))];
        let err = Gallery::build(&CannedEmbeddings, refs).await.unwrap_err();
        assert_eq!(err, Error::EmptyGallery);
    }

    #[test]
    fn test_handle_replace_keeps_old_snapshot_intact() {
        let handle = GalleryHandle::new(Gallery::from_descriptors([("a", d(&[0.0]))]).unwrap());
        let before = handle.snapshot();

        handle.replace(Gallery::from_descriptors([("b", d(&[1.0])), ("c", d(&[2.0]))]).unwrap());

        assert_eq!(before.labels().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(handle.snapshot().labels().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_enroll_into_empty_gallery() {
        let handle = GalleryHandle::new(Gallery::empty());
        assert!(handle.snapshot().is_empty());
        assert_eq!(handle.snapshot().dimension(), None);

        let after = handle.enroll("a", d(&[1.0, 2.0])).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after.dimension(), Some(2));
    }

    #[test]
    fn test_handle_enroll_appends() {
        let handle = GalleryHandle::new(Gallery::from_descriptors([("a", d(&[0.0]))]).unwrap());
        let after = handle.enroll("a", d(&[1.0])).unwrap();
        assert_eq!(after.get("a").unwrap().descriptors().len(), 2);

        let err = handle.enroll("z", d(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(handle.snapshot().len(), 1);
    }
}
