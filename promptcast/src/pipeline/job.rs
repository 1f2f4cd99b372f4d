//! Work items passed between pipeline stages.
//!
//! Every item is an immutable value that travels through exactly one queue
//! hop. A stage "transforms" an item by consuming it and creating a new item
//! of a different kind:
//!
//! ```text
//! GenerationRequest ──generate──► StoreRequest (small) + UpscaleRequest
//! UpscaleRequest    ──upscale───► StoreRequest (big)
//! StoreRequest      ──store─────► file on disk
//! ```

use super::folder::folder_name;
use std::fmt;
use uuid::Uuid;

/// Separator placed between a phrase and its suffix.
pub const DESCRIPTION_SEPARATOR: &str = ", ";

/// Identifier correlating one generated image across stages.
///
/// The small and big variants of the same image share an id. Ids are random
/// (UUID v4) and therefore unique across runs as well as within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Creates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for ImageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Base64-encoded image data as returned by the remote services.
///
/// The payload stays encoded until the store stage; nothing in between needs
/// the raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload(String);

impl ImagePayload {
    /// Wraps base64 text.
    pub fn new(base64: impl Into<String>) -> Self {
        Self(base64.into())
    }

    /// Returns the base64 text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the encoded text in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Payloads are hundreds of kilobytes; keep them out of debug output.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImagePayload({} bytes)", self.0.len())
    }
}

impl From<String> for ImagePayload {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ImagePayload {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which variant of an image is being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// The image as produced by the generator
    Small,
    /// The upscaled image
    Big,
}

impl Variant {
    /// File name suffix for this variant.
    pub fn suffix(&self) -> &'static str {
        match self {
            Variant::Small => "small",
            Variant::Big => "big",
        }
    }

    /// Returns true for the upscaled variant.
    #[inline]
    pub fn is_upscaled(&self) -> bool {
        matches!(self, Variant::Big)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Joins a phrase and a suffix into one prompt.
pub fn describe(phrase: &str, suffix: &str) -> String {
    [phrase, suffix].join(DESCRIPTION_SEPARATOR)
}

/// A prompt waiting for image generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub description: String,
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Expands phrases and suffixes into requests.
    ///
    /// Each `(phrase, suffix)` pair is requested `count` times, phrases in the
    /// outer loop and suffixes in the inner loop. Duplicates are intentional:
    /// every copy yields a different set of images.
    pub fn cross_product<'a>(
        phrases: &'a [String],
        suffixes: &'a [String],
        count: usize,
    ) -> impl Iterator<Item = GenerationRequest> + 'a {
        phrases.iter().flat_map(move |phrase| {
            suffixes.iter().flat_map(move |suffix| {
                let description = describe(phrase, suffix);
                std::iter::repeat(description)
                    .take(count)
                    .map(GenerationRequest::new)
            })
        })
    }

    /// Output folder for every image generated from this request.
    pub fn folder(&self) -> String {
        folder_name(&self.description)
    }
}

/// A generated image waiting to be upscaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscaleRequest {
    pub folder: String,
    pub id: ImageId,
    pub image: ImagePayload,
}

impl UpscaleRequest {
    pub fn new(folder: impl Into<String>, id: ImageId, image: ImagePayload) -> Self {
        Self {
            folder: folder.into(),
            id,
            image,
        }
    }

    /// Builds the big-variant store request for the upscaled result.
    pub fn into_store_request(self, upscaled: ImagePayload) -> StoreRequest {
        StoreRequest::big(self.folder, self.id, upscaled)
    }
}

/// An image variant waiting to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub folder: String,
    pub id: ImageId,
    pub image: ImagePayload,
    pub variant: Variant,
}

impl StoreRequest {
    /// Store request for a freshly generated image.
    pub fn small(folder: impl Into<String>, id: ImageId, image: ImagePayload) -> Self {
        Self {
            folder: folder.into(),
            id,
            image,
            variant: Variant::Small,
        }
    }

    /// Store request for an upscaled image.
    pub fn big(folder: impl Into<String>, id: ImageId, image: ImagePayload) -> Self {
        Self {
            folder: folder.into(),
            id,
            image,
            variant: Variant::Big,
        }
    }

    #[inline]
    pub fn is_upscaled(&self) -> bool {
        self.variant.is_upscaled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_describe_joins_with_comma() {
        assert_eq!(describe("cat", "in space"), "cat, in space");
    }

    #[test]
    fn test_cross_product_order_and_repeats() {
        let phrases = strings(&["cat", "dog"]);
        let suffixes = strings(&["in space", "oil painting"]);

        let descriptions: Vec<String> = GenerationRequest::cross_product(&phrases, &suffixes, 2)
            .map(|r| r.description)
            .collect();

        assert_eq!(
            descriptions,
            vec![
                "cat, in space",
                "cat, in space",
                "cat, oil painting",
                "cat, oil painting",
                "dog, in space",
                "dog, in space",
                "dog, oil painting",
                "dog, oil painting",
            ]
        );
    }

    #[test]
    fn test_cross_product_empty_inputs() {
        let phrases = strings(&["cat"]);
        let none: Vec<String> = Vec::new();

        assert_eq!(GenerationRequest::cross_product(&phrases, &none, 3).count(), 0);
        assert_eq!(GenerationRequest::cross_product(&none, &phrases, 3).count(), 0);
        assert_eq!(GenerationRequest::cross_product(&phrases, &phrases, 0).count(), 0);
    }

    #[test]
    fn test_generation_request_folder() {
        let request = GenerationRequest::new("cat, in space");
        assert_eq!(request.folder(), "cat_in_space");
    }

    #[test]
    fn test_image_ids_are_unique() {
        let ids: HashSet<ImageId> = (0..1000).map(|_| ImageId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_image_id_display_is_hyphenated_uuid() {
        let id = ImageId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text, id.as_uuid().to_string());
    }

    #[test]
    fn test_upscale_request_becomes_big_store_request() {
        let id = ImageId::new();
        let request = UpscaleRequest::new("cat_in_space", id, ImagePayload::from("small"));

        let store = request.into_store_request(ImagePayload::from("big"));

        assert_eq!(store.id, id);
        assert_eq!(store.folder, "cat_in_space");
        assert_eq!(store.variant, Variant::Big);
        assert!(store.is_upscaled());
        assert_eq!(store.image.as_str(), "big");
    }

    #[test]
    fn test_variant_suffixes() {
        assert_eq!(Variant::Small.suffix(), "small");
        assert_eq!(Variant::Big.suffix(), "big");
        assert!(!StoreRequest::small("f", ImageId::new(), "x".into()).is_upscaled());
    }

    #[test]
    fn test_payload_debug_hides_content() {
        let payload = ImagePayload::from("aGVsbG8=");
        assert_eq!(format!("{:?}", payload), "ImagePayload(8 bytes)");
    }
}
