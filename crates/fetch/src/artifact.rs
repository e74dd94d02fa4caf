//! Decoded images.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use tracing::instrument;

/// A decoded image.
///
/// Only ever built from bytes that decoded successfully. Cloning is cheap:
/// every clone shares the same pixel buffer, which is what lets one fetch be
/// handed to any number of listeners and both cache tiers.
#[derive(Clone)]
pub struct Artifact {
    image: Arc<DynamicImage>,
}

impl Artifact {
    /// Decode raw bytes, sniffing the format from their content.
    ///
    /// This is CPU-bound; async callers should run it on the blocking pool.
    #[instrument(skip_all, fields(input_size = bytes.len()))]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).or_raise(|| ErrorKind::Decode)?;
        Ok(Self::from(image))
    }

    /// Encode for the disk tier.
    ///
    /// PNG is lossless, so decoding the result gives back the same pixels.
    #[instrument(skip_all, fields(width = self.width(), height = self.height(), output_size))]
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut output = Cursor::new(Vec::new());
        self.image.write_to(&mut output, ImageFormat::Png).or_raise(|| ErrorKind::Encode)?;
        let output = output.into_inner();
        tracing::Span::current().record("output_size", output.len());
        Ok(output)
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether both handles share one decoded buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}
impl From<DynamicImage> for Artifact {
    fn from(image: DynamicImage) -> Self {
        Self { image: Arc::new(image) }
    }
}
impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color", &self.image.color())
            .finish()
    }
}
/// Pixel equality; two artifacts decoded from the same bytes are equal.
impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.width() == other.width()
                && self.height() == other.height()
                && self.image.color() == other.image.color()
                && self.image.as_bytes() == other.image.as_bytes())
    }
}
