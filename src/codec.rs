use crate::error::{PixshardError, Result};
use crate::pipeline::CHANNELS;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Largest RGBA buffer accepted for one image
/// The encrypted frame header records the content length as a u32.
pub const MAX_IMAGE_BYTES: usize = u32::MAX as usize;

/// Decoded RGBA8 pixel buffer, row-major, 4 bytes per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RawImage {
    /// Wrap an existing buffer, checking it holds exactly `width * height` RGBA pixels
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(PixshardError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Zero-filled (transparent black) image
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; Self::byte_len(width, height)],
        }
    }

    /// Buffer length for `width * height` RGBA pixels, saturating at `usize::MAX`
    pub fn byte_len(width: u32, height: u32) -> usize {
        Self::checked_byte_len(width, height).unwrap_or(usize::MAX)
    }

    /// Buffer length for untrusted dimensions; `None` when it does not fit `usize`
    pub fn checked_byte_len(width: u32, height: u32) -> Option<usize> {
        (width as u64)
            .checked_mul(height as u64)?
            .checked_mul(CHANNELS as u64)
            .and_then(|len| usize::try_from(len).ok())
    }

    /// Whether the dimensions are non-zero and within [`MAX_IMAGE_BYTES`]
    pub fn is_supported_size(width: u32, height: u32) -> bool {
        width > 0
            && height > 0
            && Self::checked_byte_len(width, height).is_some_and(|len| len <= MAX_IMAGE_BYTES)
    }
}

/// Decode PNG/JPEG bytes into RGBA8
/// `context` names the input in the error message (e.g. "fragment 2")
pub fn decode(bytes: &[u8], context: &str) -> Result<RawImage> {
    let decoded = image::load_from_memory(bytes).map_err(|source| PixshardError::ImageDecode {
        context: context.to_string(),
        source,
    })?;
    let rgba = decoded.into_rgba8();
    let (width, height) = rgba.dimensions();
    RawImage::new(width, height, rgba.into_raw())
}

/// Encode an RGBA8 image as PNG
pub fn encode_png(image: &RawImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            &image.data,
            image.width,
            image.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(PixshardError::ImageEncode)?;
    Ok(out)
}
