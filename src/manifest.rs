use crate::codec::RawImage;
use crate::crypto::ALGORITHM;
use crate::error::{PixshardError, Result};
use crate::pipeline::{grid_dimensions, tiles, BlockShape, Seed, CHANNELS};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Manifest format version written by this build
pub const MANIFEST_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BLOCK_SIZE: u32 = 1;
pub const DEFAULT_PREFIX: &str = "img";

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

// Manifests written before the flag existed always shuffled across images
fn default_cross_image_shuffle() -> bool {
    true
}

/// Fully-resolved fragmentation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentationConfig {
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    pub seed: Seed,
    #[serde(default)]
    pub restore_file_name: bool,
    #[serde(default = "default_cross_image_shuffle")]
    pub cross_image_shuffle: bool,
    /// Number of fragment files; absent means one per source image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_count: Option<usize>,
}

impl FragmentationConfig {
    pub fn new(seed: Seed) -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            prefix: DEFAULT_PREFIX.to_string(),
            seed,
            restore_file_name: false,
            cross_image_shuffle: true,
            fragment_count: None,
        }
    }
}

/// Per-image geometry after the optional encryption step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGeometry {
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
    #[serde(rename = "c")]
    pub channels: u32,
    /// Block columns
    pub x: u32,
    /// Block rows
    pub y: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ImageGeometry {
    pub fn new(width: u32, height: u32, block_size: u32, name: Option<String>) -> Result<Self> {
        let (x, y) = grid_dimensions(width, height, block_size)?;
        Ok(Self {
            width,
            height,
            channels: CHANNELS as u32,
            x,
            y,
            name,
        })
    }

    pub fn block_count(&self) -> usize {
        self.x as usize * self.y as usize
    }

    /// Block shapes in split order
    pub fn block_shapes(&self, block_size: u32) -> Result<Vec<BlockShape>> {
        Ok(tiles(self.width, self.height, block_size)?
            .iter()
            .map(|tile| tile.shape())
            .collect())
    }
}

/// Everything needed to invert one fragmentation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub version: String,
    pub timestamp: String,
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    pub config: FragmentationConfig,
    pub images: Vec<ImageGeometry>,
}

impl Manifest {
    /// New manifest stamped with the current UTC time
    pub fn new(
        id: String,
        secure: bool,
        config: FragmentationConfig,
        images: Vec<ImageGeometry>,
    ) -> Self {
        Self {
            id,
            version: MANIFEST_VERSION.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            secure,
            algorithm: secure.then(|| ALGORITHM.to_string()),
            config,
            images,
        }
    }

    /// Serialize manifest to pretty JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deserialize and validate manifest JSON
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(data)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check internal consistency before driving a restore
    pub fn validate(&self) -> Result<()> {
        let config = &self.config;
        if config.block_size == 0 {
            return Err(PixshardError::InvalidManifest("blockSize must be positive".into()));
        }
        if config.prefix.is_empty() {
            return Err(PixshardError::InvalidManifest("prefix must not be empty".into()));
        }
        if config.fragment_count == Some(0) {
            return Err(PixshardError::InvalidManifest(
                "fragmentCount must be positive".into(),
            ));
        }
        if self.images.is_empty() {
            return Err(PixshardError::InvalidManifest("no images listed".into()));
        }

        match (self.secure, self.algorithm.as_deref()) {
            (true, Some(ALGORITHM)) | (false, None) => {}
            (true, Some(other)) => {
                return Err(PixshardError::UnsupportedAlgorithm(other.to_string()));
            }
            (true, None) => {
                return Err(PixshardError::InvalidManifest(
                    "secure manifest without algorithm".into(),
                ));
            }
            (false, Some(_)) => {
                return Err(PixshardError::InvalidManifest(
                    "algorithm set on an unsecured manifest".into(),
                ));
            }
        }

        let mut names = HashSet::new();
        for (index, image) in self.images.iter().enumerate() {
            let expected = grid_dimensions(image.width, image.height, config.block_size)?;
            if !RawImage::is_supported_size(image.width, image.height) {
                return Err(PixshardError::InvalidManifest(format!(
                    "image {} size {}x{} is out of range",
                    index + 1,
                    image.width,
                    image.height
                )));
            }
            if image.channels != CHANNELS as u32 || (image.x, image.y) != expected {
                return Err(PixshardError::InvalidManifest(format!(
                    "image {} geometry is inconsistent",
                    index + 1
                )));
            }
            if config.restore_file_name {
                if let Some(name) = &image.name {
                    if !names.insert(name.as_str()) {
                        return Err(PixshardError::InvalidManifest(format!(
                            "duplicate image name {:?}",
                            name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of fragment files the run produced
    pub fn fragment_count(&self) -> usize {
        self.config.fragment_count.unwrap_or(self.images.len())
    }

    /// Blocks across all images
    pub fn total_blocks(&self) -> usize {
        self.images.iter().map(ImageGeometry::block_count).sum()
    }

    /// `{prefix}_{index+1, zero-padded}[_fragmented].png`
    ///
    /// Padding is the digit count of the image count for restored images and
    /// of the fragment count for fragments.
    pub fn file_name(&self, index: usize, fragmented: bool) -> String {
        let total = if fragmented {
            self.fragment_count()
        } else {
            self.images.len()
        };
        let width = total.to_string().len();
        let suffix = if fragmented { "_fragmented" } else { "" };
        format!(
            "{}_{:0width$}{}.png",
            self.config.prefix,
            index + 1,
            suffix,
            width = width
        )
    }

    /// Output name for restored image `index`
    pub fn restored_file_name(&self, index: usize) -> String {
        match self.images.get(index).and_then(|g| g.name.as_deref()) {
            Some(name) if self.config.restore_file_name => format!("{}.png", name),
            _ => self.file_name(index, false),
        }
    }

    /// Conventional manifest file name for this run
    pub fn manifest_file_name(&self) -> String {
        format!("{}_manifest.json", self.config.prefix)
    }
}
