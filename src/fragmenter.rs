use crate::codec::{self, RawImage};
use crate::crypto::{normalize_secret, CryptoProvider};
use crate::error::{PixshardError, Result};
use crate::manifest::{
    FragmentationConfig, ImageGeometry, Manifest, DEFAULT_BLOCK_SIZE, DEFAULT_PREFIX,
};
use crate::pipeline::{
    calc_blocks_per_fragment, encrypt_image, pack, shuffle, split, split_by_counts,
    strips_cleanly, Block, BlockShape, Seed,
};
use futures_util::future::try_join_all;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;

/// Run ids drawn while looking for ciphertexts that all survive plain zero stripping
const MAX_ID_ATTEMPTS: usize = 16;

/// Forward pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStage {
    Configured,
    Encrypting,
    Splitting,
    Shuffling,
    Distributing,
    Encoding,
    Done,
}

fn enter(stage: FragmentStage) {
    debug!("fragmenter: {:?}", stage);
}

/// Input image plus the name to record when `restore_file_name` is set
#[derive(Debug, Clone)]
pub struct SourceImage<T> {
    pub name: Option<String>,
    pub image: T,
}

impl<T> SourceImage<T> {
    pub fn new(image: T) -> Self {
        Self { name: None, image }
    }

    pub fn named(name: impl Into<String>, image: T) -> Self {
        Self {
            name: Some(name.into()),
            image,
        }
    }
}

/// Encoded file ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Options for a fragmentation run
#[derive(Debug, Clone)]
pub struct FragmentOptions {
    pub block_size: u32,
    pub prefix: String,
    /// Generated when absent
    pub seed: Option<Seed>,
    pub restore_file_name: bool,
    pub cross_image_shuffle: bool,
    /// Defaults to one fragment per image
    pub fragment_count: Option<usize>,
    /// Enables the confidentiality transform; blank means none
    pub secret: Option<String>,
}

impl Default for FragmentOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            prefix: DEFAULT_PREFIX.to_string(),
            seed: None,
            restore_file_name: false,
            cross_image_shuffle: true,
            fragment_count: None,
            secret: None,
        }
    }
}

/// Manifest plus the fragments it describes, in fragment order
#[derive(Debug, Clone)]
pub struct FragmentOutput<T> {
    pub manifest: Manifest,
    pub fragments: Vec<T>,
}

/// Forward pipeline: encrypt → split → shuffle → distribute → pack
pub struct Fragmenter<P> {
    provider: P,
    options: FragmentOptions,
}

impl<P: CryptoProvider> Fragmenter<P> {
    pub fn new(provider: P, options: FragmentOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &FragmentOptions {
        &self.options
    }

    /// Fragment encoded (PNG/JPEG) images into PNG fragment files
    pub async fn fragment(
        &self,
        sources: Vec<SourceImage<Vec<u8>>>,
    ) -> Result<FragmentOutput<OutputFile>> {
        let decoded = sources
            .into_par_iter()
            .enumerate()
            .map(|(i, source)| {
                let context = match &source.name {
                    Some(name) => format!("source image {:?}", name),
                    None => format!("source image {}", i + 1),
                };
                let image = codec::decode(&source.image, &context)?;
                Ok(SourceImage {
                    name: source.name,
                    image,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let FragmentOutput {
            manifest,
            fragments,
        } = self.build(decoded).await?;

        let files = fragments
            .par_iter()
            .enumerate()
            .map(|(i, fragment)| {
                Ok(OutputFile {
                    name: manifest.file_name(i, true),
                    bytes: codec::encode_png(fragment)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        enter(FragmentStage::Done);
        Ok(FragmentOutput {
            manifest,
            fragments: files,
        })
    }

    /// Fragment already-decoded RGBA images
    pub async fn fragment_raw(
        &self,
        sources: Vec<SourceImage<RawImage>>,
    ) -> Result<FragmentOutput<RawImage>> {
        let output = self.build(sources).await?;
        enter(FragmentStage::Done);
        Ok(output)
    }

    /// Validate options against the inputs and resolve the seed
    fn configure(&self, sources: &[SourceImage<RawImage>]) -> Result<FragmentationConfig> {
        let options = &self.options;
        if sources.is_empty() {
            return Err(PixshardError::InvalidConfiguration(
                "no images to fragment".into(),
            ));
        }
        if options.block_size == 0 {
            return Err(PixshardError::InvalidConfiguration(
                "block size must be positive".into(),
            ));
        }
        if options.prefix.is_empty() {
            return Err(PixshardError::InvalidConfiguration(
                "prefix must not be empty".into(),
            ));
        }
        if options.fragment_count == Some(0) {
            return Err(PixshardError::InvalidConfiguration(
                "fragment count must be positive".into(),
            ));
        }
        for (index, source) in sources.iter().enumerate() {
            let (width, height) = (source.image.width, source.image.height);
            if !RawImage::is_supported_size(width, height) {
                return Err(PixshardError::InvalidConfiguration(format!(
                    "{} has unsupported size {}x{}",
                    label(index, source.name.as_deref()),
                    width,
                    height
                )));
            }
        }
        if options.restore_file_name {
            let mut seen = HashSet::new();
            for name in sources.iter().filter_map(|s| s.name.as_deref()) {
                if !seen.insert(name) {
                    return Err(PixshardError::InvalidConfiguration(format!(
                        "duplicate image name {:?}",
                        name
                    )));
                }
            }
        }

        Ok(FragmentationConfig {
            block_size: options.block_size,
            prefix: options.prefix.clone(),
            seed: options.seed.clone().unwrap_or_else(Seed::generate),
            restore_file_name: options.restore_file_name,
            cross_image_shuffle: options.cross_image_shuffle,
            fragment_count: options.fragment_count,
        })
    }

    async fn build(&self, sources: Vec<SourceImage<RawImage>>) -> Result<FragmentOutput<RawImage>> {
        let config = self.configure(&sources)?;
        enter(FragmentStage::Configured);

        let secret = normalize_secret(self.options.secret.as_deref());
        let (names, images): (Vec<Option<String>>, Vec<RawImage>) =
            sources.into_iter().map(|s| (s.name, s.image)).unzip();

        let (id, images) = match &secret {
            Some(secret) => {
                enter(FragmentStage::Encrypting);
                self.encrypt_all(secret, &images, &names).await?
            }
            None => (self.provider.generate_uuid().await, images),
        };

        let block_size = config.block_size;
        let geometry = images
            .iter()
            .zip(names)
            .map(|(image, name)| {
                let name = name.filter(|_| config.restore_file_name);
                ImageGeometry::new(image.width, image.height, block_size, name)
            })
            .collect::<Result<Vec<_>>>()?;

        // Step 1: Split every image into blocks tagged with their shape
        enter(FragmentStage::Splitting);
        let runs = images
            .par_iter()
            .zip(geometry.par_iter())
            .map(|(image, geometry)| {
                let blocks = split(&image.data, image.width, image.height, block_size)?;
                let shapes = geometry.block_shapes(block_size)?;
                Ok(blocks.into_iter().zip(shapes).collect::<Vec<_>>())
            })
            .collect::<Result<Vec<Vec<(Block, BlockShape)>>>>()?;
        drop(images);

        // Step 2: Shuffle, globally or per image
        enter(FragmentStage::Shuffling);
        let stream: Vec<(Block, BlockShape)> = if config.cross_image_shuffle {
            shuffle(runs.into_iter().flatten().collect(), &config.seed)
        } else {
            runs.into_iter()
                .flat_map(|run| shuffle(run, &config.seed))
                .collect()
        };

        // Step 3: Deal consecutive runs of the stream to fragments
        enter(FragmentStage::Distributing);
        let total_blocks = stream.len();
        let fragment_count = config.fragment_count.unwrap_or(geometry.len());
        let counts = calc_blocks_per_fragment(total_blocks, fragment_count)?;
        let slices: Vec<(Vec<Block>, Vec<BlockShape>)> = split_by_counts(stream, &counts)
            .into_iter()
            .map(|slice| slice.into_iter().unzip())
            .collect();

        // Step 4: Pack each slice into a fragment canvas
        enter(FragmentStage::Encoding);
        let fragments = slices
            .par_iter()
            .map(|(blocks, shapes)| pack(blocks, shapes, block_size))
            .collect::<Result<Vec<_>>>()?;

        let manifest = Manifest::new(id, secret.is_some(), config, geometry);
        info!(
            "fragmented {} image(s) into {} fragment(s): {} blocks, secure={}",
            manifest.images.len(),
            fragments.len(),
            total_blocks,
            manifest.secure
        );

        Ok(FragmentOutput {
            manifest,
            fragments,
        })
    }

    /// Encrypt all images under one run id
    ///
    /// The id doubles as the IV. Ids are redrawn until no ciphertext ends in
    /// 0x00, so decoders that only strip trailing zeros can read the frames.
    /// Large batches rarely get there; the id leaving the fewest such frames
    /// is then kept, since realigning decoders read those frames too.
    async fn encrypt_all(
        &self,
        secret: &str,
        images: &[RawImage],
        names: &[Option<String>],
    ) -> Result<(String, Vec<RawImage>)> {
        let key = self.provider.key_to_32(secret).await;
        let mut best: Option<(String, Vec<RawImage>, Vec<usize>)> = None;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.provider.generate_uuid().await;
            let iv = self.provider.uuid_to_iv(&id).await?;
            let frames = try_join_all(
                images
                    .iter()
                    .map(|image| encrypt_image(&self.provider, image, &key, &iv)),
            )
            .await?;

            let unclean: Vec<usize> = frames
                .iter()
                .zip(images)
                .enumerate()
                .filter(|(_, (frame, image))| !strips_cleanly(frame, image.data.len()))
                .map(|(index, _)| index)
                .collect();
            if unclean.is_empty() {
                return Ok((id, frames));
            }
            debug!("run id {} leaves {} zero-terminated ciphertext(s)", id, unclean.len());
            if best.as_ref().map_or(true, |(_, _, b)| unclean.len() < b.len()) {
                best = Some((id, frames, unclean));
            }
        }

        let (id, frames, unclean) = best.ok_or_else(|| {
            PixshardError::EncryptionFailed("no run id could be drawn".into())
        })?;
        let labels: Vec<String> = unclean
            .iter()
            .map(|&index| label(index, names.get(index).and_then(|n| n.as_deref())))
            .collect();
        warn!(
            "run id {}: ciphertext of {} ends in 0x00; decoders that only strip trailing zeros cannot restore them",
            id,
            labels.join(", ")
        );
        Ok((id, frames))
    }
}

fn label(index: usize, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("image {} ({:?})", index + 1, name),
        None => format!("image {}", index + 1),
    }
}
