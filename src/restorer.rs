use crate::codec::{self, RawImage};
use crate::crypto::{normalize_secret, CryptoProvider};
use crate::error::{PixshardError, Result};
use crate::fragmenter::OutputFile;
use crate::manifest::Manifest;
use crate::pipeline::{
    calc_blocks_per_fragment, decrypt_image, reassemble, shuffle, split_by_counts, unpack,
    unshuffle, Block, BlockShape,
};
use futures_util::future::try_join_all;
use log::{debug, info};
use rayon::prelude::*;

/// Inverse pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
    Configured,
    DecodingFragments,
    Concatenating,
    Unshuffling,
    Reassembling,
    Decrypting,
    Done,
}

fn enter(stage: RestoreStage) {
    debug!("restorer: {:?}", stage);
}

/// Inverse pipeline driven only by the manifest, the fragments and the secret
pub struct Restorer<P> {
    provider: P,
    secret: Option<String>,
}

impl<P: CryptoProvider> Restorer<P> {
    /// `secret` is required only for secure manifests; blank counts as absent
    pub fn new(provider: P, secret: Option<String>) -> Self {
        Self {
            provider,
            secret: normalize_secret(secret.as_deref()),
        }
    }

    /// Restore PNG-encoded fragments into PNG images named per the manifest
    pub async fn restore(
        &self,
        manifest: &Manifest,
        fragments: &[Vec<u8>],
    ) -> Result<Vec<OutputFile>> {
        self.configure(manifest, fragments.len())?;

        enter(RestoreStage::DecodingFragments);
        let canvases = fragments
            .par_iter()
            .enumerate()
            .map(|(i, bytes)| codec::decode(bytes, &format!("fragment {}", i + 1)))
            .collect::<Result<Vec<_>>>()?;

        let images = self.rebuild(manifest, canvases).await?;
        let files = images
            .par_iter()
            .enumerate()
            .map(|(i, image)| {
                Ok(OutputFile {
                    name: manifest.restored_file_name(i),
                    bytes: codec::encode_png(image)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        enter(RestoreStage::Done);
        Ok(files)
    }

    /// Restore already-decoded fragment canvases into RGBA images
    pub async fn restore_raw(
        &self,
        manifest: &Manifest,
        fragments: Vec<RawImage>,
    ) -> Result<Vec<RawImage>> {
        self.configure(manifest, fragments.len())?;
        let images = self.rebuild(manifest, fragments).await?;
        enter(RestoreStage::Done);
        Ok(images)
    }

    fn configure(&self, manifest: &Manifest, supplied: usize) -> Result<()> {
        manifest.validate()?;
        let expected = manifest.fragment_count();
        if supplied != expected {
            return Err(PixshardError::FragmentCountMismatch {
                expected,
                actual: supplied,
            });
        }
        if manifest.secure && self.secret.is_none() {
            return Err(PixshardError::SecretRequired);
        }
        enter(RestoreStage::Configured);
        Ok(())
    }

    async fn rebuild(
        &self,
        manifest: &Manifest,
        canvases: Vec<RawImage>,
    ) -> Result<Vec<RawImage>> {
        let config = &manifest.config;
        let block_size = config.block_size;
        let seed = &config.seed;

        let shape_runs = manifest
            .images
            .iter()
            .map(|geometry| geometry.block_shapes(block_size))
            .collect::<Result<Vec<_>>>()?;
        let run_lengths: Vec<usize> = shape_runs.iter().map(Vec::len).collect();

        // Shapes go through the same permutation the blocks did
        let shuffled_shapes: Vec<BlockShape> = if config.cross_image_shuffle {
            shuffle(shape_runs.into_iter().flatten().collect(), seed)
        } else {
            shape_runs
                .into_iter()
                .flat_map(|run| shuffle(run, seed))
                .collect()
        };

        // Step 1: Read back exactly as many blocks as each fragment was dealt
        enter(RestoreStage::Concatenating);
        let counts = calc_blocks_per_fragment(shuffled_shapes.len(), canvases.len())?;
        let shape_slices = split_by_counts(shuffled_shapes, &counts);
        let stream: Vec<Block> = canvases
            .par_iter()
            .zip(shape_slices.par_iter())
            .enumerate()
            .map(|(i, (canvas, shapes))| {
                unpack(canvas, shapes, block_size).map_err(|e| match e {
                    PixshardError::LayoutMismatch(msg) => {
                        PixshardError::LayoutMismatch(format!("fragment {}: {}", i + 1, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<Vec<Block>>>>()?
            .into_iter()
            .flatten()
            .collect();
        drop(canvases);

        // Step 2: Undo the permutation and cut the stream per image
        enter(RestoreStage::Unshuffling);
        let per_image: Vec<Vec<Block>> = if config.cross_image_shuffle {
            split_by_counts(unshuffle(stream, seed), &run_lengths)
        } else {
            split_by_counts(stream, &run_lengths)
                .into_iter()
                .map(|run| unshuffle(run, seed))
                .collect()
        };

        // Step 3: Put every block back at its grid position
        enter(RestoreStage::Reassembling);
        let frames = per_image
            .par_iter()
            .zip(manifest.images.par_iter())
            .map(|(blocks, geometry)| {
                let data = reassemble(blocks, geometry.width, geometry.height, block_size)?;
                RawImage::new(geometry.width, geometry.height, data)
            })
            .collect::<Result<Vec<_>>>()?;

        if !manifest.secure {
            info!("restored {} image(s)", frames.len());
            return Ok(frames);
        }

        // Step 4: Decrypt each frame back to the original pixels
        enter(RestoreStage::Decrypting);
        let secret = self.secret.as_deref().ok_or(PixshardError::SecretRequired)?;
        let key = self.provider.key_to_32(secret).await;
        let iv = self.provider.uuid_to_iv(&manifest.id).await?;
        let images = try_join_all(
            frames
                .iter()
                .map(|frame| decrypt_image(&self.provider, frame, &key, &iv)),
        )
        .await?;

        info!("restored {} secured image(s)", images.len());
        Ok(images)
    }
}
