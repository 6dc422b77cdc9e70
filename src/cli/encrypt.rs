use crate::crypto::NativeCrypto;
use crate::error::{PixshardError, Result};
use crate::fragmenter::{FragmentOptions, Fragmenter, SourceImage};
use crate::manifest::{DEFAULT_BLOCK_SIZE, DEFAULT_PREFIX};
use crate::pipeline::Seed;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Options for the encrypt command
#[derive(Debug, Clone)]
pub struct EncryptOptions {
    pub key: Option<String>,
    pub block_size: u32,
    pub prefix: String,
    pub seed: Option<Seed>,
    pub fragments: Option<usize>,
    pub restore_file_name: bool,
    pub cross_image_shuffle: bool,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            key: None,
            block_size: DEFAULT_BLOCK_SIZE,
            prefix: DEFAULT_PREFIX.to_string(),
            seed: None,
            fragments: None,
            restore_file_name: false,
            cross_image_shuffle: true,
        }
    }
}

/// What an encrypt run wrote
#[derive(Debug, Clone)]
pub struct EncryptSummary {
    pub manifest: PathBuf,
    pub fragments: Vec<PathBuf>,
    pub secure: bool,
    pub total_blocks: usize,
}

/// Fragment image files into `output_dir`
/// Nothing is written unless the whole run succeeds
pub async fn encrypt_images(
    inputs: &[PathBuf],
    output_dir: &Path,
    options: &EncryptOptions,
) -> Result<EncryptSummary> {
    let sources = inputs
        .iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    PixshardError::InvalidConfiguration(format!(
                        "{} is not a file path",
                        path.display()
                    ))
                })?;
            Ok(SourceImage::named(name, fs::read(path)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let fragmenter = Fragmenter::new(
        NativeCrypto,
        FragmentOptions {
            block_size: options.block_size,
            prefix: options.prefix.clone(),
            seed: options.seed.clone(),
            restore_file_name: options.restore_file_name,
            cross_image_shuffle: options.cross_image_shuffle,
            fragment_count: options.fragments,
            secret: options.key.clone(),
        },
    );
    let output = fragmenter.fragment(sources).await?;

    fs::create_dir_all(output_dir)?;
    let mut fragments = Vec::with_capacity(output.fragments.len());
    for file in &output.fragments {
        let path = output_dir.join(&file.name);
        fs::write(&path, &file.bytes)?;
        fragments.push(path);
    }

    let manifest = output_dir.join(output.manifest.manifest_file_name());
    fs::write(&manifest, output.manifest.to_bytes()?)?;
    info!("wrote manifest {}", manifest.display());

    Ok(EncryptSummary {
        manifest,
        fragments,
        secure: output.manifest.secure,
        total_blocks: output.manifest.total_blocks(),
    })
}
