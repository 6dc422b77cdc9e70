use crate::crypto::NativeCrypto;
use crate::error::{PixshardError, Result};
use crate::manifest::Manifest;
use crate::restorer::Restorer;
use log::warn;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Options for the decrypt command
#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    pub key: Option<String>,
}

/// Read a manifest file and validate it
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    Manifest::from_bytes(&fs::read(path)?)
}

/// Put fragment paths in manifest order
///
/// When every generated fragment name is present the paths are matched by
/// name, otherwise they are used in the order given.
pub fn order_fragments(manifest: &Manifest, paths: &[PathBuf]) -> Vec<PathBuf> {
    let by_name: HashMap<&OsStr, &PathBuf> = paths
        .iter()
        .filter_map(|path| path.file_name().map(|name| (name, path)))
        .collect();

    let matched: Option<Vec<PathBuf>> = (0..manifest.fragment_count())
        .map(|i| {
            let expected = manifest.file_name(i, true);
            by_name.get(OsStr::new(&expected)).map(|path| (*path).clone())
        })
        .collect();

    match matched {
        Some(ordered) if ordered.len() == paths.len() => ordered,
        _ => {
            warn!("fragment names do not match the manifest, using the order given");
            paths.to_vec()
        }
    }
}

/// Restore images from fragment files into `output_dir`
/// Returns the paths written; nothing is written unless the restore succeeds
pub async fn decrypt_fragments(
    fragments: &[PathBuf],
    manifest_path: &Path,
    output_dir: &Path,
    options: &DecryptOptions,
) -> Result<Vec<PathBuf>> {
    let manifest = read_manifest(manifest_path)?;
    let ordered = order_fragments(&manifest, fragments);
    let data = ordered
        .iter()
        .map(fs::read)
        .collect::<std::io::Result<Vec<_>>>()?;

    let restorer = Restorer::new(NativeCrypto, options.key.clone());
    let files = restorer.restore(&manifest, &data).await?;

    // Stored names come from the manifest and must stay inside output_dir
    for file in &files {
        if Path::new(&file.name).file_name() != Some(OsStr::new(&file.name)) {
            return Err(PixshardError::InvalidManifest(format!(
                "image name {:?} is not a plain file name",
                file.name
            )));
        }
    }

    fs::create_dir_all(output_dir)?;
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = output_dir.join(&file.name);
        fs::write(&path, &file.bytes)?;
        written.push(path);
    }
    Ok(written)
}
