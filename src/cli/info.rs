use crate::cli::decrypt::read_manifest;
use crate::error::Result;
use crate::pipeline::calc_blocks_per_fragment;
use std::path::Path;

/// Display information about a manifest file
pub fn show_info(path: &Path) -> Result<String> {
    let manifest = read_manifest(path)?;
    let config = &manifest.config;
    let fragment_count = manifest.fragment_count();
    let counts = calc_blocks_per_fragment(manifest.total_blocks(), fragment_count)?;

    let mut output = String::new();
    output.push_str("Pixshard Manifest Information\n");
    output.push_str("=============================\n\n");

    output.push_str(&format!("File: {}\n", path.display()));
    output.push_str(&format!("Id: {}\n", manifest.id));
    output.push_str(&format!("Version: {}\n", manifest.version));
    output.push_str(&format!("Created: {}\n\n", manifest.timestamp));

    output.push_str("Security:\n");
    output.push_str(&format!("  Secure: {}\n", if manifest.secure { "yes" } else { "no" }));
    if let Some(algorithm) = &manifest.algorithm {
        output.push_str(&format!("  Algorithm: {}\n", algorithm));
    }
    output.push_str("\n");

    output.push_str("Fragmentation:\n");
    output.push_str(&format!("  Block size: {} px\n", config.block_size));
    output.push_str(&format!("  Prefix: {}\n", config.prefix));
    output.push_str(&format!("  Seed: {}\n", config.seed));
    output.push_str(&format!("  Cross-image shuffle: {}\n", config.cross_image_shuffle));
    output.push_str(&format!("  Restore file names: {}\n", config.restore_file_name));
    output.push_str(&format!("  Fragments: {}\n", fragment_count));
    output.push_str(&format!("  Blocks per fragment: {:?}\n", counts));
    output.push_str(&format!("  Total blocks: {}\n\n", manifest.total_blocks()));

    output.push_str("Images:\n");
    let mut pixel_bytes = 0u64;
    for (i, image) in manifest.images.iter().enumerate() {
        let bytes = image.width as u64 * image.height as u64 * image.channels as u64;
        pixel_bytes += bytes;
        output.push_str(&format!(
            "  {}: {}x{} ({}x{} blocks) -> {}\n",
            i + 1,
            image.width,
            image.height,
            image.x,
            image.y,
            manifest.restored_file_name(i)
        ));
    }
    output.push_str(&format!("  Pixel data: {}\n", format_size(pixel_bytes)));

    Ok(output)
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
