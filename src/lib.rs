//! Pixshard - Seeded Image Block Fragmentation
//!
//! Cuts one or more images into square pixel blocks, permutes the blocks with
//! a seeded shuffle and deals them across a set of fragment images. A JSON
//! manifest records everything except the optional secret, so the originals
//! can be rebuilt byte-exactly from the fragments.
//!
//! ## Transform Pipeline
//!
//! ```text
//! Input → [Encrypt] → Split → Shuffle → Distribute → Pack → Fragments + Manifest
//! ```
//!
//! - **Encrypt**: optional AES-256-CBC over a framed copy of each image; the
//!   ciphertext is laid out as a new RGBA image
//! - **Split**: row-major blocks of `blockSize` pixels, clipped at the edges
//! - **Shuffle**: seeded Xoshiro256** permutation, across all images or per image
//! - **Distribute**: balanced consecutive runs, one per fragment
//! - **Pack**: each run becomes a near-square fragment canvas
//!
//! Restoration runs the same steps in reverse, driven only by the manifest.
//!
//! ## Example
//!
//! ```no_run
//! use pixshard::cli::{decrypt_fragments, encrypt_images, DecryptOptions, EncryptOptions};
//! use std::path::{Path, PathBuf};
//!
//! # async fn run() -> pixshard::Result<()> {
//! let options = EncryptOptions {
//!     key: Some("my_secret".into()),
//!     ..Default::default()
//! };
//! let summary = encrypt_images(&[PathBuf::from("photo.png")], Path::new("out"), &options).await?;
//!
//! decrypt_fragments(
//!     &summary.fragments,
//!     &summary.manifest,
//!     Path::new("restored"),
//!     &DecryptOptions { key: Some("my_secret".into()) },
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod fragmenter;
pub mod manifest;
pub mod pipeline;
pub mod restorer;

pub use codec::RawImage;
pub use crypto::{CryptoProvider, NativeCrypto};
pub use error::{PixshardError, Result};
pub use fragmenter::{FragmentOptions, FragmentOutput, Fragmenter, OutputFile, SourceImage};
pub use manifest::{FragmentationConfig, ImageGeometry, Manifest};
pub use pipeline::Seed;
pub use restorer::Restorer;
