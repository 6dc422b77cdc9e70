use clap::{Parser, Subcommand};
use pixshard::cli::{decrypt_fragments, encrypt_images, show_info, DecryptOptions, EncryptOptions};
use pixshard::Seed;
use std::path::PathBuf;
use std::process::ExitCode;

/// Version info from build.rs
const VERSION: &str = env!("CARGO_PKG_VERSION");
const PROFILE: &str = env!("PIXSHARD_PROFILE");
const GIT_HASH: &str = env!("PIXSHARD_GIT_HASH");

#[derive(Parser)]
#[command(name = "pixshard")]
#[command(author, about = "Seeded image block fragmentation and restoration", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fragment images into shuffled fragment PNGs plus a manifest
    #[command(alias = "e")]
    Encrypt {
        /// Source images (PNG or JPEG)
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Secret for the AES-256-CBC layer; omit for shuffling only
        #[arg(long)]
        key: Option<String>,

        /// Block edge length in pixels
        #[arg(long, default_value = "1")]
        block_size: u32,

        /// File name prefix for fragments and restored images
        #[arg(long, default_value = "img")]
        prefix: String,

        /// Shuffle seed (number or text); random when omitted
        #[arg(long)]
        seed: Option<Seed>,

        /// Number of fragment files (defaults to one per image)
        #[arg(long)]
        fragments: Option<usize>,

        /// Record source file names so restore uses them
        #[arg(long)]
        restore_file_name: bool,

        /// Shuffle each image's blocks separately
        #[arg(long)]
        no_cross_image_shuffle: bool,
    },

    /// Restore images from fragments and their manifest
    #[command(alias = "d")]
    Decrypt {
        /// Fragment PNGs
        #[arg(required = true)]
        fragments: Vec<PathBuf>,

        /// Manifest JSON written by encrypt
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Secret used at encrypt time
        #[arg(long)]
        key: Option<String>,
    },

    /// Show information about a manifest
    #[command(alias = "i")]
    Info {
        /// Manifest file to inspect
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if cli.version {
        println!("pixshard {} {} ({})", VERSION, PROFILE, GIT_HASH);
        return ExitCode::SUCCESS;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            if let Err(e) = Cli::command().print_help() {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
            println!();
            return ExitCode::SUCCESS;
        }
    };

    let result = match command {
        Commands::Encrypt {
            images,
            output,
            key,
            block_size,
            prefix,
            seed,
            fragments,
            restore_file_name,
            no_cross_image_shuffle,
        } => {
            let options = EncryptOptions {
                key,
                block_size,
                prefix,
                seed,
                fragments,
                restore_file_name,
                cross_image_shuffle: !no_cross_image_shuffle,
            };

            encrypt_images(&images, &output, &options).await.map(|summary| {
                println!(
                    "Fragmented {} image(s) into {} fragment(s) ({} blocks{})",
                    images.len(),
                    summary.fragments.len(),
                    summary.total_blocks,
                    if summary.secure { ", encrypted" } else { "" }
                );
                println!("Manifest: {}", summary.manifest.display());
            })
        }

        Commands::Decrypt {
            fragments,
            manifest,
            output,
            key,
        } => {
            let options = DecryptOptions { key };
            decrypt_fragments(&fragments, &manifest, &output, &options)
                .await
                .map(|written| {
                    println!("Restored {} image(s) to {}", written.len(), output.display());
                })
        }

        Commands::Info { manifest } => show_info(&manifest).map(|info| print!("{}", info)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
