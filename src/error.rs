use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixshardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Fragment count mismatch: manifest expects {expected}, got {actual}")]
    FragmentCountMismatch { expected: usize, actual: usize },

    #[error("Invalid UUID format: {0:?}")]
    InvalidUuidFormat(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Failed to decode {context}: {source} (manifest may not match image data)")]
    ImageDecode {
        context: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode PNG: {0}")]
    ImageEncode(#[source] image::ImageError),

    #[error("Layout mismatch: {0} (manifest may not match image data)")]
    LayoutMismatch(String),

    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Secret required")]
    SecretRequired,
}

pub type Result<T> = std::result::Result<T, PixshardError>;
