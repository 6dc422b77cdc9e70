use crate::codec::RawImage;
use crate::crypto::{CryptoProvider, CIPHER_BLOCK};
use crate::error::{PixshardError, Result};
use crate::pipeline::CHANNELS;

/// Geometry header prepended to the pixels before encryption
/// Layout: [width: u32 BE][height: u32 BE][content length: u32 BE]
pub const HEADER_SIZE: usize = 12;

fn frame_header(width: u32, height: u32, content_len: usize) -> Result<[u8; HEADER_SIZE]> {
    let content_len = u32::try_from(content_len).map_err(|_| {
        PixshardError::InvalidConfiguration(format!(
            "image of {} bytes is too large to encrypt",
            content_len
        ))
    })?;
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&width.to_be_bytes());
    header[4..8].copy_from_slice(&height.to_be_bytes());
    header[8..12].copy_from_slice(&content_len.to_be_bytes());
    Ok(header)
}

/// Smallest near-square RGBA canvas holding `byte_len` bytes
/// width = ceil(sqrt(len / 4)), height = ceil(len / (width * 4))
pub fn optimal_dimensions(byte_len: usize) -> (u32, u32) {
    if byte_len == 0 {
        return (1, 1);
    }
    // Smallest w with 4 * w * w >= len
    let mut width = ((byte_len as f64) / CHANNELS as f64).sqrt().ceil() as usize;
    while width * width * CHANNELS < byte_len {
        width += 1;
    }
    while width > 1 && (width - 1) * (width - 1) * CHANNELS >= byte_len {
        width -= 1;
    }
    let height = byte_len.div_ceil(width * CHANNELS);
    (width as u32, height as u32)
}

/// Drop the longest run of trailing zero bytes
///
/// Inverse of the zero padding added by [`encrypt_image`]. A ciphertext whose
/// own last bytes are zero loses them here as well.
pub fn strip_zero_padding(buf: &[u8]) -> &[u8] {
    let end = buf.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &buf[..end]
}

/// Ciphertext carried by a frame
///
/// Trailing zeros are stripped, then the span is extended back to the next
/// cipher block boundary so zero bytes ending the ciphertext itself survive.
pub fn ciphertext_span(buf: &[u8]) -> &[u8] {
    let aligned = strip_zero_padding(buf).len().div_ceil(CIPHER_BLOCK) * CIPHER_BLOCK;
    &buf[..aligned.min(buf.len())]
}

/// Ciphertext length for an image of `content_len` bytes under PKCS#7
pub fn ciphertext_len(content_len: usize) -> usize {
    (HEADER_SIZE + content_len) / CIPHER_BLOCK * CIPHER_BLOCK + CIPHER_BLOCK
}

/// Whether [`strip_zero_padding`] alone gives back exactly the ciphertext of `frame`
/// False when the ciphertext itself ends in 0x00; decoders that strip without
/// realigning cannot read such a frame.
pub fn strips_cleanly(frame: &RawImage, content_len: usize) -> bool {
    strip_zero_padding(&frame.data).len() == ciphertext_len(content_len)
}

/// Encrypt a whole image and re-frame the ciphertext as a new RGBA image
pub async fn encrypt_image<P: CryptoProvider>(
    provider: &P,
    image: &RawImage,
    key: &[u8; 32],
    iv: &[u8; 16],
) -> Result<RawImage> {
    let header = frame_header(image.width, image.height, image.data.len())?;
    let mut plaintext = Vec::with_capacity(HEADER_SIZE + image.data.len());
    plaintext.extend_from_slice(&header);
    plaintext.extend_from_slice(&image.data);

    let mut ciphertext = provider.encrypt_buffer(&plaintext, key, iv).await?;

    let (width, height) = optimal_dimensions(ciphertext.len());
    ciphertext.resize(RawImage::byte_len(width, height), 0);
    RawImage::new(width, height, ciphertext)
}

/// Inverse of [`encrypt_image`]
/// Any implausible header after decryption is reported as a wrong key
pub async fn decrypt_image<P: CryptoProvider>(
    provider: &P,
    image: &RawImage,
    key: &[u8; 32],
    iv: &[u8; 16],
) -> Result<RawImage> {
    let ciphertext = ciphertext_span(&image.data);
    let plaintext = provider.decrypt_buffer(ciphertext, key, iv).await?;

    if plaintext.len() < HEADER_SIZE {
        return Err(PixshardError::DecryptionFailed(
            "decrypted payload shorter than geometry header".into(),
        ));
    }
    let field = |i: usize| {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&plaintext[i..i + 4]);
        u32::from_be_bytes(bytes)
    };
    let width = field(0);
    let height = field(4);
    let content_len = field(8) as usize;

    let payload = &plaintext[HEADER_SIZE..];
    if width == 0
        || height == 0
        || RawImage::checked_byte_len(width, height) != Some(content_len)
        || content_len > payload.len()
    {
        return Err(PixshardError::DecryptionFailed(format!(
            "implausible header {}x{} with {} bytes (wrong key?)",
            width, height, content_len
        )));
    }

    RawImage::new(width, height, payload[..content_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_key, NativeCrypto};

    fn sample(width: u32, height: u32) -> RawImage {
        let data = (0..RawImage::byte_len(width, height))
            .map(|i| (i % 200 + 1) as u8)
            .collect();
        RawImage::new(width, height, data).unwrap()
    }

    fn iv_for(n: u32) -> [u8; 16] {
        let mut iv = [0x42u8; 16];
        iv[..4].copy_from_slice(&n.to_be_bytes());
        iv
    }

    /// First IV whose frame ends its ciphertext in 0x00
    async fn find_zero_terminated_frame(image: &RawImage, key: &[u8; 32]) -> (RawImage, [u8; 16]) {
        for n in 0u32..20_000 {
            let iv = iv_for(n);
            let frame = encrypt_image(&NativeCrypto, image, key, &iv).await.unwrap();
            if !strips_cleanly(&frame, image.data.len()) {
                return (frame, iv);
            }
        }
        panic!("no suitable IV found");
    }

    fn header(width: u32, height: u32, content_len: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out.extend_from_slice(&content_len.to_be_bytes());
        out
    }

    /// Encrypt an arbitrary plaintext and frame it the way encrypt_image does
    async fn frame_plaintext(plaintext: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> RawImage {
        let mut ciphertext = NativeCrypto.encrypt_buffer(plaintext, key, iv).await.unwrap();
        let (width, height) = optimal_dimensions(ciphertext.len());
        ciphertext.resize(RawImage::byte_len(width, height), 0);
        RawImage::new(width, height, ciphertext).unwrap()
    }

    async fn decrypt_crafted(plaintext: &[u8]) -> PixshardError {
        let key = derive_key("secret");
        let iv = iv_for(7);
        let frame = frame_plaintext(plaintext, &key, &iv).await;
        decrypt_image(&NativeCrypto, &frame, &key, &iv)
            .await
            .unwrap_err()
    }

    #[test]
    fn test_optimal_dimensions() {
        assert_eq!(optimal_dimensions(1), (1, 1));
        assert_eq!(optimal_dimensions(4), (1, 1));
        assert_eq!(optimal_dimensions(5), (2, 1));
        assert_eq!(optimal_dimensions(16), (2, 2));
        // 80 bytes = 20 pixels -> 5 wide, 4 tall
        assert_eq!(optimal_dimensions(80), (5, 4));
        for len in (16..5000).step_by(16) {
            let (w, h) = optimal_dimensions(len);
            assert!(RawImage::byte_len(w, h) >= len);
            assert!(RawImage::byte_len(w, h - 1) < len);
        }
    }

    #[test]
    fn test_strip_zero_padding() {
        assert_eq!(strip_zero_padding(&[1, 2, 0, 3, 0, 0]), &[1, 2, 0, 3]);
        assert_eq!(strip_zero_padding(&[0, 0, 0]), &[] as &[u8]);
        assert_eq!(strip_zero_padding(&[5]), &[5]);
    }

    #[test]
    fn test_ciphertext_span_realigns_to_cipher_block() {
        let mut frame = vec![9u8; 32];
        frame[30] = 0;
        frame[31] = 0;
        frame.extend_from_slice(&[0u8; 4]);
        assert_eq!(strip_zero_padding(&frame).len(), 30);
        assert_eq!(ciphertext_span(&frame).len(), 32);
        assert!(ciphertext_span(&[0u8; 16]).is_empty());
    }

    #[test]
    fn test_ciphertext_len() {
        assert_eq!(ciphertext_len(0), 16);
        assert_eq!(ciphertext_len(4), 32);
        assert_eq!(ciphertext_len(64), 80);
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_image_roundtrip() {
        let key = derive_key("secret");
        let image = sample(4, 4);
        for n in 0..8 {
            let frame = encrypt_image(&NativeCrypto, &image, &key, &iv_for(n)).await.unwrap();

            // 12 + 64 = 76 bytes -> 80 after PKCS#7 -> 5x4 canvas
            assert_eq!((frame.width, frame.height), (5, 4));
            assert_ne!(frame.data[..64], image.data[..]);

            let restored = decrypt_image(&NativeCrypto, &frame, &key, &iv_for(n)).await.unwrap();
            assert_eq!(restored, image);
        }
    }

    #[tokio::test]
    async fn test_zero_pixels_survive() {
        // Zero pixels sit inside the ciphertext, so padding removal never sees them
        let key = derive_key("secret");
        let image = RawImage::blank(3, 3);
        let frame = encrypt_image(&NativeCrypto, &image, &key, &iv_for(1)).await.unwrap();
        let restored = decrypt_image(&NativeCrypto, &frame, &key, &iv_for(1)).await.unwrap();
        assert_eq!(restored, image);
    }

    #[tokio::test]
    async fn test_wrong_key_fails() {
        let image = sample(6, 3);
        let frame = encrypt_image(&NativeCrypto, &image, &derive_key("right"), &iv_for(0))
            .await
            .unwrap();
        let err = decrypt_image(&NativeCrypto, &frame, &derive_key("wrong"), &iv_for(0))
            .await
            .unwrap_err();
        assert!(matches!(err, PixshardError::DecryptionFailed(_)));
    }

    #[tokio::test]
    async fn test_zero_terminated_ciphertext() {
        // Stripping alone cannot tell padding from a ciphertext whose final
        // byte is 0x00 (about 1 IV in 256); realignment recovers it.
        let key = derive_key("secret");
        let image = sample(2, 2);
        let (frame, iv) = find_zero_terminated_frame(&image, &key).await;

        // 12 + 16 = 28 -> 32 bytes of ciphertext on a 3x3 canvas
        assert_eq!((frame.width, frame.height), (3, 3));
        assert_eq!(frame.data[31], 0);
        assert!(strip_zero_padding(&frame.data).len() < 32);

        let stripped = strip_zero_padding(&frame.data);
        let err = NativeCrypto
            .decrypt_buffer(stripped, &key, &iv)
            .await
            .unwrap_err();
        assert!(matches!(err, PixshardError::DecryptionFailed(_)));

        let restored = decrypt_image(&NativeCrypto, &frame, &key, &iv).await.unwrap();
        assert_eq!(restored, image);
    }

    #[tokio::test]
    async fn test_all_zero_buffer_fails_cleanly() {
        let err = decrypt_image(&NativeCrypto, &RawImage::blank(4, 4), &derive_key("k"), &iv_for(0))
            .await
            .unwrap_err();
        assert!(matches!(err, PixshardError::DecryptionFailed(_)));
    }

    #[tokio::test]
    async fn test_overflowing_dimensions_rejected() {
        let mut plaintext = header(u32::MAX, u32::MAX, 16);
        plaintext.extend_from_slice(&[1u8; 16]);
        let err = decrypt_crafted(&plaintext).await;
        assert!(matches!(err, PixshardError::DecryptionFailed(_)), "{}", err);
    }

    #[tokio::test]
    async fn test_short_plaintext_rejected() {
        let err = decrypt_crafted(&[1, 2, 3, 4, 5]).await;
        assert!(err.to_string().contains("shorter than geometry header"), "{}", err);
    }

    #[tokio::test]
    async fn test_zero_dimension_rejected() {
        for (width, height) in [(0, 2), (2, 0)] {
            let mut plaintext = header(width, height, 0);
            plaintext.extend_from_slice(&[1u8; 8]);
            let err = decrypt_crafted(&plaintext).await;
            assert!(matches!(err, PixshardError::DecryptionFailed(_)), "{}", err);
        }
    }

    #[tokio::test]
    async fn test_content_length_must_match_dimensions() {
        let mut plaintext = header(2, 2, 15);
        plaintext.extend_from_slice(&[1u8; 16]);
        let err = decrypt_crafted(&plaintext).await;
        assert!(matches!(err, PixshardError::DecryptionFailed(_)), "{}", err);
    }

    #[tokio::test]
    async fn test_payload_shorter_than_content_length() {
        let mut plaintext = header(2, 2, 16);
        plaintext.extend_from_slice(&[1u8; 8]);
        let err = decrypt_crafted(&plaintext).await;
        assert!(matches!(err, PixshardError::DecryptionFailed(_)), "{}", err);
    }
}
