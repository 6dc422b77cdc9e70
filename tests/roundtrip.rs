use pixshard::pipeline::{decrypt_image, encrypt_image};
use pixshard::{
    CryptoProvider, FragmentOptions, Fragmenter, NativeCrypto, PixshardError, RawImage, Restorer,
    Result, Seed, SourceImage,
};

fn image(width: u32, height: u32, salt: u8) -> RawImage {
    let data = (0..RawImage::byte_len(width, height))
        .map(|i| (i as u8).wrapping_mul(7).wrapping_add(salt))
        .collect();
    RawImage::new(width, height, data).unwrap()
}

async fn roundtrip(
    options: FragmentOptions,
    images: Vec<RawImage>,
    key: Option<&str>,
) -> Result<(Vec<RawImage>, Vec<RawImage>)> {
    let sources = images.into_iter().map(SourceImage::new).collect();
    let output = Fragmenter::new(NativeCrypto, options)
        .fragment_raw(sources)
        .await?;
    let fragments = output.fragments.clone();
    let restored = Restorer::new(NativeCrypto, key.map(str::to_string))
        .restore_raw(&output.manifest, output.fragments)
        .await?;
    Ok((fragments, restored))
}

#[tokio::test]
async fn unsecured_roundtrip_is_byte_exact() {
    let original = image(4, 4, 0);
    let options = FragmentOptions {
        seed: Some(Seed::Number(42)),
        ..Default::default()
    };
    let (fragments, restored) = roundtrip(options, vec![original.clone()], None)
        .await
        .unwrap();

    assert_eq!(fragments.len(), 1);
    assert_ne!(fragments[0].data, original.data, "blocks should be shuffled");
    assert_eq!(restored, vec![original]);
}

#[tokio::test]
async fn secured_roundtrip_with_correct_key() {
    let originals = vec![image(4, 4, 1), image(7, 3, 2)];
    let options = FragmentOptions {
        block_size: 2,
        secret: Some("correct horse".into()),
        ..Default::default()
    };
    let (_, restored) = roundtrip(options, originals.clone(), Some("correct horse"))
        .await
        .unwrap();
    assert_eq!(restored, originals);
}

#[tokio::test]
async fn secured_restore_with_wrong_key_fails() {
    let options = FragmentOptions {
        secret: Some("right".into()),
        ..Default::default()
    };
    let err = roundtrip(options, vec![image(4, 4, 3)], Some("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, PixshardError::DecryptionFailed(_)), "{}", err);
}

#[tokio::test]
async fn two_images_into_three_fragments() {
    let originals = vec![image(2, 2, 10), image(2, 2, 20)];
    for cross_image_shuffle in [true, false] {
        let options = FragmentOptions {
            seed: Some(Seed::from("three")),
            fragment_count: Some(3),
            cross_image_shuffle,
            ..Default::default()
        };
        let (fragments, restored) = roundtrip(options, originals.clone(), None)
            .await
            .unwrap();

        // [3, 3, 2] blocks -> 2x2, 2x2 and 2x1 canvases
        let sizes: Vec<(u32, u32)> = fragments.iter().map(|f| (f.width, f.height)).collect();
        assert_eq!(sizes, vec![(2, 2), (2, 2), (2, 1)]);
        assert_eq!(restored, originals, "cross_image_shuffle = {}", cross_image_shuffle);
    }
}

#[tokio::test]
async fn clipped_edge_blocks_roundtrip() {
    let original = image(5, 5, 4);
    let options = FragmentOptions {
        block_size: 2,
        seed: Some(Seed::Number(5)),
        ..Default::default()
    };
    let sources = vec![SourceImage::new(original.clone())];
    let output = Fragmenter::new(NativeCrypto, options)
        .fragment_raw(sources)
        .await
        .unwrap();
    assert_eq!((output.manifest.images[0].x, output.manifest.images[0].y), (3, 3));

    let restored = Restorer::new(NativeCrypto, None)
        .restore_raw(&output.manifest, output.fragments)
        .await
        .unwrap();
    assert_eq!(restored, vec![original]);
}

#[tokio::test]
async fn missing_fragment_is_count_mismatch() {
    let sources = vec![SourceImage::new(image(2, 2, 0)), SourceImage::new(image(2, 2, 1))];
    let output = Fragmenter::new(NativeCrypto, FragmentOptions::default())
        .fragment_raw(sources)
        .await
        .unwrap();

    let mut fragments = output.fragments;
    fragments.truncate(1);
    let err = Restorer::new(NativeCrypto, None)
        .restore_raw(&output.manifest, fragments)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PixshardError::FragmentCountMismatch {
            expected: 2,
            actual: 1
        }
    ));
}

#[tokio::test]
async fn manifest_survives_json_between_runs() {
    let originals = vec![image(3, 2, 9)];
    let options = FragmentOptions {
        restore_file_name: true,
        ..Default::default()
    };
    let sources = vec![SourceImage::named("tiny", originals[0].clone())];
    let output = Fragmenter::new(NativeCrypto, options)
        .fragment_raw(sources)
        .await
        .unwrap();

    let manifest = pixshard::Manifest::from_bytes(&output.manifest.to_bytes().unwrap()).unwrap();
    assert_eq!(manifest.restored_file_name(0), "tiny.png");
    let restored = Restorer::new(NativeCrypto, None)
        .restore_raw(&manifest, output.fragments)
        .await
        .unwrap();
    assert_eq!(restored, originals);
}

/// Backend that suspends before every operation and delegates to [`NativeCrypto`]
struct YieldingCrypto;

impl CryptoProvider for YieldingCrypto {
    async fn encrypt_buffer(&self, buf: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> Result<Vec<u8>> {
        tokio::task::yield_now().await;
        NativeCrypto.encrypt_buffer(buf, key, iv).await
    }

    async fn decrypt_buffer(&self, buf: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> Result<Vec<u8>> {
        tokio::task::yield_now().await;
        NativeCrypto.decrypt_buffer(buf, key, iv).await
    }

    async fn key_to_32(&self, secret: &str) -> [u8; 32] {
        tokio::task::yield_now().await;
        NativeCrypto.key_to_32(secret).await
    }

    async fn generate_uuid(&self) -> String {
        tokio::task::yield_now().await;
        NativeCrypto.generate_uuid().await
    }

    async fn uuid_to_iv(&self, uuid: &str) -> Result<[u8; 16]> {
        tokio::task::yield_now().await;
        NativeCrypto.uuid_to_iv(uuid).await
    }
}

#[tokio::test]
async fn async_backend_matches_native_backend() {
    let original = image(4, 3, 6);
    let key = NativeCrypto.key_to_32("shared").await;
    assert_eq!(key, YieldingCrypto.key_to_32("shared").await);

    let iv = NativeCrypto
        .uuid_to_iv("00112233-4455-6677-8899-aabbccddeeff")
        .await
        .unwrap();
    let native = encrypt_image(&NativeCrypto, &original, &key, &iv).await.unwrap();
    let yielding = encrypt_image(&YieldingCrypto, &original, &key, &iv).await.unwrap();
    assert_eq!(native, yielding);

    // Fragments made with one backend restore with the other
    let options = FragmentOptions {
        secret: Some("shared".into()),
        seed: Some(Seed::Number(11)),
        ..Default::default()
    };
    let output = Fragmenter::new(YieldingCrypto, options)
        .fragment_raw(vec![SourceImage::new(original.clone())])
        .await
        .unwrap();
    let restored = Restorer::new(NativeCrypto, Some("shared".into()))
        .restore_raw(&output.manifest, output.fragments)
        .await
        .unwrap();
    assert_eq!(restored, vec![original.clone()]);

    // Frames decrypt through either backend
    let back = decrypt_image(&YieldingCrypto, &native, &key, &iv).await.unwrap();
    assert_eq!(back, original);
}
