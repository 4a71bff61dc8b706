// Image codec boundary: decode uploaded bytes, encode annotated frames.
//
// Decoding and JPEG encoding are CPU-intensive synchronous operations, so both
// run under spawn_blocking to keep the async runtime responsive. This boundary
// performs no implicit scaling; size limits are the orchestrator's job.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};

use crate::core::errors::{CodecResult, ImageCodecError};

/// JPEG quality for annotated responses. Fixed so identical pixels encode to
/// identical bytes.
const JPEG_QUALITY: u8 = 90;

/// Decode raw uploaded bytes into a pixel buffer.
///
/// Empty or corrupt input fails with `ImageCodecError::Decode`.
pub async fn load_image_from_memory_async(bytes: Vec<u8>) -> CodecResult<DynamicImage> {
    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).map_err(ImageCodecError::Decode)
    })
    .await
    .map_err(|e| {
        ImageCodecError::Decode(image::ImageError::IoError(std::io::Error::other(e)))
    })?;
    decoded
}

/// Encode an annotated pixel buffer as JPEG bytes.
pub async fn encode_jpeg_async(img: RgbImage) -> CodecResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
            .encode_image(&img)
            .map_err(ImageCodecError::Encode)?;
        Ok(buffer)
    })
    .await
    .map_err(|e| {
        ImageCodecError::Encode(image::ImageError::IoError(std::io::Error::other(e)))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 30, 200]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn decode_rejects_empty_bytes() {
        let err = load_image_from_memory_async(Vec::new()).await.unwrap_err();
        assert!(matches!(err, ImageCodecError::Decode(_)));
    }

    #[tokio::test]
    async fn decode_rejects_truncated_header() {
        // Valid PNG magic, nothing else
        let err = load_image_from_memory_async(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
            .await
            .unwrap_err();
        assert!(matches!(err, ImageCodecError::Decode(_)));
    }

    #[tokio::test]
    async fn decode_accepts_valid_png() {
        let img = load_image_from_memory_async(sample_png(32, 24)).await.unwrap();
        assert_eq!((img.width(), img.height()), (32, 24));
    }

    #[tokio::test]
    async fn jpeg_reencode_preserves_dimensions() {
        let decoded = load_image_from_memory_async(sample_png(48, 36)).await.unwrap();
        let jpeg = encode_jpeg_async(decoded.to_rgb8()).await.unwrap();
        let redecoded = load_image_from_memory_async(jpeg).await.unwrap();
        assert_eq!((redecoded.width(), redecoded.height()), (48, 36));
    }

    #[tokio::test]
    async fn jpeg_encode_is_deterministic() {
        let decoded = load_image_from_memory_async(sample_png(16, 16)).await.unwrap();
        let first = encode_jpeg_async(decoded.to_rgb8()).await.unwrap();
        let second = encode_jpeg_async(decoded.to_rgb8()).await.unwrap();
        assert_eq!(first, second);
    }
}
