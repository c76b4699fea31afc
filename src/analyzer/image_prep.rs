//! Image reading, validation, and base64 encoding for the vision API.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageFormat;
use tracing::info;

use super::types::EncodedImage;
use crate::error::OutfitCheckError;

/// Maximum accepted image size. Larger uploads are rejected before encoding.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Read an image file and produce its base64 payload.
///
/// Suspends until the read completes. Fails with `Encoding` if the file
/// cannot be read, is too large, or is not a recognized image format.
pub async fn encode_image(path: &Path) -> Result<EncodedImage, OutfitCheckError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        OutfitCheckError::Encoding(format!("Failed to read image {}: {}", path.display(), e))
    })?;
    encode_bytes(&bytes)
}

/// Validate raw image bytes and encode them as base64.
///
/// The returned `data` is raw base64 only; the data-URL prefix a browser
/// reader would produce is never present.
pub fn encode_bytes(bytes: &[u8]) -> Result<EncodedImage, OutfitCheckError> {
    if bytes.is_empty() {
        return Err(OutfitCheckError::Encoding("Image is empty".to_string()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(OutfitCheckError::Encoding(format!(
            "Image is {} bytes; maximum is {} bytes",
            bytes.len(),
            MAX_IMAGE_BYTES
        )));
    }

    let format = image::guess_format(bytes).map_err(|e| {
        OutfitCheckError::Encoding(format!(
            "Unrecognized image data: {}. Ensure it's a valid JPEG/PNG/GIF/WebP.",
            e
        ))
    })?;
    let media_type = media_type_for(format)?;

    let data = STANDARD.encode(bytes);
    info!(
        "Encoded {} byte {} image to {} base64 chars",
        bytes.len(),
        media_type,
        data.len()
    );

    Ok(EncodedImage {
        media_type: media_type.to_string(),
        data,
    })
}

/// Media type for the vision API payload, derived from the sniffed format.
fn media_type_for(format: ImageFormat) -> Result<&'static str, OutfitCheckError> {
    match format {
        ImageFormat::Jpeg => Ok("image/jpeg"),
        ImageFormat::Png => Ok("image/png"),
        ImageFormat::Gif => Ok("image/gif"),
        ImageFormat::WebP => Ok("image/webp"),
        other => Err(OutfitCheckError::Encoding(format!(
            "Unsupported image format: {:?}. Use JPEG, PNG, GIF, or WebP.",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_encode_bytes_png() {
        let encoded = encode_bytes(&png_bytes(300, 300)).unwrap();
        assert_eq!(encoded.media_type, "image/png");

        // Payload must round-trip through base64 back to the original bytes.
        let decoded = STANDARD.decode(&encoded.data).unwrap();
        assert_eq!(decoded, png_bytes(300, 300));
    }

    #[test]
    fn test_encoded_payload_has_no_data_url_prefix() {
        let encoded = encode_bytes(&png_bytes(100, 100)).unwrap();
        assert!(!encoded.data.contains("data:"));
        assert!(!encoded.data.contains(";base64,"));
        assert!(!encoded.data.contains(','));
    }

    #[test]
    fn test_encode_bytes_jpeg_media_type() {
        let img = DynamicImage::new_rgb8(100, 100);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();

        let encoded = encode_bytes(&buffer.into_inner()).unwrap();
        assert_eq!(encoded.media_type, "image/jpeg");
    }

    #[test]
    fn test_encode_bytes_rejects_garbage() {
        let result = encode_bytes(b"not an image");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unrecognized"));
    }

    #[test]
    fn test_encode_bytes_rejects_empty() {
        let result = encode_bytes(&[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_bytes_rejects_oversized() {
        let oversized = vec![0u8; MAX_IMAGE_BYTES + 1];
        let result = encode_bytes(&oversized);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("maximum"));
    }

    #[tokio::test]
    async fn test_encode_image_missing_file() {
        let result = encode_image(Path::new("/nonexistent/outfit.png")).await;
        assert!(matches!(result, Err(OutfitCheckError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_encode_image_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("outfit.png");
        std::fs::write(&path, png_bytes(200, 200)).unwrap();

        let encoded = encode_image(&path).await.unwrap();
        assert_eq!(encoded.media_type, "image/png");
        assert!(!encoded.data.is_empty());
    }
}
