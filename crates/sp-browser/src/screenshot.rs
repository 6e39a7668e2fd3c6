//! Screenshot pipeline
//!
//! Turns a raw viewport capture into a transport-ready data URI. Lossy
//! JPEG re-encoding bounds the event-channel payload size.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;

use crate::error::{BrowserError, Result};

/// Encode a raw PNG frame as a base64 JPEG data URI.
///
/// Pure function of its input; zero-byte or malformed frames fail with
/// `Encode` instead of producing corrupted output.
pub fn encode_jpeg_data_uri(raw_png: &[u8], quality: u8) -> Result<String> {
    if raw_png.is_empty() {
        return Err(BrowserError::Encode("empty frame".to_string()));
    }

    let image = image::load_from_memory(raw_png)
        .map_err(|e| BrowserError::Encode(format!("malformed frame: {}", e)))?;

    // JPEG has no alpha channel
    let rgb = image.to_rgb8();

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| BrowserError::Encode(format!("jpeg encoding failed: {}", e)))?;

    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};

    fn sample_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(4, 4, |x, y| {
            image::Rgba([(x * 60) as u8, (y * 60) as u8, 128, 255])
        });
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    #[test]
    fn test_encode_produces_jpeg_data_uri() {
        let uri = encode_jpeg_data_uri(&sample_png(), 80).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));

        // the payload decodes back to JPEG magic bytes
        let payload = STANDARD
            .decode(uri.trim_start_matches("data:image/jpeg;base64,"))
            .unwrap();
        assert_eq!(&payload[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_is_pure() {
        let png = sample_png();
        assert_eq!(
            encode_jpeg_data_uri(&png, 80).unwrap(),
            encode_jpeg_data_uri(&png, 80).unwrap()
        );
    }

    #[test]
    fn test_empty_frame_fails() {
        let err = encode_jpeg_data_uri(&[], 80).unwrap_err();
        assert!(matches!(err, BrowserError::Encode(_)));
    }

    #[test]
    fn test_malformed_frame_fails() {
        let err = encode_jpeg_data_uri(b"definitely not a png", 80).unwrap_err();
        assert!(matches!(err, BrowserError::Encode(_)));
    }
}
