use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty frame payload")]
    EmptyPayload,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("invalid image container: {0}")]
    InvalidImage(#[from] image::ImageError),
}

/// Decode a WebSocket text frame into an RGB image.
///
/// Accepts either raw base64 or the data-URL style
/// `"<header>,<base64>"` that browser canvas captures produce; the
/// header is discarded. The base64 alphabet never contains a comma, so
/// splitting on the first one is unambiguous.
pub fn decode_text_frame(payload: &str) -> Result<RgbImage, DecodeError> {
    let b64 = match payload.split_once(',') {
        Some((_header, rest)) => rest,
        None => payload,
    };
    let b64 = b64.trim();

    if b64.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let bytes = STANDARD.decode(b64)?;
    decode_binary_frame(&bytes)
}

/// Decode a raw image byte stream (HTTP upload body or binary WebSocket
/// frame) into an RGB image. Container format is sniffed from the
/// bytes; anything the `image` crate cannot parse is a decode failure.
pub fn decode_binary_frame(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    fn test_png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, Rgb([12, 34, 56]));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn decodes_raw_base64_png() {
        let b64 = STANDARD.encode(test_png_bytes());
        let img = decode_text_frame(&b64).unwrap();
        assert_eq!(img.dimensions(), (4, 4));
        assert_eq!(img.get_pixel(0, 0).0, [12, 34, 56]);
    }

    #[test]
    fn decodes_data_url_prefixed_base64() {
        let payload = format!("data:image/png;base64,{}", STANDARD.encode(test_png_bytes()));
        let img = decode_text_frame(&payload).unwrap();
        assert_eq!(img.dimensions(), (4, 4));
    }

    #[test]
    fn rejects_malformed_base64() {
        let err = decode_text_frame("not@valid@base64!").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidBase64(_)));
    }

    #[test]
    fn rejects_truncated_image_container() {
        let mut bytes = test_png_bytes();
        bytes.truncate(10);
        let err = decode_binary_frame(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidImage(_)));
    }

    #[test]
    fn rejects_valid_base64_wrapping_garbage() {
        let b64 = STANDARD.encode(b"this is not an image");
        let err = decode_text_frame(&b64).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidImage(_)));
    }

    #[test]
    fn rejects_empty_payloads() {
        assert!(matches!(
            decode_text_frame(""),
            Err(DecodeError::EmptyPayload)
        ));
        assert!(matches!(
            decode_text_frame("data:image/jpeg;base64,"),
            Err(DecodeError::EmptyPayload)
        ));
        assert!(matches!(
            decode_binary_frame(&[]),
            Err(DecodeError::EmptyPayload)
        ));
    }

    #[test]
    fn binary_decode_roundtrips_jpeg() {
        let img = RgbImage::from_pixel(8, 6, Rgb([200, 100, 50]));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Jpeg).unwrap();

        let decoded = decode_binary_frame(&bytes.into_inner()).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }
}
