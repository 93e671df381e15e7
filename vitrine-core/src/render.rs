//! Turning fetched bytes into something the renderer can show.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use vitrine_model::{ImageEncoding, ModelError, RenderableImage};

use crate::transport::Payload;

/// Classify a payload and read its dimensions when the header allows it.
///
/// Only an empty payload is rejected; anything else is handed to the
/// renderer, tagged [`ImageEncoding::Unknown`] if it cannot be identified.
pub fn decode(payload: &Payload) -> Result<RenderableImage, ModelError> {
    let encoding = sniff(&payload.bytes)
        .or_else(|| {
            looks_like_svg(&payload.bytes).then_some(ImageEncoding::Svg)
        })
        .or_else(|| {
            payload
                .content_type
                .as_deref()
                .and_then(ImageEncoding::from_mime)
        })
        .unwrap_or(ImageEncoding::Unknown);

    let image = RenderableImage::new(payload.bytes.clone(), encoding)?;
    Ok(match dimensions(&payload.bytes) {
        Some((width, height)) => image.with_dimensions(width, height),
        None => image,
    })
}

fn sniff(bytes: &[u8]) -> Option<ImageEncoding> {
    let raster = match image::guess_format(bytes).ok()? {
        ImageFormat::Png => ImageEncoding::Png,
        ImageFormat::Jpeg => ImageEncoding::Jpeg,
        ImageFormat::Gif => ImageEncoding::Gif,
        ImageFormat::WebP => ImageEncoding::WebP,
        ImageFormat::Bmp => ImageEncoding::Bmp,
        ImageFormat::Avif => ImageEncoding::Avif,
        _ => return None,
    };
    Some(raster)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start();
    text.starts_with("<svg")
        || (text.starts_with("<?xml") && text.contains("<svg"))
}

fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image::RgbaImage::new(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn png_payload_is_tagged_with_dimensions() {
        let image = decode(&Payload::new(png_bytes(3, 2))).unwrap();
        assert_eq!(image.encoding(), ImageEncoding::Png);
        assert_eq!(image.dimensions(), Some((3, 2)));
    }

    #[test]
    fn content_type_is_used_when_magic_is_unknown() {
        let payload = Payload::new(b"not really a jpeg".to_vec())
            .with_content_type("image/jpeg");
        let image = decode(&payload).unwrap();
        assert_eq!(image.encoding(), ImageEncoding::Jpeg);
        assert_eq!(image.dimensions(), None);
    }

    #[test]
    fn svg_documents_are_recognized() {
        let payload = Payload::new(
            br#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"/>"#
                .to_vec(),
        );
        assert_eq!(decode(&payload).unwrap().encoding(), ImageEncoding::Svg);
    }

    #[test]
    fn unidentified_payload_is_still_renderable() {
        let image = decode(&Payload::new(vec![0u8; 4])).unwrap();
        assert_eq!(image.encoding(), ImageEncoding::Unknown);
    }

    #[test]
    fn empty_payload_is_an_error() {
        assert_eq!(
            decode(&Payload::new(Vec::new())).unwrap_err(),
            ModelError::EmptyPayload
        );
    }
}
