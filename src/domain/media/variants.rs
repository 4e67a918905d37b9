use std::sync::Arc;

use futures::future::try_join_all;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::{
    constants::VARIANT_CONTENT_TYPE,
    entities::image::{EncodedVariant, Resolution},
    errors::MediaError,
};

/// Centered square covering the shorter axis: `(x, y, side)`.
///
/// The crop only depends on the source dimensions, so every resolution shows
/// the same region.
pub fn cover_crop(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}

/// Output edge for `resolution`; never larger than the source allows.
pub fn target_side(resolution: Resolution, width: u32, height: u32) -> u32 {
    resolution.px().min(width.min(height))
}

/// Crops `image` to its centered square.
pub fn square(image: &DynamicImage) -> Result<DynamicImage, MediaError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(MediaError::Transform("source image has zero width or height".into()));
    }

    let (x, y, side) = cover_crop(width, height);
    if x == 0 && y == 0 && side == width && side == height {
        return Ok(image.clone());
    }
    Ok(image.crop_imm(x, y, side, side))
}

/// Drops alpha by compositing onto white, so transparent product shots keep a
/// clean background in JPEG.
pub fn flatten_on_white(frame: &DynamicImage) -> RgbImage {
    if !frame.color().has_alpha() {
        return frame.to_rgb8();
    }

    let rgba = frame.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Resizes an already square image and encodes it as JPEG.
pub fn render_variant(
    square: &DynamicImage,
    resolution: Resolution,
    quality: u8,
) -> Result<EncodedVariant, MediaError> {
    let (side, _) = square.dimensions();
    let target = target_side(resolution, side, side);

    let resized;
    let frame = if target == side {
        square
    } else {
        resized = square.resize_exact(target, target, FilterType::Lanczos3);
        &resized
    };

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    flatten_on_white(frame)
        .write_with_encoder(encoder)
        .map_err(|e| MediaError::Transform(format!("{resolution}px encode failed: {e}")))?;

    Ok(EncodedVariant {
        resolution,
        width: target,
        height: target,
        content_type: VARIANT_CONTENT_TYPE,
        bytes,
    })
}

/// Renders every standard resolution concurrently on the blocking pool.
///
/// Succeeds only if all of them do.
pub async fn derive_variants(image: DynamicImage, quality: u8) -> Result<Vec<EncodedVariant>, MediaError> {
    let cropped = Arc::new(
        tokio::task::spawn_blocking(move || square(&image))
            .await
            .map_err(|e| MediaError::Transform(format!("crop task failed: {e}")))??,
    );

    let jobs = Resolution::ALL.into_iter().map(|resolution| {
        let cropped = Arc::clone(&cropped);
        async move {
            tokio::task::spawn_blocking(move || render_variant(&cropped, resolution, quality))
                .await
                .map_err(|e| MediaError::Transform(format!("{resolution}px task failed: {e}")))?
        }
    });

    try_join_all(jobs).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_is_centered_on_the_longer_axis() {
        assert_eq!(cover_crop(2000, 3000), (0, 500, 2000));
        assert_eq!(cover_crop(3000, 2000), (500, 0, 2000));
        assert_eq!(cover_crop(30, 30), (0, 0, 30));
    }

    #[test]
    fn small_sources_are_not_enlarged() {
        assert_eq!(target_side(Resolution::Thumbnail, 30, 30), 30);
        assert_eq!(target_side(Resolution::Large, 600, 2000), 600);
        assert_eq!(target_side(Resolution::Medium, 2000, 3000), 400);
    }

    #[test]
    fn transparency_is_flattened_onto_white() {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::from_fn(4, 1, |x, _| match x {
            0 => image::Rgba([0, 0, 0, 0]),
            1 => image::Rgba([0, 0, 0, 255]),
            2 => image::Rgba([200, 0, 0, 128]),
            _ => image::Rgba([10, 20, 30, 255]),
        }));

        let flat = flatten_on_white(&image);

        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([0, 0, 0]));
        assert_eq!(flat.get_pixel(2, 0), &Rgb([227, 127, 127]));
        assert_eq!(flat.get_pixel(3, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn transparent_source_renders_a_white_background() {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::new(16, 16));
        let variant = render_variant(&image, Resolution::Thumbnail, 90).unwrap();

        let decoded = image::load_from_memory(&variant.bytes).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c >= 250)));
    }
}
