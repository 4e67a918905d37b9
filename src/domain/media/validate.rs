use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, ImageReader, Limits};
use tracing::debug;

use crate::{
    constants::MAX_SOURCE_DIMENSION,
    entities::image::Upload,
    errors::UploadRejection,
};

/// An upload that passed every check, decoded and ready for resizing.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub label: String,
    pub format: ImageFormat,
    pub image: DynamicImage,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Checks size and real format of an upload and decodes it.
///
/// The declared content type is advisory: a payload whose bytes decode as an
/// image is accepted whatever the client claimed.
pub fn validate_upload(upload: &Upload, max_bytes: usize) -> Result<DecodedImage, UploadRejection> {
    let file = upload.label().to_string();

    if upload.bytes.is_empty() {
        return Err(UploadRejection::EmptyPayload { file });
    }
    if upload.bytes.len() > max_bytes {
        return Err(UploadRejection::TooLarge {
            file,
            size: upload.bytes.len(),
            limit: max_bytes,
        });
    }

    let format = image::guess_format(&upload.bytes).map_err(|_| UploadRejection::UnsupportedFormat {
        file: file.clone(),
        detected: sniffed_mime(upload),
    })?;

    if let Some(declared) = upload.declared_type.as_deref() {
        if !declared.eq_ignore_ascii_case(format.to_mime_type()) {
            debug!(
                file = %file, declared, sniffed = format.to_mime_type(),
                "Declared content type differs from file contents"
            );
        }
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SOURCE_DIMENSION);
    limits.max_image_height = Some(MAX_SOURCE_DIMENSION);

    let mut reader = ImageReader::with_format(Cursor::new(upload.bytes.as_slice()), format);
    reader.limits(limits);

    let image = reader.decode().map_err(|e| match e {
        ImageError::Unsupported(_) => UploadRejection::UnsupportedFormat {
            file: file.clone(),
            detected: format.to_mime_type().to_string(),
        },
        other => UploadRejection::Corrupt {
            file: file.clone(),
            reason: other.to_string(),
        },
    })?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(UploadRejection::Corrupt {
            file,
            reason: "image has zero width or height".into(),
        });
    }

    Ok(DecodedImage { label: file, format, image })
}

/// Best description of what the bytes are, for rejection messages.
fn sniffed_mime(upload: &Upload) -> String {
    infer::get(&upload.bytes)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| upload.declared_type.clone())
        .unwrap_or_else(|| "unknown".to_string())
}
