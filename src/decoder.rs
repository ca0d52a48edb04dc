use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;

/// Standard alphabet, padding optional. Browsers and canvas exports are not
/// consistent about trailing `=`.
const FRAME_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame payload is empty")]
    Empty,
    #[error("frame payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("frame bytes are not a supported image: {0}")]
    Image(#[from] image::ImageError),
}

/// Drops a `data:image/...;base64,` style prefix, if any.
pub fn strip_data_url(frame: &str) -> &str {
    match frame.split_once(',') {
        Some((_, data)) => data,
        None => frame,
    }
}

pub fn decode_frame(frame: &str) -> Result<RgbImage, DecodeError> {
    let payload: String = strip_data_url(frame)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = FRAME_ENGINE.decode(payload.as_bytes())?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image.to_rgb8())
}

/// Downscales `frame` so its longer side is at most `max_side`, keeping the
/// aspect ratio. Frames already within bounds are returned untouched.
pub fn fit_within(frame: RgbImage, max_side: u32) -> RgbImage {
    let (width, height) = frame.dimensions();
    let longer = width.max(height);
    if longer <= max_side {
        return frame;
    }

    let scale = f64::from(max_side) / f64::from(longer);
    let (new_width, new_height) = if width >= height {
        (max_side, scale_side(height, scale))
    } else {
        (scale_side(width, scale), max_side)
    };

    imageops::resize(&frame, new_width, new_height, FilterType::Triangle)
}

fn scale_side(side: u32, scale: f64) -> u32 {
    ((f64::from(side) * scale).round() as u32).max(1)
}
