use crate::analyzer::{RawDetection, RawRegion};
use crate::models::{FaceResult, Region};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("emotion score for '{label}' is not a finite number")]
    NonFiniteScore { label: String },
}

/// Resolves a backend region against the frame it was detected in. Missing
/// coordinates fall back to the full-frame box; fractional ones truncate.
pub fn resolve_region(region: &RawRegion, frame_width: u32, frame_height: u32) -> Region {
    let full = Region::full_frame(frame_width, frame_height);
    match region {
        RawRegion::Quad([x, y, w, h]) => Region {
            x: *x as i64,
            y: *y as i64,
            w: *w as i64,
            h: *h as i64,
        },
        RawRegion::Mapping(fields) => Region {
            x: fields.x.map_or(full.x, |v| v as i64),
            y: fields.y.map_or(full.y, |v| v as i64),
            w: fields.w.map_or(full.w, |v| v as i64),
            h: fields.h.map_or(full.h, |v| v as i64),
        },
        RawRegion::Missing => full,
    }
}

pub fn format_detection(
    detection: RawDetection,
    frame_width: u32,
    frame_height: u32,
) -> Result<FaceResult, FormatError> {
    if let Some((label, _)) = detection.emotion.iter().find(|(_, score)| !score.is_finite()) {
        return Err(FormatError::NonFiniteScore {
            label: label.clone(),
        });
    }

    Ok(FaceResult {
        region: resolve_region(&detection.region, frame_width, frame_height),
        dominant_emotion: detection.dominant_emotion,
        emotion_scores: detection.emotion,
    })
}
