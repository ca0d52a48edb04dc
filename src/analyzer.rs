//! Boundary to the face detection and emotion classification backend.
//!
//! The backend is a DeepFace-compatible inference service. Its replies are
//! loosely shaped: one detection or a list of them, optionally wrapped in a
//! `results` envelope, with a `region` that may be a 4-element sequence, an
//! `x/y/w/h` mapping, or nothing at all. Everything is parsed into
//! [`AnalyzerOutput`] here so the rest of the service sees fixed types.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageOutputFormat, RgbImage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to encode frame for analysis: {0}")]
    Encode(#[from] image::ImageError),
    #[error("analyzer request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("analyzer returned {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("analyzer returned an unexpected payload: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Runs detection and classification on a decoded frame.
///
/// Implementations block the calling thread. A frame without a detectable
/// face must still produce a result rather than an error.
pub trait EmotionAnalyzer: Send + Sync {
    fn analyze(&self, frame: &RgbImage) -> Result<AnalyzerOutput, AnalysisError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnalyzerOutput {
    Many(Vec<RawDetection>),
    Single(RawDetection),
}

impl AnalyzerOutput {
    pub fn into_detections(self) -> Vec<RawDetection> {
        match self {
            AnalyzerOutput::Many(detections) => detections,
            AnalyzerOutput::Single(detection) => vec![detection],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
    pub emotion: BTreeMap<String, f64>,
    pub dominant_emotion: String,
    #[serde(default)]
    pub region: RawRegion,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionFields {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub w: Option<f64>,
    pub h: Option<f64>,
}

/// Face bounding box as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(from = "Option<Value>")]
pub enum RawRegion {
    Quad([f64; 4]),
    Mapping(RegionFields),
    /// Absent, empty, or of a shape we do not understand.
    #[default]
    Missing,
}

impl From<Option<Value>> for RawRegion {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(Value::Array(items)) => quad(&items).unwrap_or_else(|| {
                debug!(len = items.len(), "Ignoring malformed region sequence");
                RawRegion::Missing
            }),
            Some(Value::Object(map)) if !map.is_empty() => RawRegion::Mapping(RegionFields {
                x: map.get("x").and_then(coordinate),
                y: map.get("y").and_then(coordinate),
                w: map.get("w").and_then(coordinate),
                h: map.get("h").and_then(coordinate),
            }),
            _ => RawRegion::Missing,
        }
    }
}

fn quad(items: &[Value]) -> Option<RawRegion> {
    if items.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = coordinate(item)?;
    }
    Some(RawRegion::Quad(out))
}

fn coordinate(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Wrapped { results: AnalyzerOutput },
    Bare(AnalyzerOutput),
}

impl From<Envelope> for AnalyzerOutput {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::Wrapped { results } => results,
            Envelope::Bare(output) => output,
        }
    }
}

pub fn parse_output(body: &str) -> Result<AnalyzerOutput, AnalysisError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    Ok(envelope.into())
}

#[derive(Serialize)]
struct AnalyzeCall<'a> {
    img: String,
    actions: [&'a str; 1],
    enforce_detection: bool,
    detector_backend: &'a str,
    silent: bool,
}

/// Calls a remote DeepFace-style `/analyze` endpoint.
pub struct HttpAnalyzer {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    /// Builds the blocking client. Call this outside of an async runtime.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AnalysisError> {
        // No request timeout: the configured `timeout` is informational.
        // The backend is a sidecar, never reached through a proxy.
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl EmotionAnalyzer for HttpAnalyzer {
    fn analyze(&self, frame: &RgbImage) -> Result<AnalyzerOutput, AnalysisError> {
        let mut png = Cursor::new(Vec::new());
        frame.write_to(&mut png, ImageOutputFormat::Png)?;

        let call = AnalyzeCall {
            img: format!("data:image/png;base64,{}", STANDARD.encode(png.into_inner())),
            actions: ["emotion"],
            enforce_detection: false,
            detector_backend: "opencv",
            silent: true,
        };

        debug!(endpoint = %self.endpoint, "Calling emotion analyzer");
        let response = self.client.post(&self.endpoint).json(&call).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(AnalysisError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        parse_output(&body)
    }
}
