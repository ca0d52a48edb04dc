use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SERVICE_NAME: &str = "pathos-emotion-api";

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub frame: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Region {
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            w: i64::from(width),
            h: i64::from(height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceResult {
    pub dominant_emotion: String,
    pub emotion_scores: BTreeMap<String, f64>,
    pub region: Region,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigReport {
    pub max_image_size: u32,
    pub confidence_threshold: f64,
    pub max_faces: usize,
    pub timeout: u64,
    pub cache_size: usize,
}

#[derive(Debug, Serialize)]
pub struct Hardware {
    pub cpu_cores: usize,
    pub numeric_threads: usize,
}

#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub max_image_size: u32,
    pub max_faces: usize,
    pub numeric_threads: usize,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub deployment: String,
    pub config: ConfigSummary,
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub analyze_screen: &'static str,
    pub health: &'static str,
    pub config: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub deployment: String,
    pub hardware: Hardware,
    pub config: ConfigReport,
    pub cache: CacheStats,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub config: ConfigReport,
    pub hardware: Hardware,
}
