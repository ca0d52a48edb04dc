use crate::cache::cache_key;
use crate::decoder::{decode_frame, fit_within};
use crate::error::AnalyzeError;
use crate::formatter::format_detection;
use crate::models::{
    AnalyzeRequest, CacheStats, ConfigResponse, ConfigSummary, Endpoints, FaceResult, Hardware,
    HealthResponse, ServiceInfo, SERVICE_NAME,
};
use crate::state::AppState;
use serde_json::json;
use tracing::{debug, info};
use warp::{Rejection, Reply};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn hardware(state: &AppState) -> Hardware {
    Hardware {
        cpu_cores: std::thread::available_parallelism().map_or(1, |n| n.get()),
        numeric_threads: state.config.numeric_threads,
    }
}

pub async fn index_handler(state: AppState) -> Result<impl Reply, Rejection> {
    let config = &state.config;
    Ok(warp::reply::json(&ServiceInfo {
        status: "healthy",
        service: SERVICE_NAME,
        version: VERSION,
        deployment: config.deployment.clone(),
        config: ConfigSummary {
            max_image_size: config.max_image_size,
            max_faces: config.max_faces,
            numeric_threads: config.numeric_threads,
        },
    }))
}

pub async fn health_handler(state: AppState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: VERSION,
        deployment: state.config.deployment.clone(),
        hardware: hardware(&state),
        config: state.config.report(),
        cache: CacheStats {
            size: state.cache.len(),
            max_size: state.cache.capacity(),
        },
        endpoints: Endpoints {
            analyze_screen: "/analyze_screen",
            health: "/health",
            config: "/config",
        },
    }))
}

pub async fn config_handler(state: AppState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&ConfigResponse {
        config: state.config.report(),
        hardware: hardware(&state),
    }))
}

pub async fn analyze_preflight_handler() -> Result<impl Reply, Rejection> {
    let reply = warp::reply::json(&json!({ "success": true }));
    let reply = warp::reply::with_header(reply, "Access-Control-Allow-Headers", "Content-Type");
    Ok(warp::reply::with_header(
        reply,
        "Access-Control-Allow-Methods",
        "POST",
    ))
}

pub async fn analyze_screen_handler(
    body: AnalyzeRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    info!("Received emotion analysis request");

    let frame = match body.frame {
        Some(frame) if !frame.is_empty() => frame,
        _ => return Err(warp::reject::custom(AnalyzeError::MissingFrame)),
    };

    let faces = analyze_frame(&state, frame)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&faces))
}

/// Cache lookup, then decode and analysis on the blocking pool.
///
/// Lookup and store are separate critical sections: concurrent requests for
/// the same uncached frame each run the analyzer and the last store wins.
pub async fn analyze_frame(
    state: &AppState,
    frame: String,
) -> Result<Vec<FaceResult>, AnalyzeError> {
    let key = cache_key(&frame, state.config.cache_key_scope);
    if let Some(cached) = state.cache.get(&key) {
        info!(faces = cached.len(), "Returning cached result");
        return Ok(cached);
    }

    let worker = state.clone();
    let faces = tokio::task::spawn_blocking(move || run_pipeline(&worker, &frame))
        .await
        .map_err(|e| AnalyzeError::Unexpected(e.to_string()))??;

    state.cache.insert(key, faces.clone());
    info!(faces = faces.len(), "Analysis complete");
    Ok(faces)
}

fn run_pipeline(state: &AppState, frame: &str) -> Result<Vec<FaceResult>, AnalyzeError> {
    let config = &state.config;

    let decoded = decode_frame(frame).map_err(AnalyzeError::InvalidImage)?;
    let original = decoded.dimensions();
    let frame = fit_within(decoded, config.max_image_size);
    let (width, height) = frame.dimensions();
    if (width, height) != original {
        info!("Resized image to {}x{}", width, height);
    }

    debug!("Starting emotion analysis");
    let mut detections = state.analyzer.analyze(&frame)?.into_detections();

    if detections.len() > config.max_faces {
        detections.truncate(config.max_faces);
        info!(max_faces = config.max_faces, "Limited detections");
    }

    detections
        .into_iter()
        .map(|detection| format_detection(detection, width, height))
        .collect::<Result<Vec<_>, _>>()
        .map_err(AnalyzeError::from)
}
