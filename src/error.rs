use crate::analyzer::AnalysisError;
use crate::decoder::DecodeError;
use crate::formatter::FormatError;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::{http::StatusCode, reject::Reject, Rejection, Reply};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("No frame data provided")]
    MissingFrame,
    #[error("Invalid image data")]
    InvalidImage(#[source] DecodeError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("{0}")]
    Unexpected(String),
}

impl AnalyzeError {
    pub fn status(&self) -> StatusCode {
        match self {
            AnalyzeError::MissingFrame | AnalyzeError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Reject for AnalyzeError {}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if let Some(e) = err.find::<AnalyzeError>() {
        match e {
            AnalyzeError::MissingFrame => warn!("No frame data provided"),
            AnalyzeError::InvalidImage(source) => warn!(error = %source, "Invalid image data"),
            _ => error!(error = %e, "Error processing frame"),
        }
        (e.status(), e.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        warn!("Deserialization error details: {}", e);
        (
            StatusCode::BAD_REQUEST,
            "Invalid request format".to_string(),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Frame payload exceeds the maximum allowed size".to_string(),
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "A Content-Length header is required".to_string(),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Request body must be JSON".to_string(),
        )
    } else if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            "The requested resource was not found".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "This method is not allowed for this endpoint".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred".to_string(),
        )
    };

    let json = warp::reply::json(&ErrorResponse { error: message });

    Ok(warp::reply::with_status(json, code))
}
