use crate::error;
use crate::handlers;
use crate::middleware;
use crate::state::AppState;
use std::convert::Infallible;
use warp::{Filter, Reply};

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let max_body_bytes = state.config.max_body_bytes;
    let state = warp::any().map(move || state.clone());

    let index = warp::path::end()
        .and(warp::get())
        .and(state.clone())
        .and_then(handlers::index_handler);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(state.clone())
        .and_then(handlers::health_handler);

    let config = warp::path("config")
        .and(warp::path::end())
        .and(warp::get())
        .and(state.clone())
        .and_then(handlers::config_handler);

    let preflight = warp::path("analyze_screen")
        .and(warp::path::end())
        .and(warp::options())
        .and_then(handlers::analyze_preflight_handler);

    let analyze = warp::path("analyze_screen")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(max_body_bytes))
        .and(warp::body::json())
        .and(state)
        .and_then(handlers::analyze_screen_handler);

    let api = index
        .or(health)
        .or(config)
        .or(preflight)
        .or(analyze)
        .recover(error::handle_rejection);

    middleware::with_request_id()
        .and(api)
        .map(|request_id: String, reply| middleware::add_request_id_header(reply, request_id))
        .with(warp::reply::with::header("Access-Control-Allow-Origin", "*"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::testing::{detection, StubAnalyzer};
    use crate::analyzer::RawRegion;
    use crate::config::Config;
    use crate::decoder::fixtures::png_base64;
    use clap::Parser;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use warp::http::StatusCode;

    fn app(stub: Arc<StubAnalyzer>, args: &[&str]) -> AppState {
        let argv = std::iter::once("pathos-api").chain(args.iter().copied());
        AppState::new(Config::parse_from(argv), stub)
    }

    fn happy_stub() -> Arc<StubAnalyzer> {
        Arc::new(StubAnalyzer::returning(vec![detection(
            "happy",
            RawRegion::Quad([1.0, 2.0, 3.0, 4.0]),
        )]))
    }

    fn body(response: &TestResponse) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    type TestResponse = warp::http::Response<warp::hyper::body::Bytes>;

    async fn post_analyze(state: &AppState, payload: &Value) -> TestResponse {
        warp::test::request()
            .method("POST")
            .path("/analyze_screen")
            .json(payload)
            .reply(&routes(state.clone()))
            .await
    }

    #[tokio::test]
    async fn missing_frame_is_rejected() {
        let state = app(happy_stub(), &[]);

        for payload in [json!({}), json!({ "frame": "" }), json!({ "frame": null })] {
            let response = post_analyze(&state, &payload).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body(&response), json!({ "error": "No frame data provided" }));
        }
    }

    #[tokio::test]
    async fn undecodable_frame_is_rejected() {
        let state = app(happy_stub(), &[]);

        let response = post_analyze(&state, &json!({ "frame": "not-base64!!" })).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response), json!({ "error": "Invalid image data" }));
    }

    #[tokio::test]
    async fn non_json_body_is_rejected() {
        let state = app(happy_stub(), &[]);

        let response = warp::test::request()
            .method("POST")
            .path("/analyze_screen")
            .header("content-type", "application/json")
            .body("frame=abc")
            .reply(&routes(state))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response), json!({ "error": "Invalid request format" }));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let state = app(happy_stub(), &["--max-body-bytes", "16"]);

        let response = post_analyze(&state, &json!({ "frame": png_base64(4, 4) })).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn analyzes_data_url_frame() {
        let stub = happy_stub();
        let state = app(stub.clone(), &[]);
        let frame = format!("data:image/png;base64,{}", png_base64(8, 8));

        let response = post_analyze(&state, &json!({ "frame": frame })).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(&response),
            json!([{
                "dominant_emotion": "happy",
                "emotion_scores": { "angry": 1.5, "happy": 90.25, "neutral": 8.25 },
                "region": { "x": 1, "y": 2, "w": 3, "h": 4 }
            }])
        );
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn repeated_frame_hits_cache() {
        let stub = happy_stub();
        let state = app(stub.clone(), &[]);
        let payload = json!({ "frame": png_base64(8, 8) });

        let first = post_analyze(&state, &payload).await;
        let second = post_analyze(&state, &payload).await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(first.body(), second.body());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn analyzer_failure_is_internal_error_with_message() {
        let state = app(Arc::new(StubAnalyzer::failing("model not loaded")), &[]);

        let response = post_analyze(&state, &json!({ "frame": png_base64(8, 8) })).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(&response),
            json!({ "error": "analyzer returned 500: model not loaded" })
        );
    }

    #[tokio::test]
    async fn concurrent_identical_frames_both_compute_and_leave_one_entry() {
        // Both requests must be inside the analyzer before either stores.
        let stub = Arc::new(
            StubAnalyzer::returning(vec![detection(
                "happy",
                RawRegion::Quad([1.0, 2.0, 3.0, 4.0]),
            )])
            .gated(2),
        );
        let state = app(stub.clone(), &[]);
        let payload = json!({ "frame": png_base64(12, 12) });

        let (a, b) = futures_util::future::join(
            post_analyze(&state, &payload),
            post_analyze(&state, &payload),
        )
        .await;

        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::OK);
        assert_eq!(a.body(), b.body());
        assert_eq!(stub.calls(), 2);
        assert_eq!(state.cache.len(), 1);
    }

    #[tokio::test]
    async fn preflight_advertises_cors() {
        let state = app(happy_stub(), &[]);

        let response = warp::test::request()
            .method("OPTIONS")
            .path("/analyze_screen")
            .reply(&routes(state))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), json!({ "success": true }));
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type");
        assert_eq!(headers["access-control-allow-methods"], "POST");
    }

    #[tokio::test]
    async fn index_reports_service_metadata() {
        let state = app(happy_stub(), &[]);

        let response = warp::test::request().path("/").reply(&routes(state)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body(&response);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "pathos-emotion-api");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["config"]["max_image_size"], 1024);
        assert_eq!(json["config"]["max_faces"], 10);
    }

    #[tokio::test]
    async fn health_reports_cache_usage() {
        let state = app(happy_stub(), &["--cache-size", "5"]);
        post_analyze(&state, &json!({ "frame": png_base64(8, 8) })).await;

        let response = warp::test::request()
            .path("/health")
            .reply(&routes(state))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body(&response);
        assert_eq!(json["cache"], json!({ "size": 1, "max_size": 5 }));
        assert_eq!(json["config"]["cache_size"], 5);
        assert_eq!(json["endpoints"]["analyze_screen"], "/analyze_screen");
    }

    #[tokio::test]
    async fn config_reports_unenforced_fields() {
        let state = app(
            happy_stub(),
            &["--confidence-threshold", "0.5", "--timeout-secs", "12"],
        );

        let response = warp::test::request().path("/config").reply(&routes(state)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body(&response);
        assert_eq!(json["config"]["confidence_threshold"], 0.5);
        assert_eq!(json["config"]["timeout"], 12);
        assert_eq!(json["hardware"]["numeric_threads"], 2);
        assert!(json["hardware"]["cpu_cores"].as_u64().unwrap() >= 1);
        assert!(json["hardware"].get("ram_gb").is_none());
    }

    #[tokio::test]
    async fn unknown_path_is_json_not_found() {
        let state = app(happy_stub(), &[]);

        let response = warp::test::request().path("/nope").reply(&routes(state)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body(&response)["error"].is_string());
    }
}
