use std::convert::Infallible;
use tracing::info;
use uuid::Uuid;
use warp::{Filter, Reply};

pub fn with_request_id() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::any()
        .and(warp::method())
        .and(warp::path::full())
        .map(|method: warp::http::Method, path: warp::path::FullPath| {
            let request_id = Uuid::new_v4().to_string();
            info!(request_id = %request_id, %method, path = path.as_str(), "Processing request");
            request_id
        })
}

pub fn add_request_id_header<T: Reply>(reply: T, request_id: String) -> impl Reply {
    warp::reply::with_header(reply, "X-Request-ID", request_id)
}
