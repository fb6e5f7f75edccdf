//! HTTP surface: frame ingestion, counter reset/status, liveness.
//!
//! The handlers are plumbing around the session state; all counting
//! decisions live in [`crate::counter`]. Session state is one counter
//! behind a mutex, so process/reset/status serialize against each other
//! and the check-debounce-then-mutate sequence stays atomic.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::counter::{FrameObservation, RepCounter, Snapshot};
use crate::frame::decode_frame;
use crate::pose::{elbow_angle, LandmarkIndex, PoseEstimator};

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub counter: Mutex<RepCounter>,
    pub estimator: Mutex<Box<dyn PoseEstimator>>,
    /// Confidence a hip/knee landmark must exceed before a frame is trusted.
    pub visibility_threshold: f32,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ProcessFrameResponse {
    count: u64,
    stage: &'static str,
    success: bool,
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    success: bool,
    count: u64,
    stage: &'static str,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    count: u64,
    stage: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    success: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/process_frame", post(process_frame))
        .route("/api/reset_counter", post(reset_counter))
        .route("/api/status", get(status))
        .route("/", get(health_check))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Browser clients send frames cross-origin, so every response carries a
/// permissive allow-origin header and preflights are answered directly.
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
                (ACCESS_CONTROL_ALLOW_HEADERS, "content-type"),
            ],
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn process_frame(State(state): State<SharedState>, body: String) -> Response {
    // Parsed by hand so a missing or malformed `frame` field gets the same
    // `{error, success: false}` shape as every other input error.
    let payload: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    let Some(frame_data) = payload.get("frame").and_then(|v| v.as_str()) else {
        return error_response(StatusCode::BAD_REQUEST, "No frame data received".to_string());
    };

    let image = match decode_frame(frame_data) {
        Ok(image) => image,
        Err(err) => {
            debug!("rejected frame: {err}");
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    let detection = {
        let mut estimator = state.estimator.lock().unwrap();
        estimator.estimate(&image)
    };

    let snapshot = match detection {
        Ok(Some(landmarks)) => {
            let angle = elbow_angle(
                landmarks.get(LandmarkIndex::RightShoulder).point(),
                landmarks.get(LandmarkIndex::RightElbow).point(),
                landmarks.get(LandmarkIndex::RightWrist).point(),
            );
            let observation = FrameObservation {
                angle,
                hip_visible: landmarks
                    .get(LandmarkIndex::RightHip)
                    .is_visible(state.visibility_threshold),
                knee_visible: landmarks
                    .get(LandmarkIndex::RightKnee)
                    .is_visible(state.visibility_threshold),
                timestamp: Instant::now(),
            };

            let mut counter = state.counter.lock().unwrap();
            let before = counter.status().count;
            let snapshot = counter.process(observation);
            drop(counter);

            if snapshot.count > before {
                info!(count = snapshot.count, "push-up counted");
            } else {
                debug!(angle, stage = snapshot.stage_label(), "frame processed");
            }
            snapshot
        }
        Ok(None) => {
            // No person in frame: a normal no-update frame, not an error.
            debug!("no landmarks detected");
            state.counter.lock().unwrap().status()
        }
        Err(err) => {
            error!("pose estimation failed: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    process_response(snapshot)
}

async fn reset_counter(State(state): State<SharedState>) -> Json<ResetResponse> {
    let snapshot = state.counter.lock().unwrap().reset();
    info!("counter reset");
    Json(ResetResponse {
        success: true,
        count: snapshot.count,
        stage: snapshot.stage_label(),
    })
}

async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let snapshot = state.counter.lock().unwrap().status();
    Json(StatusResponse {
        status: "running",
        count: snapshot.count,
        stage: snapshot.stage_label(),
    })
}

/// Liveness probe; independent of session state.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "Push-up counter server is running" }))
}

fn process_response(snapshot: Snapshot) -> Response {
    Json(ProcessFrameResponse {
        count: snapshot.count,
        stage: snapshot.stage_label(),
        success: true,
    })
    .into_response()
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error, success: false })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::RepCounter;
    use crate::pose::{Landmark, Landmarks};
    use anyhow::anyhow;
    use axum::body::Body;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use http_body_util::BodyExt;
    use image::{ImageFormat, RgbImage};
    use serde_json::{json, Value};
    use std::io::Cursor;
    use tower::ServiceExt;

    /// Estimator that replays a fixed sequence of results, then `None`.
    struct ScriptedEstimator {
        results: Vec<anyhow::Result<Option<Landmarks>>>,
    }

    impl PoseEstimator for ScriptedEstimator {
        fn estimate(&mut self, _frame: &RgbImage) -> anyhow::Result<Option<Landmarks>> {
            if self.results.is_empty() {
                Ok(None)
            } else {
                self.results.remove(0)
            }
        }
    }

    fn test_app(results: Vec<anyhow::Result<Option<Landmarks>>>) -> Router {
        let state = Arc::new(AppState {
            counter: Mutex::new(RepCounter::default()),
            estimator: Mutex::new(Box::new(ScriptedEstimator { results })),
            visibility_threshold: 0.5,
        });
        router(state)
    }

    /// Right arm laid out straight (angle ~180) or flexed (~45), with the
    /// given hip/knee confidences.
    fn arm_landmarks(extended: bool, hip_conf: f32, knee_conf: f32) -> Landmarks {
        let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
        landmarks[LandmarkIndex::RightShoulder as usize] = Landmark::new(0.2, 0.2, 0.9);
        landmarks[LandmarkIndex::RightElbow as usize] = Landmark::new(0.5, 0.2, 0.9);
        landmarks[LandmarkIndex::RightWrist as usize] = if extended {
            Landmark::new(0.8, 0.2, 0.9)
        } else {
            Landmark::new(0.3, 0.4, 0.9)
        };
        landmarks[LandmarkIndex::RightHip as usize] = Landmark::new(0.5, 0.5, hip_conf);
        landmarks[LandmarkIndex::RightKnee as usize] = Landmark::new(0.5, 0.7, knee_conf);
        Landmarks::new(landmarks)
    }

    fn frame_payload() -> String {
        let image = RgbImage::from_pixel(8, 8, image::Rgb([128, 128, 128]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        STANDARD.encode(bytes.into_inner())
    }

    async fn send(app: &Router, request: axum::http::Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    fn post_frame(frame: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/process_frame")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "frame": frame }).to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app(vec![]);
        let (status, body) = send(&app, get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Push-up counter server is running");
    }

    #[tokio::test]
    async fn test_status_fresh_session() {
        let app = test_app(vec![]);
        let (status, body) = send(&app, get_request("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["count"], 0);
        assert_eq!(body["stage"], "none");
    }

    #[tokio::test]
    async fn test_counts_across_requests() {
        let app = test_app(vec![
            Ok(Some(arm_landmarks(true, 0.9, 0.9))),
            Ok(Some(arm_landmarks(false, 0.9, 0.9))),
        ]);
        let frame = frame_payload();

        let (status, body) = send(&app, post_frame(&frame)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["stage"], "up");
        assert_eq!(body["success"], true);

        let (_, body) = send(&app, post_frame(&frame)).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["stage"], "down");
    }

    #[tokio::test]
    async fn test_low_confidence_hip_gates_frame() {
        let app = test_app(vec![
            Ok(Some(arm_landmarks(true, 0.3, 0.9))),
            Ok(Some(arm_landmarks(false, 0.9, 0.9))),
        ]);
        let frame = frame_payload();

        let (_, body) = send(&app, post_frame(&frame)).await;
        assert_eq!(body["stage"], "none");

        // First frame never established "up", so nothing counts.
        let (_, body) = send(&app, post_frame(&frame)).await;
        assert_eq!(body["count"], 0);
        assert_eq!(body["stage"], "none");
    }

    #[tokio::test]
    async fn test_no_detection_is_success() {
        let app = test_app(vec![Ok(None)]);
        let (status, body) = send(&app, post_frame(&frame_payload())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 0);
        assert_eq!(body["stage"], "none");
    }

    #[tokio::test]
    async fn test_missing_frame_field_is_bad_request() {
        let app = test_app(vec![]);
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/process_frame")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No frame data received");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_bad_request() {
        let app = test_app(vec![]);
        let (status, body) = send(&app, post_frame("!!not-base64!!")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("base64"));
    }

    #[tokio::test]
    async fn test_undecodable_image_is_bad_request() {
        let app = test_app(vec![]);
        let garbage = STANDARD.encode(b"not an image");
        let (status, body) = send(&app, post_frame(&garbage)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_estimator_error_is_internal_and_state_untouched() {
        let app = test_app(vec![
            Err(anyhow!("inference backend exploded")),
            Ok(Some(arm_landmarks(true, 0.9, 0.9))),
        ]);
        let frame = frame_payload();

        let (status, body) = send(&app, post_frame(&frame)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);

        let (_, body) = send(&app, get_request("/api/status")).await;
        assert_eq!(body["count"], 0);
        assert_eq!(body["stage"], "none");

        // Next frame still processes normally.
        let (_, body) = send(&app, post_frame(&frame)).await;
        assert_eq!(body["stage"], "up");
    }

    #[tokio::test]
    async fn test_reset_counter() {
        let app = test_app(vec![
            Ok(Some(arm_landmarks(true, 0.9, 0.9))),
            Ok(Some(arm_landmarks(false, 0.9, 0.9))),
        ]);
        let frame = frame_payload();
        send(&app, post_frame(&frame)).await;
        send(&app, post_frame(&frame)).await;

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/reset_counter")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 0);
        assert_eq!(body["stage"], "none");

        let (_, body) = send(&app, get_request("/api/status")).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_data_url_frame_accepted() {
        let app = test_app(vec![Ok(Some(arm_landmarks(true, 0.9, 0.9)))]);
        let frame = format!("data:image/png;base64,{}", frame_payload());
        let (status, body) = send(&app, post_frame(&frame)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "up");
    }

    #[tokio::test]
    async fn test_cors_preflight_and_response_header() {
        let app = test_app(vec![]);

        let preflight = axum::http::Request::builder()
            .method("OPTIONS")
            .uri("/api/process_frame")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(preflight).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let response = app.clone().oneshot(get_request("/api/status")).await.unwrap();
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
