//! HTTP endpoint layer.
//!
//! Stateless per request: every handler reads the injected [`AppState`] and
//! nothing else. Per-request failures are converted to status codes in
//! [`error::ApiError`] and never escape the handler.

pub mod error;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, SharedState};

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    let upload_limit = state.upload_limit;

    Router::new()
        .route("/predict", post(routes::predict))
        .route("/health", get(routes::health))
        .route("/diseases", get(routes::diseases))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Any origin, method and header, with credentials.
///
/// `*` is not allowed together with credentials, so the request's own
/// origin, method and headers are echoed back instead.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Resolve when Ctrl-C is received.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::error::{ErrorBody, NOT_AN_IMAGE, PROCESSING_FAILED};
    use super::*;

    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use dermascan_core::config::LimitsConfig;
    use dermascan_core::{
        Classification, HealthStatus, ImageClassifier, InferenceError, KnowledgeBase,
        PredictionResult,
    };
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use tower::ServiceExt;

    const BOUNDARY: &str = "dermascan-test-boundary";

    /// Labels by mean brightness so different images give different answers.
    struct StubClassifier {
        labels: Vec<String>,
        calls: AtomicUsize,
    }

    impl StubClassifier {
        fn new(labels: &[&str]) -> Self {
            Self {
                labels: labels.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ImageClassifier for StubClassifier {
        fn classify(&self, image: &DynamicImage) -> Result<Classification, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rgb = image.to_rgb8();
            let sum: u64 = rgb.as_raw().iter().map(|&v| v as u64).sum();
            let mean = sum as f32 / rgb.as_raw().len().max(1) as f32;
            let logits: Vec<f32> = (0..self.labels.len())
                .map(|i| -((mean / 255.0) * (self.labels.len() - 1) as f32 - i as f32).abs())
                .collect();
            Classification::from_logits(&logits, &self.labels)
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }
    }

    struct FailingClassifier;

    impl ImageClassifier for FailingClassifier {
        fn classify(&self, _image: &DynamicImage) -> Result<Classification, InferenceError> {
            Err(InferenceError::Run("CUDA out of memory at /internal/path".into()))
        }

        fn labels(&self) -> &[String] {
            static LABELS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
            LABELS.get_or_init(|| vec!["Eczema".to_string()])
        }
    }

    fn app_with(classifier: Arc<dyn ImageClassifier>) -> Router {
        let state = AppState::new(
            classifier,
            KnowledgeBase::embedded().unwrap(),
            &LimitsConfig::default(),
        );
        router(Arc::new(state))
    }

    fn app() -> Router {
        app_with(Arc::new(StubClassifier::new(&[
            "Eczema", "Melanoma", "Impetigo",
        ])))
    }

    fn png(color: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb(color)));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn multipart_body(field: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.bin\"\r\n"
            )
            .as_bytes(),
        );
        if let Some(ct) = content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn predict_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> Response {
        app.oneshot(request).await.unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_predict_returns_knowledge_entry() {
        let request = predict_request(multipart_body("file", Some("image/png"), &png([0, 0, 0])));
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let result: PredictionResult = json(response).await;
        let kb = KnowledgeBase::embedded().unwrap();
        assert_eq!(result.prediction, "Eczema");
        assert!((0.0..=100.0).contains(&result.confidence));
        assert_eq!(result.description, kb.lookup("Eczema").description);
        assert_eq!(result.precautions, kb.lookup("Eczema").precautions);
    }

    #[tokio::test]
    async fn test_predict_unmatched_label_uses_unknown_entry() {
        let request =
            predict_request(multipart_body("file", Some("image/png"), &png([128, 128, 128])));
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let result: PredictionResult = json(response).await;
        let kb = KnowledgeBase::embedded().unwrap();
        assert_eq!(result.prediction, "Melanoma");
        assert_eq!(result.description, kb.unknown().description);
        assert_eq!(result.precautions, kb.unknown().precautions);
    }

    #[tokio::test]
    async fn test_predict_is_idempotent() {
        let app = app();
        let bytes = png([200, 10, 90]);
        let first: PredictionResult = json(
            send(
                app.clone(),
                predict_request(multipart_body("file", Some("image/png"), &bytes)),
            )
            .await,
        )
        .await;
        let second: PredictionResult = json(
            send(
                app,
                predict_request(multipart_body("file", Some("image/png"), &bytes)),
            )
            .await,
        )
        .await;
        assert_eq!(first.prediction, second.prediction);
        assert_eq!(first.confidence, second.confidence);
    }

    #[tokio::test]
    async fn test_predict_rejects_non_image_content_type() {
        let classifier = Arc::new(StubClassifier::new(&["Eczema"]));
        let app = app_with(classifier.clone());

        // Valid PNG bytes, but declared as text: still rejected.
        for body in [png([1, 2, 3]), b"hello".to_vec(), Vec::new()] {
            let request = predict_request(multipart_body("file", Some("text/plain"), &body));
            let response = send(app.clone(), request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let error: ErrorBody = json(response).await;
            assert_eq!(error.detail, NOT_AN_IMAGE);
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_predict_rejects_missing_content_type() {
        let request = predict_request(multipart_body("file", None, &png([1, 2, 3])));
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_corrupt_image_is_500() {
        let mut bytes = png([50, 60, 70]);
        bytes.truncate(bytes.len() / 2);

        for body in [bytes, b"\x89PNG not really".to_vec(), b"garbage".to_vec()] {
            let request = predict_request(multipart_body("file", Some("image/jpeg"), &body));
            let response = send(app(), request).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let error: ErrorBody = json(response).await;
            assert_eq!(error.detail, PROCESSING_FAILED);
        }
    }

    #[tokio::test]
    async fn test_predict_inference_failure_hides_details() {
        let app = app_with(Arc::new(FailingClassifier));
        let request = predict_request(multipart_body("file", Some("image/png"), &png([9, 9, 9])));
        let response = send(app, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let error: ErrorBody = json(response).await;
        assert_eq!(error.detail, PROCESSING_FAILED);
        assert!(!error.detail.contains("CUDA"));
    }

    #[tokio::test]
    async fn test_predict_accepts_other_file_field() {
        let request =
            predict_request(multipart_body("image", Some("image/png"), &png([0, 0, 0])));
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_predict_without_file_is_400() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
        );
        let response = send(app(), predict_request(body.into_bytes())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_non_multipart_is_400() {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_over_upload_limit_is_413() {
        let limits = LimitsConfig {
            max_upload_mb: 1,
            ..LimitsConfig::default()
        };
        let state = AppState::new(
            Arc::new(StubClassifier::new(&["Eczema"])),
            KnowledgeBase::embedded().unwrap(),
            &limits,
        );
        let app = router(Arc::new(state));

        let oversized = vec![0u8; 2 * 1024 * 1024];
        let request = predict_request(multipart_body("file", Some("image/png"), &oversized));
        let response = send(app, request).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    /// Same request as `predict_request`, delivered in small frames the way
    /// a socket would deliver it.
    fn streamed_predict_request(body: Vec<u8>) -> Request<Body> {
        let frames: Vec<Result<Vec<u8>, std::io::Error>> =
            body.chunks(16 * 1024).map(|c| Ok(c.to_vec())).collect();
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from_stream(futures_util::stream::iter(frames)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_oversized_non_image_is_400() {
        let limits = LimitsConfig {
            max_upload_mb: 1,
            ..LimitsConfig::default()
        };
        let classifier = Arc::new(StubClassifier::new(&["Eczema"]));
        let state = AppState::new(
            classifier.clone(),
            KnowledgeBase::embedded().unwrap(),
            &limits,
        );
        let app = router(Arc::new(state));

        let oversized = vec![b'a'; 2 * 1024 * 1024];
        let request =
            streamed_predict_request(multipart_body("file", Some("text/plain"), &oversized));
        let response = send(app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorBody = json(response).await;
        assert_eq!(error.detail, NOT_AN_IMAGE);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_streamed_upload_succeeds() {
        let request =
            streamed_predict_request(multipart_body("file", Some("image/png"), &png([0, 0, 0])));
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_image_fallback_field_is_400() {
        let request =
            predict_request(multipart_body("attachment", Some("application/pdf"), b"%PDF-1.7"));
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorBody = json(response).await;
        assert_eq!(error.detail, NOT_AN_IMAGE);
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthStatus = json(response).await;
        assert_eq!(health, HealthStatus::healthy(true));
    }

    #[tokio::test]
    async fn test_diseases_lists_every_label() {
        let request = Request::builder()
            .uri("/diseases")
            .body(Body::empty())
            .unwrap();
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let labels: Vec<String> = json(response).await;
        assert_eq!(labels.len(), 7);
        assert!(labels.iter().any(|l| l == "Unknown"));
        assert_eq!(labels[0], "Eczema");
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin_with_credentials() {
        let request = Request::builder()
            .uri("/diseases")
            .header(header::ORIGIN, "https://clinic.example")
            .body(Body::empty())
            .unwrap();
        let response = send(app(), request).await;
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://clinic.example"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/predict")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-requested-with")
            .body(Body::empty())
            .unwrap();
        let response = send(app(), request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "x-requested-with"
        );
    }
}
