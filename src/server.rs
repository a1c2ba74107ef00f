//! # HTTP Server Module
//!
//! Espone la pipeline timelapse via HTTP con `axum`.
//!
//! ## Endpoint:
//! - `POST /create-timelapse/`: form multipart con campo ripetuto `images`,
//!   risponde con il video (`video/mp4`) come allegato
//!
//! ## Middleware:
//! - CORS con origini configurabili, credenziali ammesse, `Content-Disposition` esposto
//! - Tracing di richieste e risposte (`TraceLayer`)
//! - Limite dimensione upload (`DefaultBodyLimit`)
//!
//! ## Errori:
//! Ogni errore diventa un body JSON `{"detail": "..."}`. Gli errori di input
//! e l'esaurimento del batch sono 400, encoder e imprevisti sono 500.

use crate::{
    config::ServerConfig,
    error::{ErrorClass, TimelapseError},
    file_manager::{FileManager, UNKNOWN_MEDIA_TYPE},
    input::{check_media_type, ImageInput},
    optimizer::TimelapseBuilder,
};
use anyhow::{Context, Result};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{
        header::{ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

/// Multipart field carrying the images, repeated once per file
pub const IMAGES_FIELD: &str = "images";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub builder: Arc<TimelapseBuilder>,
}

impl AppState {
    pub fn new(builder: TimelapseBuilder) -> Self {
        Self {
            builder: Arc::new(builder),
        }
    }
}

/// Errors surfaced by the HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Timelapse(#[from] TimelapseError),

    #[error("Invalid multipart upload: {0}")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Timelapse(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Timelapse(e) if e.class() == ErrorClass::Encoder => {
                error!(error = %e, "Video encoding failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Timelapse(e) => {
                error!(error = ?e, "Unexpected error while building timelapse");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Multipart(e) => (e.status(), e.body_text()),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Build the application router with its middleware stack
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/create-timelapse/", post(create_timelapse))
        .route("/create-timelapse", post(create_timelapse))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS layer for the configured browser origins.
///
/// Origins are checked by `ServerConfig::validate`; any that still fail to
/// parse are skipped.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .expose_headers([CONTENT_DISPOSITION])
}

/// POST /create-timelapse/
///
/// Collect the `images` parts in upload order and return the encoded video.
async fn create_timelapse(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut inputs = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let media_type = field
            .content_type()
            .unwrap_or(UNKNOWN_MEDIA_TYPE)
            .to_string();

        // Reject before reading the body
        check_media_type(&filename, &media_type)?;

        let bytes = field.bytes().await?;
        inputs.push(ImageInput::new(inputs.len(), filename, media_type, bytes.to_vec()));
    }

    let total_bytes: usize = inputs.iter().map(|i| i.bytes.len()).sum();
    info!(
        "📥 Received {} images ({})",
        inputs.len(),
        FileManager::format_size(total_bytes as u64)
    );

    let timelapse = state.builder.build(inputs).await?;
    let disposition = format!("attachment; filename=\"{}\"", timelapse.file_name());

    Ok((
        [
            (CONTENT_TYPE, timelapse.content_type().to_string()),
            (CONTENT_DISPOSITION, disposition),
            (ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Disposition".to_string()),
        ],
        timelapse.bytes,
    )
        .into_response())
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: ServerConfig, builder: TimelapseBuilder) -> Result<()> {
    config.validate()?;

    let app = build_router(AppState::new(builder), &config);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🌐 Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{jpeg_bytes, png_corrupt_pixels_bytes, RecordingSinkFactory};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const BOUNDARY: &str = "timelapser-test-boundary";

    struct Part {
        name: &'static str,
        filename: Option<&'static str>,
        content_type: Option<&'static str>,
        bytes: Vec<u8>,
    }

    fn image(filename: &'static str, content_type: &'static str, bytes: Vec<u8>) -> Part {
        Part {
            name: IMAGES_FIELD,
            filename: Some(filename),
            content_type: Some(content_type),
            bytes,
        }
    }

    fn multipart_request(parts: Vec<Part>) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
            if let Some(filename) = part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", filename));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = part.content_type {
                body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/create-timelapse/")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    fn app(factory: Arc<RecordingSinkFactory>) -> Router {
        let config = Config {
            max_edge: 64,
            workers: 2,
            ..Default::default()
        };
        let builder = TimelapseBuilder::with_sink_factory(config, factory).unwrap();
        build_router(AppState::new(builder), &ServerConfig::default())
    }

    async fn detail(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["detail"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_returns_video_attachment() {
        let factory = Arc::new(RecordingSinkFactory::default());
        let request = multipart_request(vec![
            image("a.jpg", "image/jpeg", jpeg_bytes(128, 72, [255, 0, 0])),
            Part {
                name: "caption",
                filename: None,
                content_type: None,
                bytes: b"ignored".to_vec(),
            },
            image("b.jpg", "image/jpeg", jpeg_bytes(32, 32, [0, 0, 255])),
        ]);

        let response = tokio_test::assert_ok!(app(factory.clone()).oneshot(request).await);

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "video/mp4");
        assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=\"timelapse.mp4\"");
        assert_eq!(headers[ACCESS_CONTROL_EXPOSE_HEADERS], "Content-Disposition");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(!body.is_empty());

        let frames = factory.frames();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| (f.width, f.height) == (64, 36)));
        assert!(frames[0].dominant_red());
        assert!(frames[1].dominant_blue());
    }

    #[tokio::test]
    async fn test_non_image_part_is_bad_request() {
        let factory = Arc::new(RecordingSinkFactory::default());
        let request = multipart_request(vec![
            image("a.jpg", "image/jpeg", jpeg_bytes(16, 16, [1, 2, 3])),
            image("notes.txt", "text/plain", b"hello".to_vec()),
        ]);

        let response = app(factory.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(detail(response).await, "Invalid file type: notes.txt - text/plain");
        assert!(factory.frames().is_empty());
    }

    #[tokio::test]
    async fn test_no_images_is_bad_request() {
        let request = multipart_request(vec![Part {
            name: "caption",
            filename: None,
            content_type: None,
            bytes: b"nothing else".to_vec(),
        }]);

        let response = app(Arc::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(detail(response).await, "Image list cannot be empty");
    }

    #[tokio::test]
    async fn test_no_processable_images_is_bad_request() {
        let request = multipart_request(vec![
            image("a.png", "image/png", png_corrupt_pixels_bytes(8, 8)),
            image("b.png", "image/png", b"junk".to_vec()),
        ]);

        let response = app(Arc::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(detail(response).await, "No processable images found");
    }

    #[tokio::test]
    async fn test_encoder_failure_is_server_error() {
        let request = multipart_request(vec![image("a.jpg", "image/jpeg", jpeg_bytes(16, 16, [1, 2, 3]))]);

        let response = app(Arc::new(RecordingSinkFactory::failing()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(response).await.starts_with("Video writer could not be started"));
    }

    #[tokio::test]
    async fn test_route_without_trailing_slash() {
        let mut request = multipart_request(vec![image("a.jpg", "image/jpeg", jpeg_bytes(16, 16, [1, 2, 3]))]);
        *request.uri_mut() = "/create-timelapse".parse().unwrap();

        let response = app(Arc::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/create-timelapse/")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app(Arc::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "http://localhost:5173");
        assert_eq!(headers["access-control-allow-credentials"], "true");
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |e: TimelapseError| ApiError::from(e).into_response().status();

        assert_eq!(status(TimelapseError::EmptyInput), StatusCode::BAD_REQUEST);
        assert_eq!(status(TimelapseError::NoProcessableImages), StatusCode::BAD_REQUEST);
        assert_eq!(status(TimelapseError::EmptyOutput), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status(TimelapseError::Io(std::io::Error::other("disk on fire"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
