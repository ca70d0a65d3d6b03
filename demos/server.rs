use argh::FromArgs;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use vectorize::{GeminiClient, ImageEncoder, Session, VectorStyle, artifact::SVG_MIME};

mod messages;

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Vectorize server: upload an image, pick a style and fetch the generated SVG.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,
}

struct AppState {
    session: Mutex<Session>,
    encoder: ImageEncoder,
}

impl AppState {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

type SharedState = State<Arc<AppState>>;

async fn post_image(
    State(state): SharedState,
    Json(payload): Json<messages::ImageRequest>,
) -> impl IntoResponse {
    let image = match state
        .encoder
        .encode_path(&payload.image_path, payload.mime_type.as_deref())
    {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Rejected image {}: {e}", payload.image_path.display());
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
        }
    };

    let preview = image.preview.url();
    let preview_id = image.preview.id();
    let media_type = image.payload.media_type();
    log::info!("Selected {media_type} image as preview {preview_id}");
    state.session().select_image(image);

    (
        StatusCode::OK,
        Json(json!({
            "status": "selected",
            "preview": preview,
            "preview_path": format!("/preview/{preview_id}"),
            "mime_type": media_type.as_mime(),
        })),
    )
}

async fn post_style(
    State(state): SharedState,
    Json(payload): Json<messages::StyleRequest>,
) -> impl IntoResponse {
    let style = match payload.style.parse::<VectorStyle>() {
        Ok(style) => style,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))),
    };

    let mut session = state.session();
    if session.status().is_active {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Generation in progress" })),
        );
    }
    session.select_style(style);

    (StatusCode::OK, Json(json!({ "status": "ok", "style": style.label() })))
}

async fn post_generate(State(state): SharedState) -> impl IntoResponse {
    let mut session = state.session();

    if session.image().is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No image selected" })),
        );
    }
    if !session.generate() {
        log::debug!("Engine is still processing");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Engine is still processing" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({ "status": "scheduled", "step": session.status().step })),
    )
}

async fn get_status(State(state): SharedState) -> impl IntoResponse {
    let mut session = state.session();
    session.poll();

    Json(json!({
        "status": session.status(),
        "style": session.style().label(),
        "preview": session.image().map(|image| image.preview.url()),
        "ready": session.result().is_some(),
    }))
}

async fn get_result(State(state): SharedState) -> impl IntoResponse {
    let mut session = state.session();
    session.poll();

    if let (Some(result), Some(artifact)) = (session.result(), session.export_artifact()) {
        log::info!("Result delivered");
        let response = messages::GenerationResponse {
            style: result.style.label().to_string(),
            filename: artifact.filename().to_string(),
            markup: artifact.markup().to_string(),
        };
        return (
            StatusCode::OK,
            Json(json!({ "status": "success", "response": response })),
        );
    }

    let status = session.status();
    if let Some(message) = &status.last_error {
        return (
            StatusCode::OK,
            Json(json!({ "status": "error", "message": message })),
        );
    }

    let label = if status.is_active { "processing" } else { "idle" };
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": label, "message": "No result available" })),
    )
}

async fn get_download(State(state): SharedState) -> Response {
    let mut session = state.session();
    session.poll();

    match session.export_artifact() {
        Some(artifact) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, SVG_MIME.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.filename()),
                ),
            ],
            artifact.markup().to_string(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "No result available").into_response(),
    }
}

async fn get_preview(State(state): SharedState, Path(id): Path<u64>) -> Response {
    match state.encoder.previews().lookup(&id.to_string()) {
        Some((media_type, bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, media_type.as_mime())],
            bytes.to_vec(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Preview released").into_response(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ServerArgs = argh::from_env();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let client = GeminiClient::from_env();
    log::info!(
        "Using model {} at {}",
        client.config().model(),
        client.config().endpoint()
    );
    if !client.config().has_credential() {
        log::warn!("No API key configured, generations will fail until one is set");
    }

    let state = Arc::new(AppState {
        session: Mutex::new(Session::with_client(client)),
        encoder: ImageEncoder::default(),
    });

    let app = Router::new()
        .route("/", get(|| async { "Welcome to Vectorize!" }))
        .route("/image", post(post_image))
        .route("/style", post(post_style))
        .route("/generate", post(post_generate))
        .route("/status", get(get_status))
        .route("/result", get(get_result))
        .route("/download", get(get_download))
        .route("/preview/{id}", get(get_preview))
        .with_state(state);

    log::info!("Starting the server");
    log::info!("Listening on: {}", addr);
    log::info!("Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
