use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::routing::{any, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::{EMPTY_PROMPT, close, recv_data, validate_prompt};
use crate::app::AppState;
use crate::error::ApiError;
use crate::models::{ImagePrompt, decode_image};

pub(crate) const NOT_AN_IMAGE: &str = "Uploaded file is not an image";

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/img2txt/generate", post(generate))
        .route("/img2txt/ws/generate", any(ws_generate))
}

/// Fields of the multipart upload, before validation.
#[derive(Default)]
struct Upload {
    prompt: Option<String>,
    image: Option<Vec<u8>>,
    image_content_type: Option<String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = Upload::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("prompt") => {
                    upload.prompt = Some(field.text().await.map_err(bad_multipart)?);
                }
                Some("image") => {
                    upload.image_content_type = field.content_type().map(str::to_string);
                    upload.image = Some(field.bytes().await.map_err(bad_multipart)?.to_vec());
                }
                _ => {}
            }
        }
        Ok(upload)
    }

    /// Checks the fields and decodes the image, before anything is queued.
    async fn into_input(self) -> Result<ImagePrompt, ApiError> {
        let prompt = validate_prompt(self.prompt.as_deref().unwrap_or_default())?;
        let is_image = self
            .image_content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"));
        let raw = match self.image {
            Some(raw) if is_image => raw,
            _ => return Err(not_an_image()),
        };
        let image = decode_image(raw).await.map_err(|e| {
            debug!(error = %e, "upload rejected");
            not_an_image()
        })?;
        Ok(ImagePrompt::new(image, prompt))
    }
}

fn not_an_image() -> ApiError {
    ApiError::BadRequest(NOT_AN_IMAGE.to_string())
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(e.body_text())
}

async fn generate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let service = state.img2txt()?;
    let input = Upload::read(multipart).await?.into_input().await?;

    let span = info_span!("img2txt", request_id = %Uuid::new_v4());
    let text = service.generate(input).instrument(span.clone()).await?;
    span.in_scope(|| info!(chars = text.len(), "text generated"));

    Ok(Json(GenerateResponse { text }))
}

async fn ws_generate(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let span = info_span!("img2txt_ws", request_id = %Uuid::new_v4());
    ws.on_upgrade(move |socket| describe(socket, state).instrument(span))
}

/// Image frame, then prompt frame, in; the generated text out; then close.
async fn describe(mut socket: WebSocket, state: Arc<AppState>) {
    let service = match state.img2txt() {
        Ok(service) => service,
        Err(e) => return close(socket, close_code::ERROR, &e.to_string()).await,
    };

    let image = match recv_data(&mut socket).await {
        Some(Message::Binary(bytes)) => bytes.to_vec(),
        Some(_) => return close(socket, close_code::POLICY, "Expected an image").await,
        None => return,
    };
    let prompt = match recv_data(&mut socket).await {
        Some(Message::Text(text)) => text.trim().to_string(),
        Some(_) => String::new(),
        None => return,
    };
    if prompt.is_empty() {
        return close(socket, close_code::POLICY, EMPTY_PROMPT).await;
    }
    let image = match decode_image(image).await {
        Ok(image) => image,
        Err(e) => {
            debug!(error = %e, "upload rejected");
            return close(socket, close_code::POLICY, NOT_AN_IMAGE).await;
        }
    };

    match service.generate(ImagePrompt::new(image, prompt)).await {
        Ok(text) => {
            if let Err(e) = socket.send(Message::Text(text.into())).await {
                warn!(error = %e, "client went away before the text was sent");
                return;
            }
            info!("text streamed");
            close(socket, close_code::NORMAL, "").await
        }
        Err(e) => {
            warn!(error = %e, "websocket generation failed");
            close(socket, close_code::ERROR, "Generation failed").await
        }
    }
}
