use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::{EMPTY_PROMPT, close, recv_data, validate_prompt};
use crate::app::AppState;
use crate::error::ApiError;
use crate::models::PNG_CONTENT_TYPE;
use crate::service::Txt2ImgService;

pub(crate) const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Highest progress reported before the image is actually ready.
pub(crate) const PROGRESS_CAP: u8 = 99;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/txt2img/generate", post(generate))
        .route("/txt2img/ws/generate", any(ws_generate))
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let service = state.txt2img()?;
    let prompt = validate_prompt(&body.prompt)?;

    let span = info_span!("txt2img", request_id = %Uuid::new_v4());
    let image = service.generate(prompt).instrument(span.clone()).await?;
    span.in_scope(|| info!(bytes = image.len(), "image generated"));

    Ok(([(header::CONTENT_TYPE, PNG_CONTENT_TYPE)], image).into_response())
}

async fn ws_generate(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let span = info_span!("txt2img_ws", request_id = %Uuid::new_v4());
    ws.on_upgrade(move |socket| stream_generation(socket, state).instrument(span))
}

/// Prompt in; progress frames, then `"100"`, then the image; then close.
async fn stream_generation(mut socket: WebSocket, state: Arc<AppState>) {
    let service = match state.txt2img() {
        Ok(service) => service,
        Err(e) => return close(socket, close_code::ERROR, &e.to_string()).await,
    };

    let prompt = match recv_data(&mut socket).await {
        Some(Message::Text(text)) => text.trim().to_string(),
        Some(_) => String::new(),
        None => return,
    };
    if prompt.is_empty() {
        return close(socket, close_code::POLICY, EMPTY_PROMPT).await;
    }

    match generate_with_progress(&mut socket, &service, prompt).await {
        Ok(()) => close(socket, close_code::NORMAL, "").await,
        Err(e) => {
            warn!(error = %e, "websocket generation failed");
            close(socket, close_code::ERROR, "Generation failed").await
        }
    }
}

async fn generate_with_progress(
    socket: &mut WebSocket,
    service: &Txt2ImgService,
    prompt: String,
) -> anyhow::Result<()> {
    let generation = service.generate(prompt);
    tokio::pin!(generation);

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let mut progress = 0;
    let image = loop {
        tokio::select! {
            result = &mut generation => break result?,
            _ = ticker.tick() => {
                socket.send(Message::Text(progress.to_string().into())).await?;
                progress = next_progress(progress);
            }
        }
    };

    socket.send(Message::Text("100".to_string().into())).await?;
    socket.send(Message::Binary(image.into())).await?;
    info!("image streamed");
    Ok(())
}

/// Closes a tenth of the remaining gap each tick, never passing
/// [`PROGRESS_CAP`].
pub(crate) fn next_progress(current: u8) -> u8 {
    let step = (PROGRESS_CAP.saturating_sub(current) / 10).max(1);
    current.saturating_add(step).min(PROGRESS_CAP)
}
