pub mod img2txt;
pub mod txt2img;

use axum::extract::ws::{CloseFrame, Message, WebSocket};

use crate::error::ApiError;

pub(crate) const EMPTY_PROMPT: &str = "Prompt cannot be empty";

/// Trims `raw`, rejecting prompts that are blank.
pub(crate) fn validate_prompt(raw: &str) -> Result<String, ApiError> {
    let prompt = raw.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest(EMPTY_PROMPT.to_string()));
    }
    Ok(prompt.to_string())
}

/// Next text or binary frame. `None` once the client closed or the
/// connection failed.
pub(crate) async fn recv_data(socket: &mut WebSocket) -> Option<Message> {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(msg @ (Message::Text(_) | Message::Binary(_))) => return Some(msg),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

pub(crate) async fn close(mut socket: WebSocket, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_string().into(),
    };
    // the client may already be gone
    let _ = socket.send(Message::Close(Some(frame))).await;
}
