use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use kamado::ServiceCell;
use serde::Serialize;
use tracing::info;

use crate::config::{Config, ServiceMode};
use crate::error::ApiError;
use crate::routes;
use crate::service::{Img2TxtService, Txt2ImgService};

/// Shared by every handler. Only the cell matching `mode` is ever initialized.
pub struct AppState {
    pub mode: ServiceMode,
    pub txt2img: ServiceCell<Txt2ImgService>,
    pub img2txt: ServiceCell<Img2TxtService>,
}

impl AppState {
    pub fn new(mode: ServiceMode) -> Self {
        Self {
            mode,
            txt2img: ServiceCell::new(),
            img2txt: ServiceCell::new(),
        }
    }

    pub fn txt2img(&self) -> Result<Arc<Txt2ImgService>, ApiError> {
        Ok(self.txt2img.get()?)
    }

    pub fn img2txt(&self) -> Result<Arc<Img2TxtService>, ApiError> {
        Ok(self.img2txt.get()?)
    }
}

/// Loads the model for the configured mode. Safe to call more than once.
pub async fn init_service(state: &AppState, config: &Config) -> anyhow::Result<()> {
    let batch = config.batch_config()?;
    let model_path = config.model_path();
    info!(mode = %state.mode, model = %model_path, "loading model");

    match state.mode {
        ServiceMode::Txt2Img => {
            state
                .txt2img
                .init_blocking(move || Txt2ImgService::load(batch, &model_path))
                .await?;
        }
        ServiceMode::Img2Txt => {
            state
                .img2txt
                .init_blocking(move || Img2TxtService::load(batch, &model_path))
                .await?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct Status {
    service_mode: ServiceMode,
    status: &'static str,
}

async fn root(State(state): State<Arc<AppState>>) -> Json<Status> {
    Json(Status {
        service_mode: state.mode,
        status: "running",
    })
}

/// Routes for the configured mode, plus `GET /`.
pub fn router(state: Arc<AppState>) -> Router {
    let service = match state.mode {
        ServiceMode::Txt2Img => routes::txt2img::router(),
        ServiceMode::Img2Txt => routes::img2txt::router(),
    };

    Router::new()
        .route("/", get(root))
        .merge(service)
        .with_state(state)
}
