#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use kamado::BatchConfig;
use tokio::net::TcpListener;

use vision_server::app::{self, AppState};
use vision_server::config::ServiceMode;
use vision_server::models::{ImagePrompt, Txt2ImgPipeline};
use vision_server::service::{Img2TxtService, Txt2ImgService};

/// Serves `state` on an ephemeral port for the rest of the test.
pub async fn serve(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app::router(state)).await.unwrap();
    });
    addr
}

pub fn batch(max_batch_size: usize, max_wait_ms: u64) -> BatchConfig {
    BatchConfig::new(max_batch_size, Duration::from_millis(max_wait_ms)).unwrap()
}

pub async fn txt2img_with(pipeline: Txt2ImgPipeline, config: BatchConfig) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(ServiceMode::Txt2Img));
    state
        .txt2img
        .init(move || async move { Ok(Txt2ImgService::from_pipeline(config, pipeline)) })
        .await
        .unwrap();
    (serve(state.clone()).await, state)
}

pub async fn txt2img(config: BatchConfig) -> (SocketAddr, Arc<AppState>) {
    txt2img_with(Txt2ImgPipeline::load("does/not/exist").unwrap(), config).await
}

pub async fn failing_txt2img() -> SocketAddr {
    let state = Arc::new(AppState::new(ServiceMode::Txt2Img));
    state
        .txt2img
        .init(|| async {
            Ok(Txt2ImgService::new(
                batch(1, 0),
                |_: Vec<String>| -> anyhow::Result<Vec<Vec<u8>>> {
                    anyhow::bail!("simulate generation failure")
                },
            ))
        })
        .await
        .unwrap();
    serve(state).await
}

pub async fn img2txt(config: BatchConfig) -> SocketAddr {
    let state = Arc::new(AppState::new(ServiceMode::Img2Txt));
    state
        .img2txt
        .init_blocking(move || Img2TxtService::load(config, "does/not/exist"))
        .await
        .unwrap();
    serve(state).await
}

pub async fn failing_img2txt() -> SocketAddr {
    let state = Arc::new(AppState::new(ServiceMode::Img2Txt));
    state
        .img2txt
        .init(|| async {
            Ok(Img2TxtService::new(
                batch(1, 0),
                |_: Vec<ImagePrompt>| -> anyhow::Result<Vec<String>> {
                    anyhow::bail!("simulate img2txt failure")
                },
            ))
        })
        .await
        .unwrap();
    serve(state).await
}

/// A server whose model never finished loading.
pub async fn uninitialized(mode: ServiceMode) -> SocketAddr {
    serve(Arc::new(AppState::new(mode))).await
}
