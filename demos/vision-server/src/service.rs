//! Model services: one coordinator in front of each model.

use std::sync::Arc;

use kamado::{BatchConfig, BatchCoordinator, BatchHandler};
use tracing::info;

use crate::models::{ImagePrompt, Img2TxtModel, Txt2ImgPipeline};

pub struct Txt2ImgService {
    coordinator: BatchCoordinator<String, Vec<u8>>,
}

impl Txt2ImgService {
    pub fn new<H>(config: BatchConfig, handler: H) -> Self
    where
        H: BatchHandler<String, Vec<u8>>,
    {
        Self {
            coordinator: BatchCoordinator::new(config, handler),
        }
    }

    pub fn from_pipeline(config: BatchConfig, pipeline: Txt2ImgPipeline) -> Self {
        let pipeline = Arc::new(pipeline);
        Self::new(config, move |prompts: Vec<String>| -> anyhow::Result<Vec<Vec<u8>>> {
            pipeline.generate(prompts)
        })
    }

    /// Loads the pipeline from `model_path`. Blocking.
    pub fn load(config: BatchConfig, model_path: &str) -> anyhow::Result<Self> {
        let pipeline = Txt2ImgPipeline::load(model_path)?;
        info!(model = pipeline.model_path(), "text-to-image pipeline loaded");
        Ok(Self::from_pipeline(config, pipeline))
    }

    /// Queues `prompt` for the next batch and waits for its image.
    pub async fn generate(&self, prompt: String) -> kamado::Result<Vec<u8>> {
        self.coordinator.enqueue(prompt).await
    }

    pub fn coordinator(&self) -> &BatchCoordinator<String, Vec<u8>> {
        &self.coordinator
    }
}

pub struct Img2TxtService {
    coordinator: BatchCoordinator<ImagePrompt, String>,
}

impl Img2TxtService {
    pub fn new<H>(config: BatchConfig, handler: H) -> Self
    where
        H: BatchHandler<ImagePrompt, String>,
    {
        Self {
            coordinator: BatchCoordinator::new(config, handler),
        }
    }

    pub fn from_model(config: BatchConfig, model: Img2TxtModel) -> Self {
        let model = Arc::new(model);
        Self::new(config, move |inputs: Vec<ImagePrompt>| -> anyhow::Result<Vec<String>> {
            model.generate(inputs)
        })
    }

    pub fn load(config: BatchConfig, model_path: &str) -> anyhow::Result<Self> {
        let model = Img2TxtModel::load(model_path)?;
        info!(model = model.model_path(), "image-to-text model loaded");
        Ok(Self::from_model(config, model))
    }

    pub async fn generate(&self, input: ImagePrompt) -> kamado::Result<String> {
        self.coordinator.enqueue(input).await
    }

    pub fn coordinator(&self) -> &BatchCoordinator<ImagePrompt, String> {
        &self.coordinator
    }
}
