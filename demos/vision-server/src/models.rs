//! Stand-in models.
//!
//! Both run synchronously over a whole batch, the way a real pipeline would
//! run on the accelerator, and are cheap enough to exercise the server
//! without weights.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Side length of the rendered image, in pixels.
pub const IMAGE_SIZE: u32 = 8;

pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Upper bound on the length of a generated caption.
pub const DEFAULT_MAX_NEW_TOKENS: usize = 100;

/// A decoded image plus the question asked about it.
#[derive(Debug, Clone)]
pub struct ImagePrompt {
    pub image: DynamicImage,
    pub prompt: String,
    pub max_new_tokens: usize,
}

impl ImagePrompt {
    pub fn new(image: DynamicImage, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }
}

/// Decodes an uploaded image on the blocking pool.
///
/// Uploads are decoded per request, before they are queued, so one bad file
/// never reaches a batch shared with other callers.
pub async fn decode_image(raw: Vec<u8>) -> anyhow::Result<DynamicImage> {
    anyhow::ensure!(!raw.is_empty(), "image is empty");
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&raw))
        .await
        .context("image decoder did not complete")??;
    Ok(image)
}

/// Renders a tiny deterministic PNG per prompt.
#[derive(Debug, Clone)]
pub struct Txt2ImgPipeline {
    model_path: String,
    latency: Duration,
}

impl Txt2ImgPipeline {
    /// Loads the pipeline stored under `model_path`.
    ///
    /// Nothing is read when the directory does not exist, so the server can
    /// run without downloaded weights.
    pub fn load(model_path: impl Into<String>) -> anyhow::Result<Self> {
        let model_path = model_path.into();
        check_model_path(&model_path)?;
        Ok(Self {
            model_path,
            latency: Duration::ZERO,
        })
    }

    /// Sleeps this long per batch, to mimic a diffusion run.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn generate(&self, prompts: Vec<String>) -> anyhow::Result<Vec<Vec<u8>>> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        prompts.iter().map(|p| render_png(p)).collect()
    }
}

/// Describes an image by echoing the prompt and the image dimensions.
#[derive(Debug, Clone)]
pub struct Img2TxtModel {
    model_path: String,
}

impl Img2TxtModel {
    pub fn load(model_path: impl Into<String>) -> anyhow::Result<Self> {
        let model_path = model_path.into();
        check_model_path(&model_path)?;
        Ok(Self { model_path })
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn generate(&self, inputs: Vec<ImagePrompt>) -> anyhow::Result<Vec<String>> {
        Ok(inputs
            .into_iter()
            .map(|input| {
                let text = format!(
                    "TEXT({}) [{}x{}]",
                    input.prompt,
                    input.image.width(),
                    input.image.height()
                );
                text.chars().take(input.max_new_tokens).collect()
            })
            .collect())
    }
}

fn check_model_path(model_path: &str) -> anyhow::Result<()> {
    let path = Path::new(model_path);
    if path.exists() {
        anyhow::ensure!(path.is_dir(), "model path {model_path} is not a directory");
        std::fs::read_dir(path).with_context(|| format!("reading model directory {model_path}"))?;
    }
    Ok(())
}

/// PNG whose pixels are derived from a hash of the prompt.
pub fn render_png(prompt: &str) -> anyhow::Result<Vec<u8>> {
    let mut hasher = DefaultHasher::new();
    prompt.hash(&mut hasher);
    let seed = hasher.finish().to_le_bytes();

    let image = RgbImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
        let i = (x + y) as usize;
        Rgb([
            seed[i % seed.len()] ^ (x * 32) as u8,
            seed[(i + 1) % seed.len()] ^ (y * 32) as u8,
            seed[(i + 2) % seed.len()],
        ])
    });

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("encoding png")?;
    Ok(png)
}
