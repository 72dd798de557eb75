use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use kamado::BatchConfig;

/// Which model this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum ServiceMode {
    #[value(name = "txt2img")]
    #[serde(rename = "txt2img")]
    Txt2Img,
    #[value(name = "img2txt")]
    #[serde(rename = "img2txt")]
    Img2Txt,
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceMode::Txt2Img => f.write_str("txt2img"),
            ServiceMode::Img2Txt => f.write_str("img2txt"),
        }
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process configuration, read from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "vision-server", about = "Batched text-to-image / image-to-text server")]
pub struct Config {
    #[arg(long, env = "SERVICE_MODE", value_enum, default_value = "txt2img")]
    pub service_mode: ServiceMode,

    /// Directory holding model weights
    #[arg(long, env = "HF_HOME", default_value = "./models")]
    pub hf_home: String,

    #[arg(long, env = "TXT2IMG_MODEL", default_value = "Tencent-Hunyuan/HunyuanDiT-v1.2-Diffusers")]
    pub txt2img_model: String,

    #[arg(long, env = "IMG2TXT_MODEL", default_value = "Qwen/Qwen2.5-VL-3B-Instruct")]
    pub img2txt_model: String,

    /// Largest number of requests run as one batch
    #[arg(long, env = "MAX_BATCH_SIZE", default_value_t = 4)]
    pub max_batch_size: usize,

    /// How long the first request of a batch waits for company
    #[arg(long, env = "MAX_WAIT_MS", default_value_t = 50)]
    pub max_wait_ms: u64,

    #[arg(long, env = "BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Config {
    /// Path of the weights for the selected mode.
    pub fn model_path(&self) -> String {
        let model = match self.service_mode {
            ServiceMode::Txt2Img => &self.txt2img_model,
            ServiceMode::Img2Txt => &self.img2txt_model,
        };
        format!("{}/{}", self.hf_home, model)
    }

    pub fn batch_config(&self) -> kamado::Result<BatchConfig> {
        BatchConfig::new(self.max_batch_size, Duration::from_millis(self.max_wait_ms))
    }
}
