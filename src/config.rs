use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::counter::CounterConfig;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub counter: CounterSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:5001")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// MoveNet ONNX model path
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// Landmark confidence a hip/knee must exceed to be trusted
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CounterSettings {
    /// Full-extension threshold (degrees)
    #[serde(default = "default_up_angle")]
    pub up_angle: f32,
    /// Flexion threshold (degrees)
    #[serde(default = "default_down_angle")]
    pub down_angle: f32,
    /// Minimum seconds between accepted repetitions
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: f32,
}

fn default_listen_addr() -> String { "0.0.0.0:5001".to_string() }
fn default_model_path() -> String { "models/movenet_lightning.onnx".to_string() }
fn default_visibility_threshold() -> f32 { 0.5 }
fn default_up_angle() -> f32 { 160.0 }
fn default_down_angle() -> f32 { 90.0 }
fn default_debounce_secs() -> f32 { 0.5 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            model_path: default_model_path(),
            visibility_threshold: default_visibility_threshold(),
        }
    }
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            up_angle: default_up_angle(),
            down_angle: default_down_angle(),
            debounce_secs: default_debounce_secs(),
        }
    }
}

impl CounterSettings {
    pub fn to_counter_config(&self) -> CounterConfig {
        CounterConfig {
            up_angle: self.up_angle,
            down_angle: self.down_angle,
            debounce: Duration::from_secs_f32(self.debounce_secs),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
