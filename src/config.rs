use crate::links::DEFAULT_CARD_IMAGE_SIZE;
use crate::model::{ScanBox, ScanConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "bellaster";
const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "bellaster.log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Decoder process argv. Empty disables the camera.
    #[serde(default = "default_scanner_command")]
    pub scanner_command: Vec<String>,
    #[serde(default = "default_scan_target")]
    pub scan_target: String,
    #[serde(default = "default_capture_fps")]
    pub capture_fps: u32,
    #[serde(default = "default_scan_box_side")]
    pub scan_box_width: u32,
    #[serde(default = "default_scan_box_side")]
    pub scan_box_height: u32,
    #[serde(default = "default_card_image_size")]
    pub card_image_size: u32,
}

fn default_scanner_command() -> Vec<String> {
    vec![
        String::from("zbarcam"),
        String::from("--raw"),
        String::from("--nodisplay"),
        String::from("--prescale={width}x{height}"),
    ]
}

fn default_scan_target() -> String {
    String::from("reader")
}

fn default_capture_fps() -> u32 {
    10
}

fn default_scan_box_side() -> u32 {
    250
}

fn default_card_image_size() -> u32 {
    DEFAULT_CARD_IMAGE_SIZE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scanner_command: default_scanner_command(),
            scan_target: default_scan_target(),
            capture_fps: default_capture_fps(),
            scan_box_width: default_scan_box_side(),
            scan_box_height: default_scan_box_side(),
            card_image_size: default_card_image_size(),
        }
    }
}

impl Settings {
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            fps: self.capture_fps.max(1),
            scan_box: ScanBox {
                width: self.scan_box_width,
                height: self.scan_box_height,
            },
        }
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("BELLASTER_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn default_log_path() -> Result<PathBuf> {
    Ok(config_root()?.join(LOG_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    let path = settings_path()?;
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    ensure_config_dir()?;
    let path = settings_path()?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
