use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::input;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("track.{field} must be a finite value greater than 0, got {value}")]
    NonPositiveDimension { field: &'static str, value: f32 },
    #[error("track.threshold must be within 0..=100, got {0}")]
    ThresholdOutOfRange(f32),
    #[error("style.{field} must be a finite value >= 0, got {value}")]
    NegativeLength { field: &'static str, value: f32 },
    #[error("style.{field} is not a #rgb or #rrggbb color: '{value}'")]
    InvalidColor { field: &'static str, value: String },
    #[error("labels.{field} must not be empty")]
    EmptyLabel { field: &'static str },
    #[error("failed to parse {origin}: {message}")]
    Parse { origin: String, message: String },
    #[error("profile not found: {}", .0.display())]
    UnknownProfile(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Track geometry and completion threshold, as read from `[track]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Track width in pixels.
    pub width: f32,
    /// Track height in pixels. Rendering only.
    pub height: f32,
    /// Percentage of the width the pointer must cross to complete.
    pub threshold: f32,
}

impl Geometry {
    pub fn new(width: f32, height: f32, threshold: f32) -> Result<Self, ConfigError> {
        let g = Self {
            width,
            height,
            threshold,
        };
        g.validate()?;
        Ok(g)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("width", self.width)?;
        positive("height", self.height)?;
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold));
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    // NaN fails the comparison too
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveDimension { field, value })
    }
}

/// Partial geometry update; unset fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryPatch {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub threshold: Option<f32>,
}

impl GeometryPatch {
    pub fn apply_to(&self, base: Geometry) -> Result<Geometry, ConfigError> {
        Geometry::new(
            self.width.unwrap_or(base.width),
            self.height.unwrap_or(base.height),
            self.threshold.unwrap_or(base.threshold),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub label: String,
    pub complete_label: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            label: "Swipe to confirm".into(),
            complete_label: "Confirmed".into(),
        }
    }
}

/// Visual options handed through to whatever draws the slider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Style {
    pub container_padding: f32,
    pub container_background_color: String,
    pub container_border_width: f32,
    pub container_border_color: String,
    pub container_radius: f32,
    pub track_background_color: String,
    pub complete_track_background_color: String,
    pub track_border_width: f32,
    pub track_border_color: String,
    pub track_radius: f32,
    pub thumb_color: String,
    pub complete_thumb_color: String,
    pub thumb_radius: f32,
    pub label_color: String,
    pub complete_label_color: String,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            container_padding: 0.0,
            container_background_color: "#ffffff".into(),
            container_border_width: 0.0,
            container_border_color: "#000000".into(),
            container_radius: 0.0,
            track_background_color: "#e5e7eb".into(),
            complete_track_background_color: "#22c55e".into(),
            track_border_width: 0.0,
            track_border_color: "#000000".into(),
            track_radius: 25.0,
            thumb_color: "#3b82f6".into(),
            complete_thumb_color: "#16a34a".into(),
            thumb_radius: 25.0,
            label_color: "#111827".into(),
            complete_label_color: "#ffffff".into(),
        }
    }
}

impl Style {
    fn validate(&self) -> Result<(), ConfigError> {
        let lengths = [
            ("container_padding", self.container_padding),
            ("container_border_width", self.container_border_width),
            ("container_radius", self.container_radius),
            ("track_border_width", self.track_border_width),
            ("track_radius", self.track_radius),
            ("thumb_radius", self.thumb_radius),
        ];
        for (field, value) in lengths {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::NegativeLength { field, value });
            }
        }

        let colors = [
            ("container_background_color", &self.container_background_color),
            ("container_border_color", &self.container_border_color),
            ("track_background_color", &self.track_background_color),
            (
                "complete_track_background_color",
                &self.complete_track_background_color,
            ),
            ("track_border_color", &self.track_border_color),
            ("thumb_color", &self.thumb_color),
            ("complete_thumb_color", &self.complete_thumb_color),
            ("label_color", &self.label_color),
            ("complete_label_color", &self.complete_label_color),
        ];
        for (field, value) in colors {
            if !is_hex_color(value) {
                return Err(ConfigError::InvalidColor {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub track: Geometry,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub style: Style,
}

impl Profile {
    /// Parse and validate a profile. `origin` only shows up in error text.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let profile: Profile = toml::from_str(text).map_err(|e| ConfigError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.track.validate()?;
        self.style.validate()?;
        if self.labels.label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel { field: "label" });
        }
        if self.labels.complete_label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel {
                field: "complete_label",
            });
        }
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or("unnamed")
    }
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("swipectl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Re-read the active profile. On error the last good profile stays.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn load_named(&self, name: &str) -> Result<Profile, ConfigError> {
        load_profile(&self.profiles_dir, name)
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let devices: Vec<String> = input::discover_touch_devices()
            .into_iter()
            .map(|d| format!("{} ({})", d.name, d.path))
            .collect();
        serde_json::json!({
            "input_group_member": check_in_input_group(),
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "track": self.profile.track,
            "devices": devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_profile(dir: &Path, name: &str) -> Result<Profile, ConfigError> {
    let path = dir.join(format!("{name}.toml"));
    if !path.exists() {
        return Err(ConfigError::UnknownProfile(path));
    }
    let txt = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Profile::from_toml_str(&txt, &path.display().to_string())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
