//! Grab and fusion tuning values, with JSON load/save support.
//!
//! Defaults carry the shipped tuning (distances in meters, angles in
//! degrees). A `.buildcfg.json` file can override them per scene.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Reach, hold and gesture tuning for the grab controller.
#[derive(Debug, Clone, Resource, Serialize, Deserialize)]
pub struct GrabConfig {
    /// How far the grab sweep reaches from the viewpoint.
    pub max_grab_distance: f32,
    /// Radius of the grab sweep sphere.
    pub grab_radius: f32,
    pub min_hold_distance: f32,
    pub max_hold_distance: f32,
    /// Hold distance change per move-towards/move-away command.
    pub hold_distance_step: f32,
    /// Vertical offset applied to the held target pose, compensating the
    /// third-person camera height.
    pub hold_height_offset: f32,
    /// Manual rotation increment, degrees.
    pub rotation_step_degrees: f32,
    pub shake_max_samples: usize,
    pub shake_max_direction_changes: u32,
    pub shake_threshold: f32,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            max_grab_distance: 4.0,
            grab_radius: 1.0,
            min_hold_distance: 1.0,
            max_hold_distance: 2.5,
            hold_distance_step: 0.25,
            hold_height_offset: 0.0,
            rotation_step_degrees: 45.0,
            shake_max_samples: 50,
            shake_max_direction_changes: 6,
            shake_threshold: 0.1,
        }
    }
}

/// Candidate search and approach tuning for the fusion pipeline.
#[derive(Debug, Clone, Resource, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Radius of the per-member proximity volume used for candidate search.
    pub proximity_radius: f32,
    /// How far from a computed closest point a snap point may sit and
    /// still take over as the fuse target.
    pub snap_search_radius: f32,
    /// Residual distance between the two closing points at which the fuse
    /// commits.
    pub fuse_tolerance: f32,
    /// Exponential approach speed, per second.
    pub interp_speed: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            proximity_radius: 1.5,
            snap_search_radius: 0.25,
            fuse_tolerance: 0.02,
            interp_speed: 5.0,
        }
    }
}

/// On-disk bundle of both config sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioConfig {
    #[serde(default)]
    pub grab: GrabConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
}

/// Errors that can occur while reading or writing config files.
#[derive(Debug)]
pub enum ConfigError {
    /// File system error
    Io(std::io::Error),
    /// JSON serialization error
    Json(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e.to_string())
    }
}

/// Result type for config I/O operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

pub fn load_config<P: AsRef<Path>>(path: P) -> ConfigResult<StudioConfig> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

pub fn save_config<P: AsRef<Path>>(config: &StudioConfig, path: P) -> ConfigResult<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, config)?;
    Ok(())
}
