//! Engine configuration.
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```text
//! {
//!   "physics": { "gravity": [0, -1.62, 0], "timestep": 0.008 },
//!   "render": { "viewport_size": [1280, 720] }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::{Vec2, Vec3};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: PhysicsConfig,
    pub render: RenderConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Seconds of simulated time per physics step.
    pub timestep: f32,
    /// Longest frame the accumulator accepts; slower frames lose time
    /// instead of running a burst of catch-up steps.
    pub max_frame_delta: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            timestep: 1.0 / 60.0,
            max_frame_delta: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Size of the screen in pixels. Screen-overlay canvases without an
    /// explicit size take it.
    pub viewport_size: Vec2,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            viewport_size: Vec2::new(1280.0, 720.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    /// Where `askr-telemetry` listens.
    pub address: String,
    /// Snapshots per second.
    pub send_rate_hz: f32,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: String::from("127.0.0.1:9100"),
            send_rate_hz: 10.0,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        log::debug!("loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.physics.gravity = gravity;
        self
    }

    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.physics.timestep = timestep;
        self
    }

    pub fn with_max_frame_delta(mut self, max: f32) -> Self {
        self.physics.max_frame_delta = max;
        self
    }

    pub fn with_viewport_size(mut self, size: Vec2) -> Self {
        self.render.viewport_size = size;
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics.enabled = enabled;
        self
    }

    pub fn with_diagnostics_address(mut self, address: impl Into<String>) -> Self {
        self.diagnostics.address = address.into();
        self
    }

    /// Reject values the engine can't run with.
    pub fn validate(&self) -> Result<()> {
        let physics = &self.physics;
        if !physics.gravity.is_finite() {
            return Err(Error::invalid_argument("physics.gravity must be finite"));
        }
        if !(physics.timestep.is_finite() && physics.timestep > 0.0) {
            return Err(Error::invalid_argument(format!(
                "physics.timestep must be positive, got {}",
                physics.timestep
            )));
        }
        if !(physics.max_frame_delta >= physics.timestep) {
            return Err(Error::invalid_argument(format!(
                "physics.max_frame_delta ({}) must be at least one timestep ({})",
                physics.max_frame_delta, physics.timestep
            )));
        }
        let viewport = self.render.viewport_size;
        if !(viewport.is_finite() && viewport.min_element() >= 0.0) {
            return Err(Error::invalid_argument(format!(
                "render.viewport_size must be non-negative, got {viewport}"
            )));
        }
        if !(self.diagnostics.send_rate_hz > 0.0) {
            return Err(Error::invalid_argument("diagnostics.send_rate_hz must be positive"));
        }
        Ok(())
    }
}
