//! Configuration system
//!
//! Serializable demo settings with TOML and RON loading, builder-style
//! setters, and validation that rejects settings the pipeline cannot honor.

use serde::{Deserialize, Serialize};

use crate::display::DisplayConfig;
use crate::hal::pad::Buttons;
use crate::hal::sim::SimOptions;
use crate::hal::{AspectRatio, Color, CopyFilter, Gamma};

/// Configuration trait: load from and save to TOML or RON files
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A setting the pipeline cannot honor
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the rotating quad demo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Rotation speed in degrees per second
    pub rotation_speed_dps: f32,
    /// Vertical field of view in degrees
    pub fov_y_deg: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Background clear color
    pub clear_color: Color,
    /// Override the system aspect ratio instead of querying it
    pub forced_aspect: Option<AspectRatio>,
    /// Display copy filter
    pub copy_filter: CopyFilter,
    /// Display copy gamma
    pub gamma: Gamma,
    /// Simulated display refresh rate
    pub refresh_hz: f32,
    /// Sleep one refresh period per vsync wait (off for tests)
    pub pace_to_refresh: bool,
    /// Report a 16:9 system configuration
    pub widescreen: bool,
    /// Scan on which the scripted pad presses the exit button
    pub run_frames: u64,
    /// Optional scan on which the scripted pad presses the load button
    pub load_spike_frame: Option<u64>,
    /// Install the tracing collector for profiling output
    pub enable_profiling: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            rotation_speed_dps: 90.0,
            fov_y_deg: 60.0,
            near: 10.0,
            far: 300.0,
            clear_color: Color::BLACK,
            forced_aspect: None,
            copy_filter: CopyFilter::Sharp,
            gamma: Gamma::Linear,
            refresh_hz: 60.0,
            pace_to_refresh: true,
            widescreen: false,
            run_frames: 600,
            load_spike_frame: None,
            enable_profiling: false,
        }
    }
}

impl Config for DemoConfig {}

impl DemoConfig {
    /// Set the rotation speed
    pub fn with_rotation_speed(mut self, dps: f32) -> Self {
        self.rotation_speed_dps = dps;
        self
    }

    /// Set how many frames the scripted run lasts
    pub fn with_run_frames(mut self, frames: u64) -> Self {
        self.run_frames = frames;
        self
    }

    /// Enable or disable the tracing collector
    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.enable_profiling = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_hz <= 0.0 {
            return Err(ConfigError::Invalid("refresh rate must be positive".into()));
        }
        if self.rotation_speed_dps < 0.0 {
            return Err(ConfigError::Invalid(
                "rotation speed must be non-negative".into(),
            ));
        }
        // The angle wrap handles at most one full turn per frame
        if self.rotation_speed_dps >= 360.0 * self.refresh_hz {
            return Err(ConfigError::Invalid(format!(
                "rotation speed {}°/s exceeds one turn per frame at {} Hz",
                self.rotation_speed_dps, self.refresh_hz
            )));
        }
        if !(0.0..180.0).contains(&self.fov_y_deg) || self.fov_y_deg == 0.0 {
            return Err(ConfigError::Invalid(
                "field of view must be in (0, 180) degrees".into(),
            ));
        }
        if self.near <= 0.0 || self.near >= self.far {
            return Err(ConfigError::Invalid(
                "near plane must be positive and closer than the far plane".into(),
            ));
        }
        if self.run_frames == 0 {
            return Err(ConfigError::Invalid("run must last at least one frame".into()));
        }
        if let Some(spike) = self.load_spike_frame {
            if spike >= self.run_frames {
                return Err(ConfigError::Invalid(
                    "load spike frame is after the scripted exit".into(),
                ));
            }
        }
        Ok(())
    }

    /// The display setup options this configuration selects
    pub fn display_config(&self) -> DisplayConfig {
        DisplayConfig {
            clear_color: self.clear_color,
            copy_filter: self.copy_filter,
            gamma: self.gamma,
            fov_y_deg: self.fov_y_deg,
            near: self.near,
            far: self.far,
            forced_aspect: self.forced_aspect,
        }
    }

    /// The simulated console options this configuration selects
    pub fn sim_options(&self) -> SimOptions {
        SimOptions {
            refresh_hz: self.refresh_hz,
            pace_to_refresh: self.pace_to_refresh,
            widescreen: self.widescreen,
        }
    }

    /// The scripted pad schedule for a headless run
    pub fn pad_schedule(&self) -> Vec<(u64, Buttons)> {
        let mut schedule = Vec::new();
        if let Some(spike) = self.load_spike_frame {
            schedule.push((spike, Buttons::B));
        }
        schedule.push((self.run_frames, Buttons::HOME));
        schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(DemoConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_rotation_faster_than_one_turn_per_frame() {
        let config = DemoConfig {
            rotation_speed_dps: 360.0 * 60.0,
            ..DemoConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_inverted_planes_and_zero_run() {
        let config = DemoConfig {
            near: 400.0,
            ..DemoConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DemoConfig {
            run_frames: 0,
            ..DemoConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: DemoConfig =
            toml::from_str("rotation_speed_dps = 45.0\nwidescreen = true").unwrap();
        assert_eq!(config.rotation_speed_dps, 45.0);
        assert!(config.widescreen);
        assert_eq!(config.run_frames, 600);
    }

    #[test]
    fn pad_schedule_ends_with_exit() {
        let config = DemoConfig::default()
            .with_run_frames(10)
            .with_rotation_speed(180.0);
        let mut with_spike = config.clone();
        with_spike.load_spike_frame = Some(5);

        let schedule = with_spike.pad_schedule();
        assert_eq!(schedule, vec![(5, Buttons::B), (10, Buttons::HOME)]);
    }
}
