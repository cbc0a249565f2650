//! Process-wide particle defaults.
//!
//! Systems created through a [`ParticleSystemManager`](crate::ParticleSystemManager)
//! take their initial quota, size, material, renderer and timing defaults
//! from these settings. They can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Particle settings file name.
pub const SETTINGS_FILE: &str = "ember.toml";

/// Defaults applied to new particle systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    // === Timing ===
    /// Fixed update step for systems that don't set one (0 = variable)
    pub default_iteration_interval: f32,
    /// Seconds a system keeps updating while off screen (0 = forever)
    pub default_nonvisible_timeout: f32,

    // === Pools ===
    /// Initial particle quota
    pub default_quota: usize,
    /// Initial emitted emitter quota
    pub default_emitted_emitter_quota: usize,

    // === Appearance ===
    /// Default particle width
    pub default_width: f32,
    /// Default particle height
    pub default_height: f32,
    /// Default material name
    pub default_material: String,
    /// Renderer type installed on new systems
    pub default_renderer: String,

    // === Randomness ===
    /// Seed for system random streams (None = random)
    pub seed: Option<u64>,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            default_iteration_interval: 0.0,
            default_nonvisible_timeout: 0.0,
            default_quota: 10,
            default_emitted_emitter_quota: 3,
            default_width: 100.0,
            default_height: 100.0,
            default_material: "BaseWhite".to_string(),
            default_renderer: "null".to_string(),
            seed: None,
        }
    }
}

impl ParticleSettings {
    /// Loads settings from a file, falling back to defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Particle settings not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read particle settings: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(mut settings) => {
                        settings.validate();
                        info!("Loaded particle settings from {}", path.display());
                        settings
                    },
                    Err(e) => {
                        warn!("Failed to parse particle settings: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open particle settings: {e}");
                Self::default()
            },
        }
    }

    /// Saves settings to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved particle settings to {}", path.display());
        Ok(())
    }

    /// Clamps values to usable ranges.
    pub fn validate(&mut self) {
        self.default_iteration_interval = self.default_iteration_interval.max(0.0);
        self.default_nonvisible_timeout = self.default_nonvisible_timeout.max(0.0);

        if self.default_width <= 0.0 {
            warn!("Particle width must be positive, using 100");
            self.default_width = 100.0;
        }
        if self.default_height <= 0.0 {
            warn!("Particle height must be positive, using 100");
            self.default_height = 100.0;
        }
        if self.default_renderer.trim().is_empty() {
            self.default_renderer = "null".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ParticleSettings::default();
        assert_eq!(settings.default_quota, 10);
        assert_eq!(settings.default_emitted_emitter_quota, 3);
        assert_eq!(settings.default_material, "BaseWhite");
        assert_eq!(settings.default_renderer, "null");
        assert!(settings.seed.is_none());
    }

    #[test]
    fn test_validate_clamps() {
        let mut settings = ParticleSettings {
            default_iteration_interval: -1.0,
            default_width: 0.0,
            default_height: -5.0,
            default_renderer: "  ".into(),
            ..Default::default()
        };
        settings.validate();
        assert_eq!(settings.default_iteration_interval, 0.0);
        assert_eq!(settings.default_width, 100.0);
        assert_eq!(settings.default_height, 100.0);
        assert_eq!(settings.default_renderer, "null");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let settings = ParticleSettings {
            default_quota: 250,
            default_iteration_interval: 0.05,
            seed: Some(1234),
            ..Default::default()
        };
        settings.save_to(&path).expect("save");

        let loaded = ParticleSettings::load_from(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_or_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.toml");
        assert_eq!(ParticleSettings::load_from(&missing), ParticleSettings::default());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "default_quota = \"lots\"").expect("write");
        assert_eq!(ParticleSettings::load_from(&broken), ParticleSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "default_quota = 64\n").expect("write");
        let loaded = ParticleSettings::load_from(&path);
        assert_eq!(loaded.default_quota, 64);
        assert_eq!(loaded.default_material, "BaseWhite");
    }
}
