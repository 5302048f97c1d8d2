use std::path::{Path, PathBuf};
use std::time::Duration;

use nes::{DisplayMode, LaunchOptions, RomTarget};
use serde::{Deserialize, Serialize};

use crate::{CurriculumConfig, GymError, RewardConfig};

/// Settings shared by every session of a [`crate::Gym`].
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GymConfig {
    pub display: DisplayMode,
    /// Directory searched for ROM images by file name.
    pub rom_dir: PathBuf,
    /// Explicit ROM image, overriding `rom_dir`.
    pub rom_path: Option<PathBuf>,
    /// Emulator executable; searched on `PATH` when unset.
    pub emulator_path: Option<PathBuf>,
    pub lua_scripts: Vec<PathBuf>,
    pub boot_timeout_ms: u64,
    pub reset_timeout_ms: u64,
    pub step_timeout_ms: u64,
    pub reward: RewardConfig,
    pub curriculum: CurriculumConfig,
}

impl Default for GymConfig {
    fn default() -> Self {
        Self {
            display: DisplayMode::default(),
            rom_dir: PathBuf::from("roms"),
            rom_path: None,
            emulator_path: None,
            lua_scripts: Vec::new(),
            boot_timeout_ms: 30_000,
            reset_timeout_ms: 40_000,
            step_timeout_ms: 5_000,
            reward: RewardConfig::default(),
            curriculum: CurriculumConfig::default(),
        }
    }
}

impl GymConfig {
    /// # Errors
    /// [`GymError::Config`] when the text is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self, GymError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// [`GymError::Config`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, GymError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GymError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Defaults adjusted by the process environment: `FULLSCREEN` (any
    /// value) selects fullscreen display, `SMB_ROM_PATH` names the ROM image
    /// and `FCEUX_PATH` the emulator executable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var_os(key))
    }

    /// Applies environment overrides read through `lookup`.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<std::ffi::OsString>) -> Self {
        if lookup("FULLSCREEN").is_some() {
            self.display = DisplayMode::Fullscreen;
        }
        if let Some(rom) = lookup("SMB_ROM_PATH") {
            self.rom_path = Some(PathBuf::from(rom));
        }
        if let Some(exe) = lookup("FCEUX_PATH") {
            self.emulator_path = Some(PathBuf::from(exe));
        }
        self
    }

    #[must_use]
    pub fn with_display(mut self, display: DisplayMode) -> Self {
        self.display = display;
        self
    }

    #[must_use]
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    #[must_use]
    pub fn rom_path_for(&self, rom: RomTarget) -> PathBuf {
        self.rom_path.clone().unwrap_or_else(|| self.rom_dir.join(rom.file_name()))
    }

    #[must_use]
    pub fn launch_options(&self, rom: RomTarget) -> LaunchOptions {
        LaunchOptions {
            display: self.display,
            rom_path: self.rom_path_for(rom),
            lua_scripts: self.lua_scripts.clone(),
            boot_timeout: Duration::from_millis(self.boot_timeout_ms),
            frame_timeout: self.step_timeout(),
        }
    }
}
