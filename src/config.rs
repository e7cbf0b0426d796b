//! Configuration management for the peripheral service.
//!
//! This module handles loading and saving configuration from disk,
//! including the preferred adapter and timing parameters.

use std::{env, fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{PeripheralError, Result};

/// Main configuration structure for the service.
#[derive(Serialize, Deserialize, Clone)]
pub struct Config {
   /// Adapter to advertise on. Falls back to the first adapter, then `hci0`.
   #[serde(default)]
   pub adapter: Option<SmolStr>,

   /// Maximum time to wait for the radio to confirm an advertising start.
   #[serde(default = "default_start_timeout")]
   pub start_timeout_sec: u64,
}

const fn default_start_timeout() -> u64 {
   30
}

impl Default for Config {
   fn default() -> Self {
      Self {
         adapter: None,
         start_timeout_sec: default_start_timeout(),
      }
   }
}

impl Config {
   /// Loads configuration from disk or creates default if not exists.
   pub fn load() -> Result<Self> {
      let config_path = Self::config_path()?;

      if config_path.exists() {
         let contents = fs::read_to_string(&config_path)?;
         Ok(toml::from_str(&contents)?)
      } else {
         // Create default config
         let config = Self::default();
         config.save()?;
         Ok(config)
      }
   }

   /// Saves the current configuration to disk.
   pub fn save(&self) -> Result<()> {
      let config_path = Self::config_path()?;

      // Ensure directory exists
      if let Some(parent) = config_path.parent() {
         fs::create_dir_all(parent)?;
      }

      let contents = toml::to_string_pretty(self)?;
      fs::write(&config_path, contents)?;

      Ok(())
   }

   fn config_path() -> Result<PathBuf> {
      let config_dir = if let Ok(peripherald_home) = env::var("PERIPHERALD_HOME") {
         PathBuf::from(peripherald_home)
      } else if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
         PathBuf::from(config_home)
      } else if let Ok(home) = env::var("HOME") {
         PathBuf::from(home).join(".config")
      } else {
         return Err(PeripheralError::ConfigDirNotFound);
      };

      Ok(config_dir.join("peripherald").join("config.toml"))
   }
}
