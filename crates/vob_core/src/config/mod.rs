//! Application settings.
//!
//! Settings live in one TOML file split into sections (paths, encode,
//! timing, batch, supervisor, logging). [`ConfigManager`] loads the file
//! with defaults for anything missing, writes atomically, and can rewrite
//! a single section without disturbing the rest.
//!
//! ```no_run
//! use vob_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new("settings.toml");
//! config.load_or_create().unwrap();
//!
//! config.settings_mut().encode.crf = 18;
//! config.update_section(ConfigSection::Encode).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    BatchSettings, ConfigSection, EncodeSettings, LoggingSettings, PathSettings, Settings,
    SupervisorSettings, TimingSettings,
};
