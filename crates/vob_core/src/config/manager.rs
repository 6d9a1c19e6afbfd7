//! Settings persistence.
//!
//! The manager owns one TOML file. Whole-file saves regenerate it with
//! commented section headers; single-section updates go through
//! `toml_edit` so hand-written comments elsewhere in the file survive.
//! Every write lands via a temp file and rename.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};
use crate::models::OverlayLayer;

/// Top-level tables a settings file may contain.
const VALID_SECTIONS: [&str; 6] = [
    "paths",
    "encode",
    "timing",
    "batch",
    "supervisor",
    "logging",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Loads, saves, and patches the settings file.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Point the manager at a settings file without touching disk yet.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory edits only; nothing reaches disk until `save` or
    /// `update_section`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load the file, failing when it does not exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = toml::from_str(&content)?;
        Ok(())
    }

    /// Load the file, writing defaults first when it is missing.
    ///
    /// An existing file is normalized on the way in: unknown tables are
    /// dropped and missing keys gain their defaults, with the cleaned
    /// result written back.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, needs_rewrite) = self.normalize(&content)?;
            self.settings = settings;
            if needs_rewrite {
                self.save()?;
            }
        } else {
            if let Some(parent) = self.config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Create every configured directory, including one template
    /// subdirectory per overlay layer.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let dirs = [
            &self.settings.paths.material_folder,
            &self.settings.paths.templates_folder,
            &self.settings.paths.output_folder,
            &self.settings.paths.logs_folder,
        ];
        for dir in dirs {
            fs::create_dir_all(dir)?;
        }

        for layer in OverlayLayer::STACKING_ORDER {
            fs::create_dir_all(self.layer_dir(layer))?;
        }

        Ok(())
    }

    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    pub fn output_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.output_folder)
    }

    /// Template directory for one overlay layer.
    pub fn layer_dir(&self, layer: OverlayLayer) -> PathBuf {
        PathBuf::from(&self.settings.paths.templates_folder).join(layer.dir_name())
    }

    /// Parse `content` and report whether a rewrite would change it.
    fn normalize(&self, content: &str) -> ConfigResult<(Settings, bool)> {
        let doc: DocumentMut = content.parse()?;
        let settings: Settings = toml::from_str(content)?;

        let has_unknown = doc.iter().any(|(key, _)| !VALID_SECTIONS.contains(&key));

        // A differing re-serialization means keys were missing their defaults.
        let reserialized = toml::to_string_pretty(&settings)?;
        let needs_rewrite = has_unknown || content.trim() != reserialized.trim();

        Ok((settings, needs_rewrite))
    }

    /// Regenerate the whole file from the in-memory settings.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.render()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Rewrite one section, leaving the rest of the file as it is on disk.
    ///
    /// The file is re-read first so concurrent in-memory edits to other
    /// sections never leak into this write.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let on_disk = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if on_disk.is_empty() {
            DocumentMut::new()
        } else {
            on_disk.parse()?
        };

        let section_toml = match section {
            ConfigSection::Paths => toml::to_string_pretty(&self.settings.paths)?,
            ConfigSection::Encode => toml::to_string_pretty(&self.settings.encode)?,
            ConfigSection::Timing => toml::to_string_pretty(&self.settings.timing)?,
            ConfigSection::Batch => toml::to_string_pretty(&self.settings.batch)?,
            ConfigSection::Supervisor => toml::to_string_pretty(&self.settings.supervisor)?,
            ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
        };
        let section_doc: DocumentMut = section_toml.parse()?;

        doc[section.table_name()] = Item::Table(section_doc.as_table().clone());
        self.atomic_write(&doc.to_string())?;

        Ok(())
    }

    /// Render the settings as TOML with a commented header per section.
    fn render(&self) -> ConfigResult<String> {
        let mut output = String::from(
            "# Video Overlay Batch configuration\n\
             # Generated file; section updates keep hand-written comments.\n\n",
        );

        let sections: [(&str, &str, String); 6] = [
            (
                "Source, template, and output directories",
                "paths",
                toml::to_string_pretty(&self.settings.paths)?,
            ),
            (
                "Encode parameters",
                "encode",
                toml::to_string_pretty(&self.settings.encode)?,
            ),
            (
                "Overlay placement timing",
                "timing",
                toml::to_string_pretty(&self.settings.timing)?,
            ),
            (
                "Batch execution",
                "batch",
                toml::to_string_pretty(&self.settings.batch)?,
            ),
            (
                "Process supervision",
                "supervisor",
                toml::to_string_pretty(&self.settings.supervisor)?,
            ),
            (
                "Logging configuration",
                "logging",
                toml::to_string_pretty(&self.settings.logging)?,
            ),
        ];

        for (comment, name, body) in sections {
            output.push_str(&format!("# {comment}\n[{name}]\n{body}\n"));
        }

        Ok(output)
    }

    /// Write via a temp file in the same directory so the rename is atomic.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[paths]"));
        assert!(content.contains("[supervisor]"));
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(&config_path, "[paths]\noutput_folder = \"renders\"\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().paths.output_folder, "renders");
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        manager.settings_mut().encode.crf = 18;
        manager.update_section(ConfigSection::Encode).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("crf = 18"));
        // Untouched sections keep their defaults.
        assert!(content.contains("[paths]"));
        assert!(content.contains("material_videos"));
    }

    #[test]
    fn ensure_dirs_creates_layer_subdirs() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.settings_mut().paths.material_folder =
            dir.path().join("material").to_string_lossy().into_owned();
        manager.settings_mut().paths.templates_folder =
            dir.path().join("templates").to_string_lossy().into_owned();
        manager.settings_mut().paths.output_folder =
            dir.path().join("out").to_string_lossy().into_owned();
        manager.settings_mut().paths.logs_folder =
            dir.path().join("logs").to_string_lossy().into_owned();

        manager.ensure_dirs_exist().unwrap();

        assert!(dir.path().join("templates").join("bottom_layer").is_dir());
        assert!(dir.path().join("templates").join("middle_layer").is_dir());
        assert!(dir.path().join("templates").join("top_layer").is_dir());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(!config_path.with_extension("toml.tmp").exists());
    }
}
