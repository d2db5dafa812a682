//! `config.json`: model, shaders, logging and terrain.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use asset::terrain;
use log::LevelFilter;
use serde::Deserialize;

pub const DEFAULT_PATH: &str = "resources/config.json";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    pub model: PathBuf,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
    pub debug_logging_enabled: bool,
    pub info_logging_enabled: bool,
    /// Terrain cells per side; 0 = no terrain.
    pub terrain_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: PathBuf::from("resources/models/cube.obj"),
            vertex_shader: None,
            fragment_shader: None,
            debug_logging_enabled: false,
            info_logging_enabled: true,
            terrain_size: 0,
        }
    }
}

/// Where the effective config came from.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    File(PathBuf),
    /// The default file was absent.
    Defaults(PathBuf),
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        if config.terrain_size > terrain::MAX_SIZE {
            bail!(
                "Invalid config {}: terrainSize {} exceeds {}",
                path.display(),
                config.terrain_size,
                terrain::MAX_SIZE
            );
        }
        Ok(config)
    }

    /// Read `path`, or the default location when `None`. Only a missing
    /// default file falls back to built-in values.
    pub fn load(path: Option<&Path>) -> Result<(Self, Source)> {
        match path {
            Some(path) => Ok((Self::from_file(path)?, Source::File(path.to_path_buf()))),
            None => {
                let path = Path::new(DEFAULT_PATH);
                if path.exists() {
                    Ok((Self::from_file(path)?, Source::File(path.to_path_buf())))
                } else {
                    Ok((Self::default(), Source::Defaults(path.to_path_buf())))
                }
            }
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.debug_logging_enabled {
            LevelFilter::Debug
        } else if self.info_logging_enabled {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("config.json");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{
                "model": "resources/objects/backpack/backpack.obj",
                "vertexShader": "shaders/model.vert.wgsl",
                "fragmentShader": "shaders/model.frag.wgsl",
                "debugLoggingEnabled": true,
                "infoLoggingEnabled": false,
                "terrainSize": 64
            }"#,
        );
        let (config, source) = Config::load(Some(&path)).unwrap();
        assert_eq!(source, Source::File(path));
        assert_eq!(config.model, Path::new("resources/objects/backpack/backpack.obj"));
        assert_eq!(
            config.fragment_shader.as_deref(),
            Some(Path::new("shaders/model.frag.wgsl"))
        );
        assert_eq!(config.terrain_size, 64);
        assert_eq!(config.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{ "model": "a.obj" }"#);
        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config,
            Config {
                model: PathBuf::from("a.obj"),
                ..Config::default()
            }
        );
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn quiet_config_logs_warnings_only() {
        let config = Config {
            info_logging_enabled: false,
            ..Config::default()
        };
        assert_eq!(config.log_level(), LevelFilter::Warn);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("nowhere/config.json"))).unwrap_err();
        assert!(format!("{err:#}").contains("nowhere/config.json"));
    }

    #[test]
    fn oversized_terrain_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{ "terrainSize": 65535 }"#);
        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("terrainSize 65535"), "{err:#}");

        let path = write(dir.path(), r#"{ "terrainSize": 65534 }"#);
        assert_eq!(Config::from_file(&path).unwrap().terrain_size, terrain::MAX_SIZE);
    }

    #[test]
    fn typos_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{ "modle": "a.obj" }"#);
        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("modle"), "{err:#}");
    }
}
