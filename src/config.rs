use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Result, anyhow};
use log::Level;
use serde::Deserialize;

use crate::constants::{ENV_GCP_ENABLED, ENV_LOG_LEVEL, ENV_METADATA_URL, GCP_METADATA_URL_BASE};
use crate::provider::HwAddr;

/// Contents of the configuration file. Every field is optional and
/// overrides the corresponding default.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub enabled: Option<bool>,
    pub log_level: Option<String>,
    pub metadata_url: Option<String>,
    pub hwaddrs: Option<Vec<String>>,
}

impl ConfigFile {
    pub fn from_path(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(anyhow!("unable to open {:?}: {}", path, e)),
        };
        serde_json::from_reader(file)
            .map(Some)
            .map_err(|e| anyhow!("unable to parse {:?}: {}", path, e))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub enabled: bool,
    pub log_level: Level,
    pub metadata_url: String,
    pub hwaddrs: Vec<HwAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: false,
            log_level: Level::Info,
            metadata_url: GCP_METADATA_URL_BASE.into(),
            hwaddrs: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the configuration file at `path`, if any, and applies
    /// environment overrides on top.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        if let Some(file) = ConfigFile::from_path(path)? {
            config.merge_file(file)?;
        }
        config.merge_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn merge_file(&mut self, other: ConfigFile) -> Result<()> {
        if let Some(enabled) = other.enabled {
            self.enabled = enabled;
        }
        if let Some(level) = other.log_level {
            self.log_level = parse_level(&level)?;
        }
        if let Some(url) = other.metadata_url {
            self.metadata_url = url;
        }
        if let Some(hwaddrs) = other.hwaddrs {
            self.hwaddrs = hwaddrs
                .iter()
                .map(|s| {
                    s.parse()
                        .map_err(|e| anyhow!("invalid hwaddr in configuration: {}", e))
                })
                .collect::<Result<_>>()?;
        }
        Ok(())
    }

    pub fn merge_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_GCP_ENABLED) {
            self.enabled = parse_bool(&value)
                .ok_or_else(|| anyhow!("invalid value {:?} for {}", value, ENV_GCP_ENABLED))?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = parse_level(&value)?;
        }
        if let Some(value) = lookup(ENV_METADATA_URL)
            && !value.is_empty()
        {
            self.metadata_url = value;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_level(value: &str) -> Result<Level> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid log level {:?}", value))
}
