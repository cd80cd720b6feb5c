use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

const FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub adb_path: PathBuf,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            timeouts: Timeouts::default(),
        }
    }
}

/// Upper bounds for each adb invocation, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    pub device_list_secs: u64,
    pub property_secs: u64,
    pub probe_lookup_secs: u64,
    pub surfaceflinger_secs: u64,
    pub fallback_dump_secs: u64,
    pub vulkaninfo_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            device_list_secs: 10,
            property_secs: 10,
            probe_lookup_secs: 10,
            surfaceflinger_secs: 15,
            fallback_dump_secs: 10,
            vulkaninfo_secs: 60,
        }
    }
}

impl Timeouts {
    pub fn device_list(&self) -> Duration {
        Duration::from_secs(self.device_list_secs)
    }

    pub fn property(&self) -> Duration {
        Duration::from_secs(self.property_secs)
    }

    pub fn probe_lookup(&self) -> Duration {
        Duration::from_secs(self.probe_lookup_secs)
    }

    pub fn surfaceflinger(&self) -> Duration {
        Duration::from_secs(self.surfaceflinger_secs)
    }

    pub fn fallback_dump(&self) -> Duration {
        Duration::from_secs(self.fallback_dump_secs)
    }

    pub fn vulkaninfo(&self) -> Duration {
        Duration::from_secs(self.vulkaninfo_secs)
    }
}

impl Config {
    /// Loads the config from an explicit path, or from the default location when one is not given.
    /// A missing file at the default location is not an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        debug!("loading config from {}", path.display());
        let raw_config = fs::read_to_string(path)
            .with_context(|| format!("Could not open config file {}", path.display()))?;
        serde_yml::from_str(&raw_config).context("Could not deserialize config")
    }
}

fn default_path() -> Option<PathBuf> {
    let config_dir = match env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => PathBuf::from(env::var("HOME").ok()?).join(".config"),
    };
    Some(config_dir.join("gpucaps").join(FILE_NAME))
}
