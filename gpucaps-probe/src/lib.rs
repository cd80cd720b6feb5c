#![warn(clippy::pedantic)]

pub mod adb;
pub mod config;
pub mod gles;
pub mod vulkan;

#[cfg(test)]
mod tests;

pub use adb::{Adb, DeviceBridge};
pub use config::Config;

use std::{fs, path::Path};
use tracing::{error, info};

/// Reads a capture file. Any I/O failure is logged and reported as missing data.
pub fn read_source(path: &Path) -> Option<String> {
    info!("loading capabilities from {}", path.display());
    match fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(err) => {
            error!("could not read {}: {err}", path.display());
            None
        }
    }
}
