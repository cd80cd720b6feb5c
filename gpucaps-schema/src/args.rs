pub use clap;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Log filter, e.g. `debug` or `gpucaps_probe=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Path to the config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Enumerate OpenGL ES capabilities
    Gles(GlesArgs),
    /// Enumerate Vulkan capabilities
    Vulkan(VulkanArgs),
}

#[derive(Parser)]
pub struct GlesArgs {
    /// Where to read capabilities from
    #[arg(long, value_enum, default_value_t = GlesSource::Device)]
    pub mode: GlesSource,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser)]
pub struct VulkanArgs {
    /// Where to read capabilities from
    #[arg(long, value_enum, default_value_t = VulkanSource::Device)]
    pub mode: VulkanSource,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(ClapArgs, Default)]
pub struct CommonArgs {
    /// Input file, required when reading from a file
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Also write the report to this file
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Serial of the adb device to query
    #[arg(long)]
    pub device: Option<String>,
    /// List connected adb devices and exit
    #[arg(long)]
    pub list_devices: bool,
    /// Export the raw capabilities record as JSON
    #[arg(long)]
    pub json_output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlesSource {
    /// Query a connected device over adb
    Device,
    /// Parse a GL/EGL info log
    Log,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VulkanSource {
    /// Query a connected device over adb
    Device,
    /// Parse a vulkaninfo JSON export
    Json,
}
