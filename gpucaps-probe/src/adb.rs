use crate::config::{Config, Timeouts};
use anyhow::{anyhow, Context};
use futures::future::{FutureExt, LocalBoxFuture};
use gpucaps_schema::DeviceInfo;
use std::{
    path::PathBuf,
    process::{Output, Stdio},
    time::Duration,
};
use tokio::{process::Command, time};
use tracing::{debug, error, trace, warn};

const MODEL_PROP: &str = "ro.product.model";
const ANDROID_VERSION_PROP: &str = "ro.build.version.release";
const CHIPSET_PROP: &str = "ro.hardware.chipname";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Access to a device over a debug bridge.
///
/// Both methods only fail when the command could not be run to completion, e.g. a missing
/// executable or a timeout. A command that ran but exited with an error is reported through
/// [`CommandOutput::success`].
pub trait DeviceBridge {
    /// Serial the bridge is pinned to, if any.
    fn serial(&self) -> Option<&str>;

    /// Raw output of the device listing command.
    fn devices(&self, timeout: Duration) -> LocalBoxFuture<'_, anyhow::Result<CommandOutput>>;

    fn shell<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
    ) -> LocalBoxFuture<'a, anyhow::Result<CommandOutput>>;
}

pub struct Adb {
    program: PathBuf,
    serial: Option<String>,
}

impl Adb {
    pub fn new(config: &Config, serial: Option<String>) -> Self {
        Self {
            program: config.adb_path.clone(),
            serial,
        }
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> anyhow::Result<CommandOutput> {
        debug!("running adb with args {args:?}");

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = time::timeout(timeout, command.output())
            .await
            .map_err(|_| anyhow!("adb {args:?} timed out after {}s", timeout.as_secs()))?
            .with_context(|| format!("Could not run {}", self.program.display()))?;

        let output = CommandOutput::from(output);
        trace!("adb {args:?} output: {output:?}");
        Ok(output)
    }
}

impl DeviceBridge for Adb {
    fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn devices(&self, timeout: Duration) -> LocalBoxFuture<'_, anyhow::Result<CommandOutput>> {
        self.run(&["devices"], timeout).boxed_local()
    }

    fn shell<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
    ) -> LocalBoxFuture<'a, anyhow::Result<CommandOutput>> {
        async move {
            match &self.serial {
                Some(serial) => {
                    self.run(&["-s", serial.as_str(), "shell", command], timeout)
                        .await
                }
                None => self.run(&["shell", command], timeout).await,
            }
        }
        .boxed_local()
    }
}

/// Extracts serials of devices in the `device` state from `adb devices` output.
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            (parts.next()? == "device").then(|| serial.to_owned())
        })
        .collect()
}

/// Lists attached devices. Failures are logged and result in an empty list.
pub async fn list_devices(bridge: &impl DeviceBridge, timeouts: &Timeouts) -> Vec<String> {
    match bridge.devices(timeouts.device_list()).await {
        Ok(output) if output.success => parse_device_list(&output.stdout),
        Ok(output) => {
            error!("failed to list devices: {}", output.stderr.trim());
            Vec::new()
        }
        Err(err) => {
            error!("failed to list devices: {err:#}");
            Vec::new()
        }
    }
}

/// Checks that the bridge works and that the device it targets is attached.
pub async fn is_available(bridge: &impl DeviceBridge, timeouts: &Timeouts) -> bool {
    let devices = list_devices(bridge, timeouts).await;
    match bridge.serial() {
        Some(serial) => {
            let found = devices.iter().any(|device| device == serial);
            if !found {
                warn!("device {serial} is not attached, found {devices:?}");
            }
            found
        }
        None => !devices.is_empty(),
    }
}

/// Reads a system property, treating failures and empty values as absent.
pub async fn getprop(bridge: &impl DeviceBridge, name: &str, timeout: Duration) -> Option<String> {
    let command = format!("getprop {name}");
    match bridge.shell(&command, timeout).await {
        Ok(output) if output.success => {
            let value = output.stdout.trim();
            (!value.is_empty()).then(|| value.to_owned())
        }
        Ok(output) => {
            warn!("getprop {name} failed: {}", output.stderr.trim());
            None
        }
        Err(err) => {
            warn!("getprop {name} failed: {err:#}");
            None
        }
    }
}

pub async fn read_device_info(bridge: &impl DeviceBridge, timeouts: &Timeouts) -> DeviceInfo {
    DeviceInfo {
        model: getprop(bridge, MODEL_PROP, timeouts.property()).await,
        android_version: getprop(bridge, ANDROID_VERSION_PROP, timeouts.property()).await,
        chipset: getprop(bridge, CHIPSET_PROP, timeouts.property()).await,
    }
}

/// Runs a shell command and returns its stdout if it succeeded.
pub async fn shell_output(
    bridge: &impl DeviceBridge,
    command: &str,
    timeout: Duration,
) -> Option<String> {
    match bridge.shell(command, timeout).await {
        Ok(output) if output.success => Some(output.stdout),
        Ok(output) => {
            warn!("`{command}` exited with an error: {}", output.stderr.trim());
            None
        }
        Err(err) => {
            warn!("`{command}` failed: {err:#}");
            None
        }
    }
}
