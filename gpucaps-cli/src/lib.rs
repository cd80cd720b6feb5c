mod report;
mod subcommands;

pub use report::{render_gles, render_vulkan};

use anyhow::{Context, Result};
use gpucaps_probe::{adb, Adb, Config};
use gpucaps_schema::args::{Command, CommonArgs};
use serde::Serialize;
use std::{fs, path::Path};
use tracing::info;

pub fn run(command: Command, config: &Config) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Could not start the async runtime")?;

    rt.block_on(async move {
        match &command {
            Command::Gles(args) => {
                let ctx = CliContext::new(&args.common, config);
                subcommands::gles(ctx, args.mode).await
            }
            Command::Vulkan(args) => {
                let ctx = CliContext::new(&args.common, config);
                subcommands::vulkan(ctx, args.mode).await
            }
        }
    })
}

struct CliContext<'a> {
    args: &'a CommonArgs,
    config: &'a Config,
    adb: Adb,
}

impl<'a> CliContext<'a> {
    fn new(args: &'a CommonArgs, config: &'a Config) -> Self {
        Self {
            args,
            config,
            adb: Adb::new(config, args.device.clone()),
        }
    }

    async fn list_devices(&self) -> Result<()> {
        let devices = adb::list_devices(&self.adb, &self.config.timeouts).await;
        print!("{}", device_list(&devices));
        Ok(())
    }

    fn input(&self, mode: &str) -> Result<&'a Path> {
        self.args
            .input
            .as_deref()
            .with_context(|| format!("--input is required for {mode} mode"))
    }

    /// Prints the report and writes the optional report and JSON files.
    fn emit(&self, report: &str, record: &impl Serialize) -> Result<()> {
        if let Some(path) = &self.args.output {
            fs::write(path, report)
                .with_context(|| format!("Could not write report to {}", path.display()))?;
            info!("report saved to {}", path.display());
        }

        println!("{report}");

        if let Some(path) = &self.args.json_output {
            let json =
                serde_json::to_string_pretty(record).context("Could not serialize capabilities")?;
            fs::write(path, json)
                .with_context(|| format!("Could not write JSON to {}", path.display()))?;
            info!("raw JSON saved to {}", path.display());
        }

        Ok(())
    }
}

fn device_list(devices: &[String]) -> String {
    if devices.is_empty() {
        return "No devices found\n".to_owned();
    }

    let mut text = "Connected devices:\n".to_owned();
    for serial in devices {
        text.push_str(&format!("  - {serial}\n"));
    }
    text
}
