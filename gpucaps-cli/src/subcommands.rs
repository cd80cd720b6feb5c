use crate::{report, CliContext};
use anyhow::{Context, Result};
use gpucaps_probe::{gles, vulkan};
use gpucaps_schema::args::{GlesSource, VulkanSource};
use tracing::info;

const NO_DATA: &str = "No capabilities data retrieved";

pub async fn gles(ctx: CliContext<'_>, mode: GlesSource) -> Result<()> {
    if ctx.args.list_devices {
        return ctx.list_devices().await;
    }

    let caps = match mode {
        GlesSource::Device => {
            info!("querying OpenGL ES capabilities from device");
            gles::query_device(&ctx.adb, &ctx.config.timeouts).await
        }
        GlesSource::Log => gles::load_log(ctx.input("log")?),
    }
    .context(NO_DATA)?;

    ctx.emit(&report::render_gles(&caps), &caps)
}

pub async fn vulkan(ctx: CliContext<'_>, mode: VulkanSource) -> Result<()> {
    if ctx.args.list_devices {
        return ctx.list_devices().await;
    }

    let caps = match mode {
        VulkanSource::Device => {
            info!("querying Vulkan capabilities from device");
            vulkan::query_device(&ctx.adb, &ctx.config.timeouts).await
        }
        VulkanSource::Json => vulkan::load_json(ctx.input("json")?),
    }
    .context(NO_DATA)?;

    ctx.emit(&report::render_vulkan(&caps), &caps)
}
