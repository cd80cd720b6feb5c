use crate::{
    adb::{self, DeviceBridge},
    config::Timeouts,
};
use gpucaps_schema::{GlesCapabilities, GlesVersion};
use std::{iter, path::Path};
use tracing::{debug, error, info, warn};

const GLES_VERSION_PROP: &str = "ro.opengles.version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    GlVersion,
    GlVendor,
    GlRenderer,
    GlExtensions,
    EglVersion,
    EglExtensions,
}

/// Labels used by GL info logs, e.g. the output of a native test app.
const LOG_LABELS: &[(&str, Field)] = &[
    ("GL_VERSION:", Field::GlVersion),
    ("GL_VENDOR:", Field::GlVendor),
    ("GL_RENDERER:", Field::GlRenderer),
    ("GL_EXTENSIONS:", Field::GlExtensions),
    ("EGL_VERSION:", Field::EglVersion),
    ("EGL_EXTENSIONS:", Field::EglExtensions),
];

/// Labels used by `dumpsys SurfaceFlinger`.
const SURFACEFLINGER_LABELS: &[(&str, Field)] = &[
    ("GLES:", Field::GlVersion),
    ("GL_VENDOR:", Field::GlVendor),
    ("GL_RENDERER:", Field::GlRenderer),
    ("GL extensions:", Field::GlExtensions),
    ("EGL version:", Field::EglVersion),
    ("EGL extensions:", Field::EglExtensions),
];

pub fn parse_log(text: &str) -> GlesCapabilities {
    extract(text, LOG_LABELS)
}

pub fn parse_surfaceflinger(text: &str) -> GlesCapabilities {
    extract(text, SURFACEFLINGER_LABELS)
}

/// Parses a GL info log from disk. Returns `None` only when the file cannot be read.
pub fn load_log(path: &Path) -> Option<GlesCapabilities> {
    crate::read_source(path).map(|text| parse_log(&text))
}

fn extract(text: &str, labels: &[(&str, Field)]) -> GlesCapabilities {
    let lines: Vec<&str> = text.lines().collect();
    let mut caps = GlesCapabilities::default();

    for (label, field) in labels {
        let Some((index, rest)) = find_label(&lines, label) else {
            debug!("label {label:?} not found");
            continue;
        };

        match field {
            Field::GlVersion => caps.gl_version = scalar_value(&lines, index, rest),
            Field::GlVendor => caps.gl_vendor = scalar_value(&lines, index, rest),
            Field::GlRenderer => caps.gl_renderer = scalar_value(&lines, index, rest),
            Field::EglVersion => caps.egl_version = scalar_value(&lines, index, rest),
            Field::GlExtensions => caps.gl_extensions = token_block(&lines, index, rest),
            Field::EglExtensions => caps.egl_extensions = token_block(&lines, index, rest),
        }
    }

    caps
}

/// Finds the first line starting with the label, returning its index and the text after the label.
fn find_label<'a>(lines: &[&'a str], label: &str) -> Option<(usize, &'a str)> {
    lines
        .iter()
        .copied()
        .enumerate()
        .find_map(|(i, line)| line.trim_start().strip_prefix(label).map(|rest| (i, rest)))
}

/// Index of the line where the value starts: the label line itself, or the next non-blank line
/// when nothing follows the label.
fn value_start(lines: &[&str], index: usize, rest: &str) -> Option<usize> {
    if rest.trim().is_empty() {
        (index + 1..lines.len()).find(|i| !lines[*i].trim().is_empty())
    } else {
        Some(index)
    }
}

fn scalar_value(lines: &[&str], index: usize, rest: &str) -> Option<String> {
    let start = value_start(lines, index, rest)?;
    let value = if start == index { rest } else { lines[start] };
    Some(value.trim().to_owned())
}

/// Whitespace separated tokens up to the first blank line.
fn token_block(lines: &[&str], index: usize, rest: &str) -> Vec<String> {
    let Some(start) = value_start(lines, index, rest) else {
        return Vec::new();
    };

    let first_line = if start == index { rest } else { lines[start] };
    let following = lines[start + 1..]
        .iter()
        .copied()
        .take_while(|line| !line.trim().is_empty());

    iter::once(first_line)
        .chain(following)
        .flat_map(str::split_whitespace)
        .map(str::to_owned)
        .collect()
}

/// Queries a connected device through SurfaceFlinger and the GLES version property.
///
/// Returns `None` only when the device cannot be reached. Both sources are merged as is, so
/// `gl_version` and `gl_version_property` may disagree.
pub async fn query_device(
    bridge: &impl DeviceBridge,
    timeouts: &Timeouts,
) -> Option<GlesCapabilities> {
    if !adb::is_available(bridge, timeouts).await {
        error!("adb not available or device not connected");
        return None;
    }

    let device_info = adb::read_device_info(bridge, timeouts).await;

    info!("querying OpenGL ES info via dumpsys");
    let mut caps = match adb::shell_output(
        bridge,
        "dumpsys SurfaceFlinger",
        timeouts.surfaceflinger(),
    )
    .await
    {
        Some(output) => parse_surfaceflinger(&output),
        None => GlesCapabilities::default(),
    };
    caps.device_info = Some(device_info);

    info!("querying OpenGL ES version via getprop");
    caps.gl_version_property = adb::getprop(bridge, GLES_VERSION_PROP, timeouts.property())
        .await
        .and_then(|raw| parse_packed_version(&raw));

    Some(caps)
}

fn parse_packed_version(raw: &str) -> Option<GlesVersion> {
    match raw.trim().parse::<u32>() {
        Ok(value) => Some(GlesVersion::from_packed(value)),
        Err(err) => {
            warn!("invalid {GLES_VERSION_PROP} value {raw:?}: {err}");
            None
        }
    }
}
