use gpucaps_schema::{DeviceInfo, ExtensionEntry, GlesCapabilities, VulkanCapabilities};
use std::fmt::Display;

const BANNER_WIDTH: usize = 80;

/// A plain text report made of `##` sections. Sections without content are left out.
pub struct Report {
    lines: Vec<String>,
}

impl Report {
    pub fn new(title: &str) -> Self {
        let rule = "=".repeat(BANNER_WIDTH);
        Self {
            lines: vec![rule.clone(), title.to_owned(), rule, String::new()],
        }
    }

    pub fn section(&mut self, heading: impl Display, body: Vec<String>) {
        if body.is_empty() {
            return;
        }
        self.lines.push(format!("## {heading}"));
        self.lines.extend(body);
        self.lines.push(String::new());
    }

    pub fn into_text(self) -> String {
        self.lines.join("\n")
    }
}

pub fn render_gles(caps: &GlesCapabilities) -> String {
    let mut report = Report::new("OPENGL ES CAPABILITY REPORT");

    report.section("Device Information", device_lines(caps.device_info.as_ref()));
    report.section(
        "OpenGL ES Information",
        key_values([
            ("Version", caps.gl_version.clone()),
            (
                "Version (property)",
                caps.gl_version_property.map(|version| version.to_string()),
            ),
            ("Vendor", caps.gl_vendor.clone()),
            ("Renderer", caps.gl_renderer.clone()),
        ]),
    );
    report.section(
        "EGL Information",
        key_values([("Version", caps.egl_version.clone())]),
    );
    report.section(
        format_args!("EGL Extensions ({})", caps.egl_extensions.len()),
        name_lines(&caps.egl_extensions),
    );
    report.section(
        format_args!("OpenGL ES Extensions ({})", caps.gl_extensions.len()),
        name_lines(&caps.gl_extensions),
    );

    report.into_text()
}

pub fn render_vulkan(caps: &VulkanCapabilities) -> String {
    let mut report = Report::new("VULKAN CAPABILITY REPORT");

    report.section("Device Information", device_lines(caps.device_info.as_ref()));

    if let Some(props) = &caps.properties {
        let api_version = props.api_version();
        report.section(
            "Device Properties",
            vec![
                format!("  deviceName: {}", props.device_name),
                format!("  deviceType: {}", props.device_type),
                format!("  driverVersion: 0x{:08x}", props.driver_version),
                format!("  apiVersion: {api_version} (0x{:08x})", props.api_version),
                format!("  vendorID: {}", props.vendor_id),
                format!("  deviceID: {}", props.device_id),
            ],
        );
    }

    report.section(
        format_args!("Instance Extensions ({})", caps.instance_extensions.len()),
        extension_lines(&caps.instance_extensions),
    );
    report.section(
        format_args!("Device Extensions ({})", caps.device_extensions.len()),
        extension_lines(&caps.device_extensions),
    );

    let partition = caps.feature_partition();
    let subsections: Vec<Vec<String>> = [
        ("Enabled", '+', &partition.enabled),
        ("Disabled", '-', &partition.disabled),
    ]
    .into_iter()
    .filter(|(_, _, names)| !names.is_empty())
    .map(|(kind, marker, names)| {
        let mut lines = vec![format!("### {kind} Features ({})", names.len())];
        lines.extend(names.iter().map(|name| format!("  {marker} {name}")));
        lines
    })
    .collect();
    report.section("Device Features", subsections.join(&String::new()));

    if let Some(info) = &caps.surfaceflinger_gpu_info {
        report.section(
            "GPU Info (from dumpsys SurfaceFlinger)",
            info.lines().map(str::to_owned).collect(),
        );
    }

    report.into_text()
}

fn device_lines(info: Option<&DeviceInfo>) -> Vec<String> {
    info.map(|info| {
        info.info_elements()
            .filter_map(|(key, value)| value.map(|value| format!("  {key}: {value}")))
            .collect()
    })
    .unwrap_or_default()
}

fn key_values<const N: usize>(values: [(&str, Option<String>); N]) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| format!("  {key}: {value}")))
        .collect()
}

fn name_lines(names: &[String]) -> Vec<String> {
    let mut names: Vec<&String> = names.iter().collect();
    names.sort_unstable();
    names.into_iter().map(|name| format!("  - {name}")).collect()
}

fn extension_lines(extensions: &[ExtensionEntry]) -> Vec<String> {
    let mut extensions: Vec<&ExtensionEntry> = extensions.iter().collect();
    extensions.sort_by(|a, b| a.name.cmp(&b.name));
    extensions
        .into_iter()
        .map(|ext| format!("  - {} (v{})", ext.name, ext.version))
        .collect()
}
