use crate::{
    adb::{self, DeviceBridge},
    config::Timeouts,
};
use anyhow::Context;
use gpucaps_schema::{ApiVersion, ExtensionEntry, VulkanCapabilities, VulkanProperties};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use std::{iter, path::Path};
use tracing::{error, info, warn};

const GPU_INFO_KEYWORDS: [&str; 3] = ["gl", "vulkan", "gpu"];

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawExtension {
    extension_name: Option<String>,
    spec_version: Option<RawInteger>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawProperties {
    device_name: Option<String>,
    device_type: Option<Value>,
    driver_version: Option<RawVersion>,
    api_version: Option<RawVersion>,
    #[serde(rename = "vendorID")]
    vendor_id: Option<RawInteger>,
    #[serde(rename = "deviceID")]
    device_id: Option<RawInteger>,
}

/// Integers that some exports quote as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawInteger {
    Number(u32),
    Text(String),
}

impl RawInteger {
    fn value(self) -> u32 {
        match self {
            RawInteger::Number(value) => value,
            RawInteger::Text(text) => text.trim().parse().unwrap_or_else(|_| {
                warn!("invalid integer {text:?}");
                0
            }),
        }
    }
}

/// Versions are either packed integers or dotted strings depending on the vulkaninfo release.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Packed(u32),
    Dotted(String),
}

impl RawVersion {
    fn packed(self) -> u32 {
        match self {
            RawVersion::Packed(value) => value,
            RawVersion::Dotted(text) => parse_dotted_version(&text).unwrap_or_else(|| {
                warn!("invalid version string {text:?}");
                0
            }),
        }
    }
}

fn parse_dotted_version(text: &str) -> Option<u32> {
    let mut parts = text.trim().split('.').map(|part| part.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next().unwrap_or(Some(0))?;
    let patch = parts.next().unwrap_or(Some(0))?;

    if parts.next().is_some() || major > 0x7F || minor > 0x3FF || patch > 0xFFF {
        return None;
    }

    Some(
        ApiVersion {
            major,
            minor,
            patch,
        }
        .packed(),
    )
}

/// Parses vulkaninfo JSON output into a capabilities record.
///
/// Only the first physical device is used. Missing fields take their default values, and a
/// section with an unexpected shape is dropped with a warning instead of failing the document.
pub fn parse_vulkaninfo(json: &str) -> anyhow::Result<VulkanCapabilities> {
    let document: Value = serde_json::from_str(json).context("Could not parse vulkaninfo JSON")?;
    Ok(normalize(&document))
}

/// Loads a vulkaninfo JSON export. Unreadable files and malformed JSON both yield `None`.
pub fn load_json(path: &Path) -> Option<VulkanCapabilities> {
    let json = crate::read_source(path)?;
    match parse_vulkaninfo(&json) {
        Ok(caps) => Some(caps),
        Err(err) => {
            error!("{err:#}");
            None
        }
    }
}

fn normalize(document: &Value) -> VulkanCapabilities {
    let mut caps = VulkanCapabilities {
        instance_extensions: normalize_extensions(
            "VkInstance.extensions",
            document.pointer("/VkInstance/extensions"),
        ),
        ..Default::default()
    };

    match list_items("physicalDevices", document.get("physicalDevices")).first() {
        Some(device) if device.is_object() => normalize_device(device, &mut caps),
        Some(_) => warn!("ignoring first physical device, expected an object"),
        None => (),
    }

    caps
}

fn normalize_device(device: &Value, caps: &mut VulkanCapabilities) {
    caps.device_extensions = normalize_extensions("extensions", device.get("extensions"));
    let properties: RawProperties = section("properties", device.get("properties"));
    caps.properties = Some(normalize_properties(properties));

    match device.get("features") {
        Some(Value::Object(features)) => flatten_features(features, &mut caps.features),
        None | Some(Value::Null) => (),
        Some(_) => warn!("ignoring `features`, expected an object"),
    }

    caps.formats = list_items("formats", device.get("formats")).to_vec();
    caps.queue_families = list_items("queueFamilies", device.get("queueFamilies")).to_vec();
}

/// Deserializes an optional section, falling back to its default when the shape is unexpected.
fn section<T: DeserializeOwned + Default>(key: &str, value: Option<&Value>) -> T {
    match value {
        None | Some(Value::Null) => T::default(),
        Some(value) => T::deserialize(value).unwrap_or_else(|err| {
            warn!("ignoring `{key}`: {err}");
            T::default()
        }),
    }
}

fn normalize_extensions(key: &str, value: Option<&Value>) -> Vec<ExtensionEntry> {
    list_items(key, value)
        .iter()
        .filter_map(|entry| match RawExtension::deserialize(entry) {
            Ok(ext) => Some(ExtensionEntry {
                name: ext.extension_name.unwrap_or_default(),
                version: ext.spec_version.map_or(0, RawInteger::value),
            }),
            Err(err) => {
                warn!("ignoring entry in `{key}`: {err}");
                None
            }
        })
        .collect()
}

fn normalize_properties(raw: RawProperties) -> VulkanProperties {
    VulkanProperties {
        device_name: raw.device_name.unwrap_or_default(),
        device_type: raw.device_type.map(device_type_name).unwrap_or_default(),
        driver_version: raw.driver_version.map_or(0, RawVersion::packed),
        api_version: raw.api_version.map_or(0, RawVersion::packed),
        vendor_id: raw.vendor_id.map_or(0, RawInteger::value),
        device_id: raw.device_id.map_or(0, RawInteger::value),
    }
}

fn device_type_name(value: Value) -> String {
    match value {
        Value::String(name) => name,
        Value::Number(number) => {
            let name = match number.as_u64() {
                Some(0) => "VK_PHYSICAL_DEVICE_TYPE_OTHER",
                Some(1) => "VK_PHYSICAL_DEVICE_TYPE_INTEGRATED_GPU",
                Some(2) => "VK_PHYSICAL_DEVICE_TYPE_DISCRETE_GPU",
                Some(3) => "VK_PHYSICAL_DEVICE_TYPE_VIRTUAL_GPU",
                Some(4) => "VK_PHYSICAL_DEVICE_TYPE_CPU",
                _ => return number.to_string(),
            };
            name.to_owned()
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Flattens nested feature structs into one map of feature name to support flag.
/// The first occurrence of a name is kept.
fn flatten_features(raw: &Map<String, Value>, features: &mut IndexMap<String, bool>) {
    for (name, value) in raw {
        match value {
            Value::Object(members) => flatten_features(members, features),
            value => {
                if !features.contains_key(name) {
                    features.insert(name.clone(), is_truthy(value));
                }
            }
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(members) => !members.is_empty(),
    }
}

fn list_items<'a>(key: &str, value: Option<&'a Value>) -> &'a [Value] {
    match value {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("ignoring `{key}`, expected a list");
            &[]
        }
    }
}

/// Queries a connected device, preferring vulkaninfo and falling back to a SurfaceFlinger dump.
pub async fn query_device(
    bridge: &impl DeviceBridge,
    timeouts: &Timeouts,
) -> Option<VulkanCapabilities> {
    if !adb::is_available(bridge, timeouts).await {
        error!("adb not available or device not connected");
        return None;
    }

    let device_info = adb::read_device_info(bridge, timeouts).await;

    let mut caps = match run_vulkaninfo(bridge, timeouts).await {
        Some(caps) => caps,
        None => {
            info!("using fallback method (dumpsys)");
            query_surfaceflinger(bridge, timeouts).await
        }
    };
    caps.device_info = Some(device_info);

    Some(caps)
}

async fn run_vulkaninfo(
    bridge: &impl DeviceBridge,
    timeouts: &Timeouts,
) -> Option<VulkanCapabilities> {
    info!("checking if vulkaninfo is available on device");
    match bridge.shell("which vulkaninfo", timeouts.probe_lookup()).await {
        Ok(output) if output.success => (),
        Ok(_) => {
            info!("vulkaninfo not found on device");
            return None;
        }
        Err(err) => {
            warn!("could not look up vulkaninfo: {err:#}");
            return None;
        }
    }

    info!("running vulkaninfo --json");
    let output = adb::shell_output(bridge, "vulkaninfo --json", timeouts.vulkaninfo()).await?;

    match parse_vulkaninfo(strip_preamble(&output)) {
        Ok(caps) => Some(caps),
        Err(err) => {
            warn!("{err:#}");
            None
        }
    }
}

/// Drops loader warnings printed before the document, which starts on its own line.
fn strip_preamble(output: &str) -> &str {
    iter::once(0)
        .chain(output.match_indices('\n').map(|(index, _)| index + 1))
        .find(|&start| output[start..].starts_with('{'))
        .map_or(output, |start| &output[start..])
}

async fn query_surfaceflinger(
    bridge: &impl DeviceBridge,
    timeouts: &Timeouts,
) -> VulkanCapabilities {
    info!("gathering GPU info via dumpsys");
    let surfaceflinger_gpu_info =
        adb::shell_output(bridge, "dumpsys SurfaceFlinger", timeouts.fallback_dump())
            .await
            .and_then(|output| filter_gpu_lines(&output));

    VulkanCapabilities {
        surfaceflinger_gpu_info,
        ..Default::default()
    }
}

fn filter_gpu_lines(dump: &str) -> Option<String> {
    let lines: Vec<&str> = dump
        .lines()
        .filter(|line| {
            let line = line.to_lowercase();
            GPU_INFO_KEYWORDS
                .iter()
                .any(|keyword| line.contains(keyword))
        })
        .collect();

    let info = lines.join("\n");
    let info = info.trim();
    (!info.is_empty()).then(|| info.to_owned())
}
