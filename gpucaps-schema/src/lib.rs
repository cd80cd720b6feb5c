#[cfg(feature = "args")]
pub mod args;


use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::fmt::{self, Display};

/// Basic identity of the Android device the capabilities were read from.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub android_version: Option<String>,
    pub chipset: Option<String>,
}

impl DeviceInfo {
    pub fn is_empty(&self) -> bool {
        self.info_elements().all(|(_, value)| value.is_none())
    }

    pub fn info_elements(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> {
        [
            ("model", self.model.as_deref()),
            ("android_version", self.android_version.as_deref()),
            ("chipset", self.chipset.as_deref()),
        ]
        .into_iter()
    }
}

/// OpenGL ES version decoded from the packed `ro.opengles.version` property.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlesVersion {
    pub major: u16,
    pub minor: u16,
}

impl GlesVersion {
    pub fn from_packed(value: u32) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self {
            major: (value >> 16) as u16,
            minor: (value & 0xFFFF) as u16,
        }
    }

    pub fn packed(self) -> u32 {
        (u32::from(self.major) << 16) | u32::from(self.minor)
    }
}

impl Display for GlesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpenGL ES {}.{}", self.major, self.minor)
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GlesCapabilities {
    pub device_info: Option<DeviceInfo>,
    pub gl_version: Option<String>,
    /// Version reported by the system property, kept separate from `gl_version`.
    pub gl_version_property: Option<GlesVersion>,
    pub gl_vendor: Option<String>,
    pub gl_renderer: Option<String>,
    pub egl_version: Option<String>,
    #[serde(default)]
    pub egl_extensions: Vec<String>,
    #[serde(default)]
    pub gl_extensions: Vec<String>,
}

/// A Vulkan version packed with the standard 7/10/12-bit layout.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    pub fn from_packed(value: u32) -> Self {
        Self {
            major: (value >> 22) & 0x7F,
            minor: (value >> 12) & 0x3FF,
            patch: value & 0xFFF,
        }
    }

    pub fn packed(self) -> u32 {
        (self.major << 22) | (self.minor << 12) | self.patch
    }
}

impl Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionEntry {
    pub name: String,
    pub version: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VulkanProperties {
    pub device_name: String,
    pub device_type: String,
    pub driver_version: u32,
    pub api_version: u32,
    #[serde(rename = "vendorID")]
    pub vendor_id: u32,
    #[serde(rename = "deviceID")]
    pub device_id: u32,
}

impl VulkanProperties {
    pub fn api_version(&self) -> ApiVersion {
        ApiVersion::from_packed(self.api_version)
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VulkanCapabilities {
    pub device_info: Option<DeviceInfo>,
    pub properties: Option<VulkanProperties>,
    #[serde(default)]
    pub instance_extensions: Vec<ExtensionEntry>,
    #[serde(default)]
    pub device_extensions: Vec<ExtensionEntry>,
    #[serde(default)]
    pub features: IndexMap<String, bool>,
    #[serde(default)]
    pub formats: Vec<Value>,
    #[serde(default)]
    pub queue_families: Vec<Value>,
    pub surfaceflinger_gpu_info: Option<String>,
}

impl VulkanCapabilities {
    pub fn feature_partition(&self) -> FeaturePartition<'_> {
        FeaturePartition::new(&self.features)
    }
}

/// Feature names split by whether the device supports them, each half sorted by name.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FeaturePartition<'a> {
    pub enabled: Vec<&'a str>,
    pub disabled: Vec<&'a str>,
}

impl<'a> FeaturePartition<'a> {
    pub fn new(features: &'a IndexMap<String, bool>) -> Self {
        let (mut enabled, mut disabled): (Vec<_>, Vec<_>) = features
            .iter()
            .partition(|(_, supported)| **supported);

        enabled.sort_unstable_by_key(|(name, _)| *name);
        disabled.sort_unstable_by_key(|(name, _)| *name);

        Self {
            enabled: enabled.into_iter().map(|(name, _)| name.as_str()).collect(),
            disabled: disabled.into_iter().map(|(name, _)| name.as_str()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }
}
