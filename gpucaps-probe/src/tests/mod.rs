
use crate::{
    adb::{self, Adb, CommandOutput, DeviceBridge},
    config::Timeouts,
    gles, read_source, vulkan,
};
use anyhow::anyhow;
use futures::future::{FutureExt, LocalBoxFuture};
use gpucaps_schema::{DeviceInfo, GlesVersion};
use pretty_assertions::assert_eq;
use std::{
    cell::RefCell,
    collections::HashMap,
    path::PathBuf,
    time::{Duration, Instant},
};

const DEVICES_OUTPUT: &str = "List of devices attached\nR5CX12ABCDE\tdevice\n\n";

#[derive(Clone)]
enum Reply {
    Ok(&'static str),
    Failed,
    Timeout,
}

/// Bridge with canned replies per shell command. Unknown commands fail like a missing binary.
struct MockBridge {
    serial: Option<String>,
    devices: Reply,
    replies: HashMap<&'static str, Reply>,
    calls: RefCell<Vec<String>>,
}

impl MockBridge {
    fn new(replies: impl IntoIterator<Item = (&'static str, Reply)>) -> Self {
        Self {
            serial: None,
            devices: Reply::Ok(DEVICES_OUTPUT),
            replies: replies.into_iter().collect(),
            calls: RefCell::default(),
        }
    }

    fn called(&self, command: &str) -> bool {
        self.calls.borrow().iter().any(|call| call == command)
    }

    fn reply(reply: &Reply, timeout: Duration) -> anyhow::Result<CommandOutput> {
        match reply {
            Reply::Ok(stdout) => Ok(CommandOutput {
                success: true,
                stdout: (*stdout).to_owned(),
                stderr: String::new(),
            }),
            Reply::Failed => Ok(CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: "/system/bin/sh: not found".to_owned(),
            }),
            Reply::Timeout => Err(anyhow!("timed out after {}s", timeout.as_secs())),
        }
    }
}

impl DeviceBridge for MockBridge {
    fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn devices(&self, timeout: Duration) -> LocalBoxFuture<'_, anyhow::Result<CommandOutput>> {
        let result = Self::reply(&self.devices, timeout);
        async move { result }.boxed_local()
    }

    fn shell<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
    ) -> LocalBoxFuture<'a, anyhow::Result<CommandOutput>> {
        self.calls.borrow_mut().push(command.to_owned());
        let reply = self.replies.get(command).cloned().unwrap_or(Reply::Failed);
        let result = Self::reply(&reply, timeout);
        async move { result }.boxed_local()
    }
}

fn device_props() -> [(&'static str, Reply); 3] {
    [
        ("getprop ro.product.model", Reply::Ok("SM-S921B\n")),
        ("getprop ro.build.version.release", Reply::Ok("14\n")),
        ("getprop ro.hardware.chipname", Reply::Ok("\n")),
    ]
}

fn expected_device_info() -> DeviceInfo {
    DeviceInfo {
        model: Some("SM-S921B".to_owned()),
        android_version: Some("14".to_owned()),
        chipset: None,
    }
}

fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("src/tests/data")
        .join(name)
}

#[tokio::test]
async fn gles_query_keeps_both_versions() {
    let bridge = MockBridge::new(device_props().into_iter().chain([
        (
            "dumpsys SurfaceFlinger",
            Reply::Ok(include_str!("data/surfaceflinger.txt")),
        ),
        ("getprop ro.opengles.version", Reply::Ok("196609\n")),
    ]));

    let caps = gles::query_device(&bridge, &Timeouts::default())
        .await
        .unwrap();

    assert_eq!(caps.device_info, Some(expected_device_info()));
    assert_eq!(
        caps.gl_version.as_deref(),
        Some("Samsung, Samsung Xclipse 940, OpenGL ES 3.2 ANGLE git hash: 5b2bf0e7e2f5")
    );
    assert_eq!(
        caps.gl_version_property,
        Some(GlesVersion { major: 3, minor: 1 })
    );
    assert_eq!(caps.gl_extensions.len(), 4);
    assert_eq!(caps.egl_extensions.len(), 3);
}

#[tokio::test]
async fn gles_query_survives_dumpsys_timeout() {
    let bridge = MockBridge::new(
        device_props()
            .into_iter()
            .chain([("dumpsys SurfaceFlinger", Reply::Timeout)]),
    );

    let caps = gles::query_device(&bridge, &Timeouts::default())
        .await
        .unwrap();

    assert_eq!(caps.device_info, Some(expected_device_info()));
    assert_eq!(caps.gl_version, None);
    assert_eq!(caps.gl_version_property, None);
    assert!(caps.gl_extensions.is_empty());
    assert!(bridge.called("getprop ro.opengles.version"));
}

#[tokio::test]
async fn no_device_attached() {
    let mut bridge = MockBridge::new(device_props());
    bridge.devices = Reply::Ok("List of devices attached\n\n");

    assert_eq!(gles::query_device(&bridge, &Timeouts::default()).await, None);
    assert_eq!(vulkan::query_device(&bridge, &Timeouts::default()).await, None);
    assert!(bridge.calls.borrow().is_empty());
}

#[tokio::test]
async fn missing_adb() {
    let mut bridge = MockBridge::new(device_props());
    bridge.devices = Reply::Timeout;

    assert!(adb::list_devices(&bridge, &Timeouts::default())
        .await
        .is_empty());
    assert_eq!(gles::query_device(&bridge, &Timeouts::default()).await, None);
}

#[tokio::test]
async fn pinned_serial_must_be_attached() {
    let mut bridge = MockBridge::new(device_props());
    bridge.serial = Some("emulator-5554".to_owned());
    assert!(!adb::is_available(&bridge, &Timeouts::default()).await);

    bridge.serial = Some("R5CX12ABCDE".to_owned());
    assert!(adb::is_available(&bridge, &Timeouts::default()).await);
}

#[tokio::test]
async fn vulkan_query_uses_vulkaninfo() {
    let output = concat!(
        "WARNING: [Loader Message] Code 0 : loader_scanned_icd_add: Could not get 'vkCreateInstance'\n",
        include_str!("data/vulkaninfo.json")
    );
    let bridge = MockBridge::new(device_props().into_iter().chain([
        ("which vulkaninfo", Reply::Ok("/system/bin/vulkaninfo\n")),
        ("vulkaninfo --json", Reply::Ok(output)),
    ]));

    let caps = vulkan::query_device(&bridge, &Timeouts::default())
        .await
        .unwrap();

    assert_eq!(caps.device_info, Some(expected_device_info()));
    assert_eq!(
        caps.properties.unwrap().device_name,
        "Samsung Xclipse 940".to_owned()
    );
    assert_eq!(caps.surfaceflinger_gpu_info, None);
    assert!(!bridge.called("dumpsys SurfaceFlinger"));
}

#[tokio::test]
async fn vulkan_query_falls_back_without_vulkaninfo() {
    let bridge = MockBridge::new(device_props().into_iter().chain([(
        "dumpsys SurfaceFlinger",
        Reply::Ok(include_str!("data/surfaceflinger.txt")),
    )]));

    let caps = vulkan::query_device(&bridge, &Timeouts::default())
        .await
        .unwrap();

    assert!(!bridge.called("vulkaninfo --json"));
    assert_eq!(caps.properties, None);
    assert_eq!(caps.device_info, Some(expected_device_info()));

    let gpu_info = caps.surfaceflinger_gpu_info.unwrap();
    assert!(gpu_info.contains("GLES: Samsung, Samsung Xclipse 940"));
    assert!(gpu_info.contains("Vulkan RenderEngine: disabled"));
    assert!(!gpu_info.contains("Display identification data"));
}

#[tokio::test]
async fn vulkan_query_falls_back_on_timeout() {
    let bridge = MockBridge::new(device_props().into_iter().chain([
        ("which vulkaninfo", Reply::Ok("/system/bin/vulkaninfo\n")),
        ("vulkaninfo --json", Reply::Timeout),
        ("dumpsys SurfaceFlinger", Reply::Ok("GPU frequency: 1095000000\n")),
    ]));

    let caps = vulkan::query_device(&bridge, &Timeouts::default())
        .await
        .unwrap();

    assert_eq!(
        caps.surfaceflinger_gpu_info.as_deref(),
        Some("GPU frequency: 1095000000")
    );
}

#[tokio::test]
async fn vulkan_query_falls_back_on_invalid_output() {
    let bridge = MockBridge::new(device_props().into_iter().chain([
        ("which vulkaninfo", Reply::Ok("/system/bin/vulkaninfo\n")),
        ("vulkaninfo --json", Reply::Ok("ERROR: vkCreateInstance failed\n")),
    ]));

    let caps = vulkan::query_device(&bridge, &Timeouts::default())
        .await
        .unwrap();

    assert!(bridge.called("dumpsys SurfaceFlinger"));
    assert_eq!(caps.properties, None);
    assert_eq!(caps.surfaceflinger_gpu_info, None);
}

#[test]
fn load_log_file() {
    let caps = gles::load_log(&data_path("gles_log.txt")).unwrap();

    assert_eq!(
        caps.gl_version.as_deref(),
        Some("OpenGL ES 3.2 ANGLE git hash: 5b2bf0e7e2f5")
    );
    assert_eq!(caps.gl_vendor.as_deref(), Some("Samsung"));
    assert_eq!(caps.gl_extensions.len(), 5);
    assert_eq!(caps.egl_version.as_deref(), Some("1.5 Android META-EGL"));
    assert_eq!(caps.egl_extensions.len(), 3);
    assert_eq!(caps.device_info, None);
}

#[test]
fn missing_files_yield_no_data() {
    let path = data_path("missing.txt");
    assert_eq!(read_source(&path), None);
    assert_eq!(gles::load_log(&path), None);
    assert_eq!(vulkan::load_json(&path), None);
}

#[test]
fn malformed_json_file_yields_no_data() {
    assert_eq!(vulkan::load_json(&data_path("gles_log.txt")), None);
    assert!(vulkan::load_json(&data_path("vulkaninfo.json")).is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn adb_passes_pinned_serial() {
    let fake = fake_adb::FakeAdb::new(fake_adb::ECHO_ARGS);
    let timeouts = Timeouts::default();

    let adb = Adb::new(&fake.config(), Some("R5CX12ABCDE".to_owned()));
    assert!(adb::is_available(&adb, &timeouts).await);
    assert_eq!(
        adb::getprop(&adb, "ro.product.model", timeouts.property())
            .await
            .as_deref(),
        Some("-s R5CX12ABCDE shell getprop ro.product.model")
    );

    let adb = Adb::new(&fake.config(), None);
    assert_eq!(
        adb::getprop(&adb, "ro.product.model", timeouts.property())
            .await
            .as_deref(),
        Some("shell getprop ro.product.model")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn adb_lists_devices() {
    let timeouts = Timeouts::default();

    let fake = fake_adb::FakeAdb::new(fake_adb::ECHO_ARGS);
    let adb = Adb::new(&fake.config(), None);
    assert_eq!(
        adb::list_devices(&adb, &timeouts).await,
        vec!["R5CX12ABCDE".to_owned()]
    );

    let fake = fake_adb::FakeAdb::new("printf 'List of devices attached\\n\\n'");
    let adb = Adb::new(&fake.config(), None);
    assert!(adb::list_devices(&adb, &timeouts).await.is_empty());
    assert!(!adb::is_available(&adb, &timeouts).await);
}

#[cfg(unix)]
#[tokio::test]
async fn adb_timeout_is_recoverable() {
    let fake = fake_adb::FakeAdb::new("exec sleep 5");
    let mut config = fake.config();
    config.timeouts.property_secs = 1;
    let adb = Adb::new(&config, None);

    let start = Instant::now();
    assert_eq!(
        adb::getprop(&adb, "ro.product.model", config.timeouts.property()).await,
        None
    );
    assert!(start.elapsed() < Duration::from_secs(4));

    let err = adb
        .shell("getprop ro.product.model", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err:#}");
}

#[cfg(unix)]
#[tokio::test]
async fn adb_is_killed_on_timeout() {
    let fake = fake_adb::FakeAdb::new("sleep 1\ntouch \"$(dirname \"$0\")/finished\"");
    let adb = Adb::new(&fake.config(), None);

    assert!(adb
        .shell("dumpsys SurfaceFlinger", Duration::from_millis(200))
        .await
        .is_err());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!fake.marker("finished").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn adb_missing_executable() {
    let config = crate::Config {
        adb_path: data_path("no-such-adb"),
        ..Default::default()
    };
    let adb = Adb::new(&config, None);

    assert!(adb::list_devices(&adb, &config.timeouts).await.is_empty());
    let err = adb
        .shell("getprop ro.product.model", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Could not run"), "{err:#}");
}
