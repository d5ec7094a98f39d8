//! Touch device discovery (evdev 0.13.2 compatible)

use evdev::{AbsoluteAxisCode, Device, EventType};

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

/// Devices that report multitouch slots with a horizontal position.
pub fn discover_touch_devices() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = std::fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            if p.file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("event"))
            {
                if let Ok(dev) = Device::open(&p) {
                    if is_touch_surface(&dev) {
                        out.push(DeviceInfo {
                            path: p.display().to_string(),
                            name: dev.name().unwrap_or("unknown").to_string(),
                        });
                    }
                }
            }
        }
    }
    out
}

fn is_touch_surface(dev: &Device) -> bool {
    let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
    let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_TRACKING_ID)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
    });
    has_abs && has_mt
}

/// Reported min/max of the device's horizontal multitouch axis.
pub fn x_range(dev: &Device) -> Option<(i32, i32)> {
    dev.get_absinfo()
        .ok()?
        .find(|(code, _)| *code == AbsoluteAxisCode::ABS_MT_POSITION_X)
        .map(|(_, info)| (info.minimum(), info.maximum()))
}
