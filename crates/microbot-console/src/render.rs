use microbot_device::Device;

/// 单行设备摘要
pub fn device_line(device: &Device) -> String {
    let mut line = format!("{:<12} {:<20}", device.id.to_string(), device.name);

    if let Some(status) = device.status() {
        line.push_str(&format!(" status={}", status.as_str()));
    }
    if let Some(calibration) = &device.calibration {
        line.push_str(&format!(" calibration={}", calibration));
    }
    if let Some(battery) = device.battery() {
        line.push_str(&format!(" battery={}", battery));
    }
    if let Some(version) = device.firmware_version() {
        line.push_str(&format!(" fw={}", version));
    }
    if let Some(seen) = device.last_seen() {
        line.push_str(&format!(" seen={}", seen.format("%Y-%m-%d %H:%M:%S")));
    }
    if let Some(error) = device.error() {
        line.push_str(&format!(" error={:?}", error));
    }

    line.trim_end().to_string()
}
