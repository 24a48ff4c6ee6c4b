use hostname::get;

/// Fallback used when the host name cannot be read.
pub const UNKNOWN_DEVICE: &str = "unknown-device";

/// # Device Id
///
/// Identifies the terminal in outbound order events. Uses the machine's host
/// name, which is stable across restarts of the same device.
pub fn device_id() -> String {
    match get() {
        Ok(name) => {
            let name = name.to_string_lossy().trim().to_string();
            if name.is_empty() {
                UNKNOWN_DEVICE.to_string()
            } else {
                name
            }
        }
        Err(e) => {
            log::warn!("Could not read host name for device id: {}", e);
            UNKNOWN_DEVICE.to_string()
        }
    }
}
