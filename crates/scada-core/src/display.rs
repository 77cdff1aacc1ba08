//! Display helpers for view collaborators.

/// Format an uptime in seconds as `"{h}h {m}m"`.
pub fn format_uptime(uptime_sec: u64) -> String {
    let hours = uptime_sec / 3600;
    let minutes = (uptime_sec % 3600) / 60;
    format!("{hours}h {minutes}m")
}

/// Single-letter icon for a sensor type.
pub fn sensor_icon(sensor_type: &str) -> char {
    match sensor_type {
        "temperature" => 'T',
        "pressure" => 'P',
        "vibration" => 'V',
        "flow" => 'F',
        "current" => 'A',
        _ => '?',
    }
}
