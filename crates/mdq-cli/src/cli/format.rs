//! Human formatting of byte counts, rates and ETAs for terminal output.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Decimal units with one decimal place: `1.5 MB`. Unknown or zero is `-`.
pub fn human_bytes(n: Option<f64>) -> String {
    let mut value = match n {
        Some(v) if v > 0.0 && v.is_finite() => v,
        _ => return "-".to_string(),
    };
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub fn human_rate(bytes_per_sec: Option<f64>) -> String {
    match human_bytes(bytes_per_sec) {
        s if s == "-" => s,
        s => format!("{}/s", s),
    }
}

/// `m:ss` under an hour, `h:mm:ss` otherwise. Unknown or zero is `-`.
pub fn human_eta(seconds: Option<u64>) -> String {
    let secs = match seconds {
        Some(s) if s > 0 => s,
        _ => return "-".to_string(),
    };
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
