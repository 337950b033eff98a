//! Formatting helpers for reports and collector messages.
//!
//! Pure functions, no terminal styling. [`format_metric`] picks a unit from
//! the metric key suffix so report renderers don't need per-collector tables.

use crate::collector::UNAVAILABLE;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Format byte count as human-readable size: `"1.5 GiB"`, `"512 B"`.
pub fn format_bytes(bytes: f64) -> String {
    if bytes >= GIB {
        format!("{:.1} GiB", bytes / GIB)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes / KIB)
    } else {
        format!("{:.0} B", bytes.max(0.0))
    }
}

/// Format duration in seconds: `"3m 5s"`, `"2h 10m"`, `"4d 3h"`; `"0s"` for `<= 0`.
pub fn format_duration(secs: i64) -> String {
    if secs <= 0 {
        return "0s".to_string();
    }
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Format bytes-per-second rate: `"1.5 MiB/s"`; `"0"` below one byte.
pub fn format_bytes_rate(rate: f64) -> String {
    if rate < 1.0 {
        return "0".to_string();
    }
    if rate >= GIB {
        format!("{:.1} GiB/s", rate / GIB)
    } else if rate >= MIB {
        format!("{:.1} MiB/s", rate / MIB)
    } else if rate >= KIB {
        format!("{:.1} KiB/s", rate / KIB)
    } else {
        format!("{:.0} B/s", rate)
    }
}

/// Format ops-per-second rate: `"{:.0}/s"` for >= 10, `"{:.2}/s"` below.
pub fn format_rate(rate: f64) -> String {
    if rate < 0.005 {
        return "0/s".to_string();
    }
    if rate >= 1_000_000.0 {
        format!("{:.1}M/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}K/s", rate / 1_000.0)
    } else if rate >= 10.0 {
        format!("{:.0}/s", rate)
    } else {
        format!("{:.2}/s", rate)
    }
}

/// Format one collector metric for display. The sentinel renders as `"N/A"`.
pub fn format_metric(key: &str, value: f64) -> String {
    if value == UNAVAILABLE || !value.is_finite() {
        return "N/A".to_string();
    }
    if key == "hit_rate" {
        return format!("{:.2}%", value * 100.0);
    }
    if key == "innodb_buffer_pool_size" {
        return format!("{:.0} MiB", value);
    }
    if key.ends_with("_gb") {
        return format!("{:.2} GiB", value);
    }
    if key.ends_with("_pct") {
        return format!("{:.1}%", value);
    }
    if key.starts_with("bytes_") && key.ends_with("_per_s") {
        return format_bytes_rate(value);
    }
    if key.ends_with("_per_s") || key.ends_with("qps") || key == "tps" {
        return format_rate(value);
    }
    if key.ends_with("_bytes") {
        return format_bytes(value);
    }
    if key.ends_with("_s") || key.ends_with("_secs") {
        return format_duration(value as i64);
    }
    format_number(value)
}

/// Integers without a fraction, everything else with two decimals.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_and_durations() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(1536.0), "1.5 KiB");
        assert_eq!(format_bytes(10.0 * GIB), "10.0 GiB");
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(185), "3m 5s");
        assert_eq!(format_duration(90_000), "1d 1h");
    }

    #[test]
    fn rates() {
        assert_eq!(format_rate(50.0), "50/s");
        assert_eq!(format_rate(0.2), "0.20/s");
        assert_eq!(format_rate(0.0), "0/s");
        assert_eq!(format_rate(2_500.0), "2.5K/s");
        assert_eq!(format_bytes_rate(2048.0), "2.0 KiB/s");
    }

    #[test]
    fn metric_formatting_by_key() {
        assert_eq!(format_metric("qps", 50.0), "50/s");
        assert_eq!(format_metric("slow_qps", 1.2), "1.20/s");
        assert_eq!(format_metric("hit_rate", 0.95), "95.00%");
        assert_eq!(format_metric("bytes_sent_per_s", 1024.0), "1.0 KiB/s");
        assert_eq!(format_metric("uptime_s", 3_700.0), "1h 1m");
        assert_eq!(format_metric("Threads_connected", 12.0), "12");
        assert_eq!(format_metric("innodb_buffer_pool_size", 128.0), "128 MiB");
        assert_eq!(format_metric("total_size_gb", 0.5), "0.50 GiB");
        assert_eq!(format_metric("hit_rate", UNAVAILABLE), "N/A");
        assert_eq!(format_metric("qps", UNAVAILABLE), "N/A");
    }
}
