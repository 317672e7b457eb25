const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Parses a human readable size such as `"12.3 MB"` into bytes (1024 based).
///
/// Unparseable input yields 0, so the result is never negative.
pub fn parse_file_size(input: &str) -> u64 {
    let s = input.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = match number.parse() {
        Ok(v) => v,
        Err(_) => return 0,
    };

    let unit = unit.trim().to_ascii_uppercase();
    let unit = unit.trim_end_matches("IB").trim_end_matches('B');
    let power = match unit {
        "" => 0,
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        _ => return 0,
    };

    (value * 1024f64.powi(power)).round() as u64
}

/// Formats a byte count the way the backends print sizes, e.g. `"1.5 MB"`.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        return format!("{} {}", bytes, UNITS[0]);
    }

    let rounded = format!("{:.2}", value);
    let rounded = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rounded, UNITS[unit])
}
