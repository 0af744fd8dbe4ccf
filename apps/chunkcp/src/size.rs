//! Human-readable byte sizes and durations (powers of 1024).

use std::time::Duration;

/// Single-letter symbols, also used for formatting.
const CUSTOMARY: [&str; 9] = ["B", "K", "M", "G", "T", "P", "E", "Z", "Y"];
const CUSTOMARY_EXT: [&str; 9] = [
    "byte", "kilo", "mega", "giga", "tera", "peta", "exa", "zetta", "iotta",
];
const IEC: [&str; 9] = ["Bi", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi", "Yi"];
const IEC_EXT: [&str; 9] = [
    "byte", "kibi", "mebi", "gibi", "tebi", "pebi", "exbi", "zebi", "yobi",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SizeError {
    #[error("can't interpret '{0}'")]
    Unrecognised(String),

    #[error("size '{0}' does not fit in 64 bits")]
    TooLarge(String),
}

/// Parses `"500M"`, `"1 Gi"`, `"0.5kilo"` or a bare byte count.
///
/// Fractional results truncate toward zero.
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let unrecognised = || SizeError::Unrecognised(input.to_string());
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let number: f64 = number.parse().map_err(|_| unrecognised())?;
    let unit = match unit.trim() {
        "k" => "K",
        other => other,
    };

    let power = if unit.is_empty() {
        0
    } else {
        [CUSTOMARY, CUSTOMARY_EXT, IEC, IEC_EXT]
            .iter()
            .find_map(|set| set.iter().position(|s| *s == unit))
            .ok_or_else(unrecognised)?
    };

    let bytes = number * 1024f64.powi(power as i32);
    if bytes >= u64::MAX as f64 {
        return Err(SizeError::TooLarge(input.to_string()));
    }
    Ok(bytes as u64)
}

/// Formats `bytes` with one decimal and the largest fitting symbol, e.g. `"9.8 K"`.
pub fn format_size(bytes: u64) -> String {
    for (power, symbol) in CUSTOMARY.iter().enumerate().skip(1).rev() {
        let prefix = 1u128 << (power * 10);
        if u128::from(bytes) >= prefix {
            return format!("{:.1} {symbol}", bytes as f64 / prefix as f64);
        }
    }
    format!("{:.1} B", bytes as f64)
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, secs % 3600 / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Bytes per second over `elapsed`, formatted as `"12.3 M/s"`.
pub fn format_rate(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "-".to_string();
    }
    format!("{}/s", format_size((bytes as f64 / secs) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_customary() {
        assert_eq!(parse_size("0 B"), Ok(0));
        assert_eq!(parse_size("1 K"), Ok(1024));
        assert_eq!(parse_size("1 k"), Ok(1024));
        assert_eq!(parse_size("500M"), Ok(524_288_000));
        assert_eq!(parse_size("1 M"), Ok(1_048_576));
        assert_eq!(parse_size("1 E"), Ok(1_152_921_504_606_846_976));
    }

    #[test]
    fn parse_long_and_iec_names() {
        assert_eq!(parse_size("0.5kilo"), Ok(512));
        assert_eq!(parse_size("1 Gi"), Ok(1_073_741_824));
        assert_eq!(parse_size("2 mebi"), Ok(2_097_152));
        assert_eq!(parse_size("3 byte"), Ok(3));
    }

    #[test]
    fn parse_bare_and_fractional() {
        assert_eq!(parse_size("3000000"), Ok(3_000_000));
        assert_eq!(parse_size(" 42 "), Ok(42));
        assert_eq!(parse_size("1.5K"), Ok(1536));
        assert_eq!(parse_size("0.1K"), Ok(102));
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(
            parse_size("12 foo"),
            Err(SizeError::Unrecognised("12 foo".into()))
        );
        assert_eq!(
            parse_size("12 foo").unwrap_err().to_string(),
            "can't interpret '12 foo'"
        );
        assert!(parse_size("M").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("-5M").is_err());
        assert!(parse_size("1 m").is_err());
    }

    #[test]
    fn parse_overflow() {
        assert!(matches!(parse_size("1 Y"), Err(SizeError::TooLarge(_))));
    }

    #[test]
    fn format_sizes() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(1), "1.0 B");
        assert_eq!(format_size(1023), "1023.0 B");
        assert_eq!(format_size(1024), "1.0 K");
        assert_eq!(format_size(10_000), "9.8 K");
        assert_eq!(format_size(1_048_576), "1.0 M");
        assert_eq!(format_size(524_288_000), "500.0 M");
        assert_eq!(format_size(u64::MAX), "16.0 E");
    }

    #[test]
    fn format_durations() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }

    #[test]
    fn format_rates() {
        assert_eq!(format_rate(2_097_152, Duration::from_secs(2)), "1.0 M/s");
        assert_eq!(format_rate(10, Duration::ZERO), "-");
    }
}
