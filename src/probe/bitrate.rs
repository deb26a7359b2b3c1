//! Bitrate string parsing

/// Parse a human-readable rate ("128k", "1.41M", "64000") into bits/second
///
/// Unit suffixes are case-insensitive and may carry a trailing "bps" or
/// "b/s". Returns `None` for anything else, including zero or negative rates.
pub fn parse_bitrate(text: &str) -> Option<u64> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let unit = unit.trim().to_ascii_lowercase();
    let unit = unit
        .strip_suffix("bps")
        .or_else(|| unit.strip_suffix("b/s"))
        .unwrap_or(&unit);

    let multiplier = match unit {
        "" => 1.0,
        "k" => 1_000.0,
        "m" => 1_000_000.0,
        "g" => 1_000_000_000.0,
        _ => return None,
    };

    let bps = (value * multiplier).round();
    if bps < 1.0 {
        return None;
    }
    Some(bps as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kilo_suffix() {
        assert_eq!(parse_bitrate("128k"), Some(128_000));
        assert_eq!(parse_bitrate("64k\n"), Some(64_000));
        assert_eq!(parse_bitrate("320K"), Some(320_000));
    }

    #[test]
    fn test_mega_suffix() {
        assert_eq!(parse_bitrate("1.41M"), Some(1_410_000));
    }

    #[test]
    fn test_plain_number() {
        assert_eq!(parse_bitrate("64000"), Some(64_000));
    }

    #[test]
    fn test_bps_suffix() {
        assert_eq!(parse_bitrate("128kbps"), Some(128_000));
        assert_eq!(parse_bitrate("128 kb/s"), Some(128_000));
    }

    #[test]
    fn test_garbage() {
        assert_eq!(parse_bitrate(""), None);
        assert_eq!(parse_bitrate("error!"), None);
        assert_eq!(parse_bitrate("sox FAIL formats: can't open input file"), None);
        assert_eq!(parse_bitrate("128x"), None);
        assert_eq!(parse_bitrate("1.2.3k"), None);
    }

    #[test]
    fn test_zero_rejected() {
        assert_eq!(parse_bitrate("0"), None);
        assert_eq!(parse_bitrate("0k"), None);
    }
}
