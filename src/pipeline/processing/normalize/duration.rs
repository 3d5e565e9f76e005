use once_cell::sync::Lazy;
use regex::Regex;

static HOURS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*h").unwrap());
static MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*m").unwrap());
static SECONDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*s").unwrap());

fn component(re: &Regex, value: &str) -> Option<f64> {
    re.captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Parse a free-form duration such as `1h 5m`, `45m`, `30s` or `90`.
///
/// Any subset of hour/minute/second parts is summed. Without unit parts the
/// whole string is read as seconds. Empty or unparseable input is `None`.
pub fn parse_duration_seconds(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parts = [(&*HOURS, 3600.0), (&*MINUTES, 60.0), (&*SECONDS, 1.0)];
    let mut matched = false;
    let mut total = 0.0;
    for (re, scale) in parts {
        if let Some(n) = component(re, value) {
            matched = true;
            total += n * scale;
        }
    }

    if !matched {
        total = value.parse::<f64>().ok()?;
    }
    if !total.is_finite() || total < 0.0 {
        return None;
    }
    Some(total.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse_duration_seconds("2h"), Some(7200));
        assert_eq!(parse_duration_seconds("45m"), Some(2700));
        assert_eq!(parse_duration_seconds("30s"), Some(30));
    }

    #[test]
    fn test_raw_seconds() {
        assert_eq!(parse_duration_seconds("90"), Some(90));
        assert_eq!(parse_duration_seconds(" 3600 "), Some(3600));
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(parse_duration_seconds(""), None);
        assert_eq!(parse_duration_seconds("   "), None);
        assert_eq!(parse_duration_seconds("soon"), None);
    }

    #[test]
    fn test_combined_any_order() {
        assert_eq!(parse_duration_seconds("1h 5m"), Some(3900));
        assert_eq!(parse_duration_seconds("10s 1h"), Some(3610));
        assert_eq!(parse_duration_seconds("1h 2m 3s"), Some(3723));
    }
}
