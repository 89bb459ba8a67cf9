//! Miscellaneous helper utilities.

use tracing_subscriber::{EnvFilter, fmt};

/// Displayed when the exchange sends an empty price.
pub const NOT_AVAILABLE: &str = "N/A";

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Truncate a decimal price string to two fraction digits.
///
/// No rounding: `"12345.6789"` becomes `"12345.67"`. Inputs without a decimal
/// point or with at most two fraction digits are returned as-is.
pub fn format_price(raw: &str) -> String {
    if raw.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    match raw.find('.') {
        Some(dot) if raw.len() > dot + 3 => raw.get(..dot + 3).unwrap_or(raw).to_string(),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_fraction() {
        assert_eq!(format_price("12345.6789"), "12345.67");
        assert_eq!(format_price("60000.123"), "60000.12");
        assert_eq!(format_price("0.999"), "0.99");
    }

    #[test]
    fn short_inputs_unchanged() {
        assert_eq!(format_price("5"), "5");
        assert_eq!(format_price("1.1"), "1.1");
        assert_eq!(format_price("1.12"), "1.12");
        assert_eq!(format_price("104250"), "104250");
    }

    #[test]
    fn empty_is_not_available() {
        assert_eq!(format_price(""), "N/A");
    }
}
