use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision issues.
/// R$ 50,00 = 5000 cents.
pub type Cents = i64;

/// Percentages are hundredths of a percent: 500 = 5.00%, 250 = 2.50%.
pub type BasisPoints = i64;

/// Format cents as a plain decimal string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Format basis points as a percentage.
/// Example: 500 -> "5.00%", 1250 -> "12.50%"
pub fn format_percentage(bps: BasisPoints) -> String {
    format!("{}%", format_cents(bps))
}

/// Parse a decimal string into hundredths.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) if !decimals.contains('.') => (units, decimals),
        Some(_) => return Err(ParseCentsError::InvalidFormat),
        None => (input, ""),
    };

    if (units_str.is_empty() && decimal_str.is_empty())
        || !decimal_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // Pad or truncate to exactly two digits
    let decimals: String = decimal_str.chars().chain("00".chars()).take(2).collect();
    let decimal_cents: i64 = decimals
        .parse()
        .map_err(|_| ParseCentsError::InvalidFormat)?;

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::Overflow)?;
    Ok(if negative { -cents } else { cents })
}

/// Parse a percentage such as "5", "2.5" or "2.5%" into basis points.
pub fn parse_percentage(input: &str) -> Result<BasisPoints, ParseCentsError> {
    parse_cents(input.trim().trim_end_matches('%'))
}

/// Convert a JSON currency amount (e.g. `1000.5`) into cents, rounding to the nearest cent.
pub fn cents_from_units(units: f64) -> Result<Cents, ParseCentsError> {
    hundredths_from_f64(units)
}

/// Convert a JSON percentage (e.g. `2.5`) into basis points.
pub fn bps_from_percentage(percentage: f64) -> Result<BasisPoints, ParseCentsError> {
    hundredths_from_f64(percentage)
}

fn hundredths_from_f64(value: f64) -> Result<i64, ParseCentsError> {
    if !value.is_finite() {
        return Err(ParseCentsError::InvalidFormat);
    }
    let scaled = (value * 100.0).round();
    if scaled.abs() >= i64::MAX as f64 {
        return Err(ParseCentsError::Overflow);
    }
    Ok(scaled as i64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Overflow => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
