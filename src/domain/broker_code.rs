/// Prefix used when none is configured.
pub const DEFAULT_BROKER_CODE_PREFIX: &str = "BCTCR";

/// Format a broker code: `PREFIX-NNNNN`, zero-padded to five digits.
pub fn format_broker_code(prefix: &str, sequence: u32) -> String {
    format!("{}-{:05}", prefix, sequence)
}

/// Extract the numeric suffix from a code carrying the given prefix.
/// Codes with a different prefix or a non-numeric suffix yield `None`.
pub fn parse_broker_code_sequence(prefix: &str, code: &str) -> Option<u32> {
    code.strip_prefix(prefix)?
        .strip_prefix('-')
        .filter(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))?
        .parse()
        .ok()
}

/// Next code in the sequence: highest existing suffix + 1.
pub fn next_broker_code<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let max = existing
        .into_iter()
        .filter_map(|code| parse_broker_code_sequence(prefix, code))
        .max()
        .unwrap_or(0);
    format_broker_code(prefix, max + 1)
}
