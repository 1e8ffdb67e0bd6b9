/// Country prefix every stored number is normalized to.
pub const COUNTRY_PREFIX: &str = "+234";

const SUBSCRIBER_DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Nigerian phone number '{0}'; expected 0XXXXXXXXXX, 234XXXXXXXXXX, or +234XXXXXXXXXX")]
pub struct InvalidPhoneNumber(pub String);

/// Normalize a Nigerian mobile number to `+234` followed by ten subscriber digits.
///
/// Spaces and dashes are ignored. The subscriber part must start with 7, 8, or 9.
pub fn normalize_phone(raw: &str) -> Result<String, InvalidPhoneNumber> {
    let compact: String = raw
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '-')
        .collect();

    let subscriber = compact
        .strip_prefix(COUNTRY_PREFIX)
        .or_else(|| compact.strip_prefix("234"))
        .or_else(|| compact.strip_prefix('0'))
        .filter(|rest| is_subscriber_number(rest))
        .ok_or_else(|| InvalidPhoneNumber(raw.trim().to_string()))?;

    Ok(format!("{COUNTRY_PREFIX}{subscriber}"))
}

/// True when both numbers normalize to the same canonical form. A stored number that no longer
/// normalizes only matches itself verbatim.
pub fn same_number(stored: &str, canonical: &str) -> bool {
    match normalize_phone(stored) {
        Ok(normalized) => normalized == canonical,
        Err(_) => stored.trim() == canonical,
    }
}

fn is_subscriber_number(digits: &str) -> bool {
    digits.len() == SUBSCRIBER_DIGITS
        && digits.bytes().all(|byte| byte.is_ascii_digit())
        && matches!(digits.as_bytes().first(), Some(b'7' | b'8' | b'9'))
}
