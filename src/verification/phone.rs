//! Phone number normalisation and masking.

/// Strip spaces, dashes and parentheses and make sure the number starts
/// with `+`. An empty input stays empty.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();
    if digits.is_empty() || digits.starts_with('+') {
        digits
    } else {
        format!("+{digits}")
    }
}

/// A normalised phone is valid when it carries 10 to 15 digits after `+`.
pub fn is_valid_phone(raw: &str) -> bool {
    let normalized = normalize_phone(raw);
    let Some(rest) = normalized.strip_prefix('+') else {
        return false;
    };
    rest.chars().all(|c| c.is_ascii_digit()) && (10..=15).contains(&rest.len())
}

/// Mask a phone for logs, keeping the first and the last two digits.
pub fn mask_phone(raw: &str) -> String {
    let normalized = normalize_phone(raw);
    let digits: Vec<char> = normalized.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= 3 {
        return "*".repeat(digits.len());
    }
    let last = digits.len() - 2;
    let mut masked = String::with_capacity(digits.len() + 1);
    masked.push('+');
    for (i, d) in digits.iter().enumerate() {
        masked.push(if i == 0 || i >= last { *d } else { '*' });
    }
    masked
}
