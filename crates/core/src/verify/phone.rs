/// Normalizes a Dutch phone number to E.164.
///
/// Strips everything except digits and `+`, rewrites a leading `00` to `+`,
/// and prefixes `+31` for national numbers (replacing a leading `0` when one
/// is present). The country code is deliberately fixed: the business only
/// serves Dutch numbers and upstream records are entered accordingly.
pub fn to_e164(raw: &str) -> String {
    let mut digits: String =
        raw.chars().filter(|ch| ch.is_ascii_digit() || *ch == '+').collect();

    if let Some(rest) = digits.strip_prefix("00") {
        digits = format!("+{rest}");
    }
    if !digits.starts_with('+') {
        digits = match digits.strip_prefix('0') {
            Some(national) => format!("+31{national}"),
            None => format!("+31{digits}"),
        };
    }

    digits
}

#[cfg(test)]
mod tests {
    use super::to_e164;

    #[test]
    fn national_numbers_get_the_country_code() {
        assert_eq!(to_e164("0612345678"), "+31612345678");
    }

    #[test]
    fn double_zero_prefix_becomes_plus() {
        assert_eq!(to_e164("0031612345678"), "+31612345678");
    }

    #[test]
    fn already_formatted_numbers_pass_through() {
        assert_eq!(to_e164("+31612345678"), "+31612345678");
    }

    #[test]
    fn punctuation_and_spacing_are_stripped() {
        assert_eq!(to_e164("06 12 34 56 78"), "+31612345678");
        assert_eq!(to_e164("06-1234-5678"), "+31612345678");
    }

    #[test]
    fn bare_subscriber_numbers_are_prefixed_directly() {
        assert_eq!(to_e164("612345678"), "+31612345678");
    }
}
