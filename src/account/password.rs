use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters that satisfy the symbol rule.
pub const PASSWORD_SYMBOLS: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

/// A violated password rule, reported in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordRule {
    #[error("password must be at least 8 characters long")]
    TooShort,
    #[error("password must contain an uppercase letter")]
    MissingUppercase,
    #[error("password must contain a lowercase letter")]
    MissingLowercase,
    #[error("password must contain a digit")]
    MissingDigit,
    #[error("password must contain a symbol")]
    MissingSymbol,
}

impl PasswordRule {
    pub fn code(self) -> &'static str {
        match self {
            PasswordRule::TooShort => "too_short",
            PasswordRule::MissingUppercase => "missing_uppercase",
            PasswordRule::MissingLowercase => "missing_lowercase",
            PasswordRule::MissingDigit => "missing_digit",
            PasswordRule::MissingSymbol => "missing_symbol",
        }
    }
}

pub fn validate_password(candidate: &str) -> Result<(), PasswordRule> {
    if candidate.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordRule::TooShort);
    }
    if !candidate.chars().any(char::is_uppercase) {
        return Err(PasswordRule::MissingUppercase);
    }
    if !candidate.chars().any(char::is_lowercase) {
        return Err(PasswordRule::MissingLowercase);
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordRule::MissingDigit);
    }
    if !candidate.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(PasswordRule::MissingSymbol);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_password_meeting_every_rule() {
        assert_eq!(validate_password("Abc123!@"), Ok(()));
        assert_eq!(validate_password("Correct-Horse-9"), Ok(()));
    }

    #[test]
    fn reports_first_failing_rule() {
        // no uppercase and no symbol: uppercase is checked first
        assert_eq!(
            validate_password("abc12345"),
            Err(PasswordRule::MissingUppercase)
        );
        assert_eq!(validate_password("Ab1!"), Err(PasswordRule::TooShort));
    }

    #[test]
    fn each_rule_is_reported_on_its_own() {
        assert_eq!(validate_password("Ab1!xyz"), Err(PasswordRule::TooShort));
        assert_eq!(
            validate_password("abcdef1!"),
            Err(PasswordRule::MissingUppercase)
        );
        assert_eq!(
            validate_password("ABCDEF1!"),
            Err(PasswordRule::MissingLowercase)
        );
        assert_eq!(
            validate_password("Abcdefg!"),
            Err(PasswordRule::MissingDigit)
        );
        assert_eq!(
            validate_password("Abcdefg1"),
            Err(PasswordRule::MissingSymbol)
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // four multi-byte letters plus four ascii: 8 chars, more than 8 bytes
        assert_eq!(validate_password("ÄÖüß1!aB"), Ok(()));
        assert_eq!(validate_password("Ä1!aé"), Err(PasswordRule::TooShort));
    }

    #[test]
    fn whitespace_is_not_a_symbol() {
        assert_eq!(
            validate_password("Abcdef1 "),
            Err(PasswordRule::MissingSymbol)
        );
    }

    #[test]
    fn rule_codes_are_stable() {
        assert_eq!(PasswordRule::MissingUppercase.code(), "missing_uppercase");
        assert_eq!(PasswordRule::TooShort.code(), "too_short");
    }
}
