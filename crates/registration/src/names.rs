//! Format rules for names, usernames, email addresses and phone numbers.

/// Longest accepted first or last name, in characters.
const MAX_NAME_LEN: usize = 60;

/// Longest accepted username, in characters.
const MAX_USERNAME_LEN: usize = 150;

/// Accepted number of digits in a phone number (E.164).
const PHONE_DIGITS: std::ops::RangeInclusive<usize> = 7..=15;

/// Check a first or last name.
///
/// Letters, digits, spaces, hyphens and apostrophes; 2 to 60 characters with
/// at least one letter.
pub fn validate_name(name: &str) -> bool {
    let len = name.chars().count();
    (2..=MAX_NAME_LEN).contains(&len)
        && name.chars().any(char::is_alphabetic)
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c.is_whitespace() || c == '-' || c == '\'')
}

/// Check a username: lower-case letters, digits, `_` and `-`, starting with a
/// letter or digit.
pub fn validate_username(username: &str) -> bool {
    let mut chars = username.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let len = username.chars().count();
    (2..=MAX_USERNAME_LEN).contains(&len)
        && (first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Check an email address. Expects the address already lower-cased.
pub fn validate_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && local.len() <= 64
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
        && email.chars().all(|c| c.is_ascii_graphic())
}

/// Check a phone number in international format, e.g. `+32 478 12 34 56`.
pub fn validate_phonenumber(phonenumber: &str) -> bool {
    let Some(rest) = phonenumber.strip_prefix('+') else {
        return false;
    };
    if !rest.chars().all(|c| c.is_ascii_digit() || c == ' ') {
        return false;
    }
    let digits = rest.chars().filter(char::is_ascii_digit).count();
    PHONE_DIGITS.contains(&digits)
}

/// Username prefix derived from a name pair: `first_last_`, lower-cased and
/// reduced to ASCII letters and digits. A numeric suffix completes it.
///
/// A name with nothing left after reduction is skipped; when both are,
/// the prefix is `user_`.
pub fn username_base(firstname: &str, lastname: &str) -> String {
    let squash = |s: &str| -> String {
        s.chars()
            .flat_map(char::to_lowercase)
            .filter(char::is_ascii_alphanumeric)
            .collect()
    };
    let parts: Vec<String> = [squash(firstname), squash(lastname)]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return "user_".to_string();
    }
    format!("{}_", parts.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("alice"));
        assert!(validate_name("jean-luc"));
        assert!(validate_name("o'brien"));
        assert!(validate_name("mary ann"));
        assert!(validate_name("zoë"));

        assert!(!validate_name("a"));
        assert!(!validate_name(""));
        assert!(!validate_name("   "));
        assert!(!validate_name("bob!"));
        assert!(!validate_name(&"x".repeat(61)));
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice_smith_1"));
        assert!(validate_username("acme-corp"));

        assert!(!validate_username("Alice"));
        assert!(!validate_username("_alice"));
        assert!(!validate_username("a"));
        assert!(!validate_username("alice smith"));
        assert!(!validate_username(""));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com"));
        assert!(validate_email("a.b+tag@mail.example.org"));

        assert!(!validate_email("alice"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email("alice@example"));
        assert!(!validate_email("alice@@example.com"));
        assert!(!validate_email("alice@.example.com"));
        assert!(!validate_email("alice @example.com"));
    }

    #[test]
    fn test_validate_phonenumber() {
        assert!(validate_phonenumber("+15550001111"));
        assert!(validate_phonenumber("+32 478 12 34 56"));

        assert!(!validate_phonenumber("15550001111"));
        assert!(!validate_phonenumber("+1555"));
        assert!(!validate_phonenumber("+1555000111122223"));
        assert!(!validate_phonenumber("+1-555-000-1111"));
        assert!(!validate_phonenumber("+"));
    }

    #[test]
    fn test_username_base() {
        assert_eq!(username_base("Alice", "Smith"), "alice_smith_");
        assert_eq!(username_base("Mary Ann", "Van Dyke"), "maryann_vandyke_");
    }

    #[test]
    fn test_username_base_from_punctuated_names() {
        assert_eq!(username_base("Zoë", "O'Brien"), "zo_obrien_");
        assert_eq!(username_base("Jean-Luc", "Picard"), "jeanluc_picard_");
        assert_eq!(username_base("Éa", "Smith"), "a_smith_");
        assert_eq!(username_base("李雷", "Smith"), "smith_");
        assert_eq!(username_base("李雷", "韩梅"), "user_");

        for (first, last) in [("O'Brien", "Zoë"), ("Jean-Luc", "D'Arcy"), ("李雷", "韩梅")] {
            let username = format!("{}1", username_base(first, last));
            assert!(validate_username(&username), "{}", username);
        }
    }
}
