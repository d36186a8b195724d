//! Localized notification texts.

use urlencoding::encode;

/// Locale used when the requested one has no translation.
pub const DEFAULT_LOCALE: &str = "en";

/// Build the link embedded in a phone validation SMS.
pub fn phone_confirmation_link(base: &str, code: &str, key: &str, locale: &str) -> String {
    format!(
        "{}?c={}&k={}&l={}",
        base,
        encode(code),
        encode(key),
        encode(locale)
    )
}

/// Build the link embedded in a validation email.
pub fn email_confirmation_link(base: &str, key: &str, locale: &str) -> String {
    format!("{}?k={}&l={}", base, encode(key), encode(locale))
}

/// SMS body carrying the code and the confirmation link.
pub fn sms_confirmation(locale: &str, code: &str, link: &str) -> String {
    match language(locale) {
        "nl" => format!(
            "Uw verificatiecode is {}. U kunt ook deze link openen: {}",
            code, link
        ),
        "fr" => format!(
            "Votre code de vérification est {}. Vous pouvez aussi ouvrir ce lien : {}",
            code, link
        ),
        _ => format!(
            "Your verification code is {}. You can also open this link: {}",
            code, link
        ),
    }
}

/// Email body carrying the confirmation link.
pub fn email_confirmation(locale: &str, link: &str) -> String {
    match language(locale) {
        "nl" => format!(
            "Bevestig uw e-mailadres door deze link te openen:\n\n{}\n\nHeeft u zich niet geregistreerd? Dan kunt u dit bericht negeren.",
            link
        ),
        "fr" => format!(
            "Confirmez votre adresse e-mail en ouvrant ce lien :\n\n{}\n\nSi vous n'avez pas demandé d'inscription, ignorez ce message.",
            link
        ),
        _ => format!(
            "Confirm your email address by opening this link:\n\n{}\n\nIf you did not sign up, you can ignore this message.",
            link
        ),
    }
}

/// Primary language subtag of `locale`, e.g. "nl" for "nl-BE".
fn language(locale: &str) -> &str {
    let lang = locale.split(['-', '_']).next().unwrap_or(DEFAULT_LOCALE);
    if lang.is_empty() {
        DEFAULT_LOCALE
    } else {
        lang
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_link_escapes_key() {
        let link = phone_confirmation_link("https://id.example/phonevalidation", "123456", "a+b/c", "en");
        assert_eq!(
            link,
            "https://id.example/phonevalidation?c=123456&k=a%2Bb%2Fc&l=en"
        );
    }

    #[test]
    fn test_email_link() {
        let link = email_confirmation_link("https://id.example/emailvalidation", "key-1", "nl");
        assert_eq!(link, "https://id.example/emailvalidation?k=key-1&l=nl");
    }

    #[test]
    fn test_sms_text_contains_code_and_link() {
        let text = sms_confirmation("en", "654321", "https://x/y");
        assert!(text.contains("654321"));
        assert!(text.contains("https://x/y"));
    }

    #[test]
    fn test_locale_fallback() {
        assert!(sms_confirmation("nl-BE", "1", "l").starts_with("Uw"));
        assert!(sms_confirmation("", "1", "l").starts_with("Your"));
        assert!(email_confirmation("de", "l").starts_with("Confirm"));
    }
}
