//! Signup email screening.

use thiserror::Error;

use shopfront_core::Email;

/// Throwaway-mailbox providers refused at signup.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "discard.email",
    "dispostable.com",
    "fakeinbox.com",
    "getnada.com",
    "guerrillamail.com",
    "guerrillamail.net",
    "maildrop.cc",
    "mailinator.com",
    "mailnesia.com",
    "mintemail.com",
    "mohmal.com",
    "sharklasers.com",
    "temp-mail.org",
    "tempmail.com",
    "tempmailo.com",
    "throwawaymail.com",
    "trashmail.com",
    "yopmail.com",
];

/// Why an email address was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailRejection {
    #[error("email address is not valid")]
    Invalid,
    #[error("email domain cannot receive mail")]
    NoMxDomain,
    #[error("disposable email addresses are not allowed")]
    Disposable,
}

/// Screen an address: valid syntax, a dotted domain, not a throwaway provider.
///
/// Subdomains of a disposable provider are refused too.
///
/// # Errors
///
/// Returns the first rule the address breaks.
pub fn screen(raw: &str) -> Result<Email, EmailRejection> {
    let email = Email::parse(raw).map_err(|_| EmailRejection::Invalid)?;
    let domain = email.domain().to_ascii_lowercase();

    let labels_ok = domain
        .split('.')
        .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'));
    if !domain.contains('.') || !labels_ok {
        return Err(EmailRejection::NoMxDomain);
    }

    let disposable = DISPOSABLE_DOMAINS.iter().any(|blocked| {
        domain == *blocked
            || domain
                .strip_suffix(blocked)
                .is_some_and(|prefix| prefix.ends_with('.'))
    });
    if disposable {
        return Err(EmailRejection::Disposable);
    }

    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinary_addresses_pass() {
        assert!(screen("ada@example.com").is_ok());
        assert!(screen("grace.hopper@mail.navy.mil").is_ok());
    }

    #[test]
    fn test_malformed_addresses_are_invalid() {
        assert_eq!(screen("not-an-email"), Err(EmailRejection::Invalid));
        assert_eq!(screen("@example.com"), Err(EmailRejection::Invalid));
    }

    #[test]
    fn test_undotted_domains_are_refused() {
        assert_eq!(screen("root@localhost"), Err(EmailRejection::NoMxDomain));
        assert_eq!(screen("a@example..com"), Err(EmailRejection::NoMxDomain));
    }

    #[test]
    fn test_disposable_domains_are_refused() {
        assert_eq!(screen("x@mailinator.com"), Err(EmailRejection::Disposable));
        assert_eq!(screen("x@YOPMAIL.com"), Err(EmailRejection::Disposable));
        assert_eq!(screen("x@eu.mailinator.com"), Err(EmailRejection::Disposable));
    }

    #[test]
    fn test_lookalike_domains_are_not_disposable() {
        assert!(screen("x@notmailinator.com").is_ok());
    }
}
