//! Request shield: bot detection, signup rate limiting, and email screening.
//!
//! [`Shield::protect_request`] runs on every request from the shield
//! middleware. [`Shield::protect_signup`] runs in the registration handlers
//! before an account is created. In [`ShieldMode::DryRun`] denials are
//! logged and the request is let through, which is how new rules are
//! trialled in production.

mod bots;
mod email;

pub use bots::{BotVerdict, classify as classify_user_agent};
pub use email::{EmailRejection, screen as screen_email};

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use axum::http::Method;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use thiserror::Error;

use shopfront_core::Email;

/// Signups allowed per IP inside one window.
const SIGNUP_BURST: NonZeroU32 = match NonZeroU32::new(5) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

/// One signup cell is replenished this often (5 per 10 minutes).
const SIGNUP_REPLENISH: Duration = Duration::from_secs(120);

/// Whether denials are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShieldMode {
    #[default]
    Live,
    DryRun,
}

impl FromStr for ShieldMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "dry_run" | "dry-run" | "dryrun" => Ok(Self::DryRun),
            other => Err(format!("expected 'live' or 'dry_run', got '{other}'")),
        }
    }
}

impl std::fmt::Display for ShieldMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::DryRun => "dry_run",
        })
    }
}

/// Why the shield refused a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShieldDenial {
    #[error("automated traffic is not allowed")]
    Bot(&'static str),
    #[error("too many signups from this address, try again later")]
    RateLimited,
    #[error(transparent)]
    Email(#[from] EmailRejection),
}

impl ShieldDenial {
    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bot(_) => "bot",
            Self::RateLimited => "rate_limit",
            Self::Email(_) => "email",
        }
    }
}

/// The request shield. One instance lives in application state.
pub struct Shield {
    mode: ShieldMode,
    signups: DefaultKeyedRateLimiter<IpAddr>,
}

impl std::fmt::Debug for Shield {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shield")
            .field("mode", &self.mode)
            .field("tracked_ips", &self.signups.len())
            .finish()
    }
}

impl Shield {
    #[must_use]
    pub fn new(mode: ShieldMode) -> Self {
        let quota = Quota::with_period(SIGNUP_REPLENISH)
            .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
            .allow_burst(SIGNUP_BURST);
        Self {
            mode,
            signups: RateLimiter::keyed(quota),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ShieldMode {
        self.mode
    }

    /// Bot check for an ordinary request.
    ///
    /// Search engines may read pages (`GET`/`HEAD`) but not submit anything.
    ///
    /// # Errors
    ///
    /// Returns `ShieldDenial::Bot` for automated clients (live mode only).
    pub fn protect_request(
        &self,
        ip: Option<IpAddr>,
        user_agent: Option<&str>,
        method: &Method,
    ) -> Result<(), ShieldDenial> {
        let outcome = match classify_user_agent(user_agent) {
            BotVerdict::Human => Ok(()),
            BotVerdict::SearchEngine(_) if *method == Method::GET || *method == Method::HEAD => Ok(()),
            BotVerdict::SearchEngine(name) | BotVerdict::Automated(name) => {
                Err(ShieldDenial::Bot(name))
            }
        };
        self.enforce(outcome, ip)
    }

    /// Checks for account creation: bots, signup rate per IP, then the email.
    ///
    /// Returns the normalized email on success.
    ///
    /// # Errors
    ///
    /// Returns the first `ShieldDenial` that applies (live mode only). In dry
    /// run an unparseable email still fails with `ShieldDenial::Email`, since
    /// no account can be created for it anyway.
    pub fn protect_signup(
        &self,
        ip: Option<IpAddr>,
        user_agent: Option<&str>,
        email: &str,
    ) -> Result<Email, ShieldDenial> {
        let bot = match classify_user_agent(user_agent) {
            BotVerdict::Human => Ok(()),
            BotVerdict::SearchEngine(name) | BotVerdict::Automated(name) => {
                Err(ShieldDenial::Bot(name))
            }
        };
        self.enforce(bot, ip)?;

        let key = ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let rate = self
            .signups
            .check_key(&key)
            .map_err(|_| ShieldDenial::RateLimited);
        self.enforce(rate, ip)?;

        match screen_email(email) {
            Ok(parsed) => Ok(parsed),
            Err(EmailRejection::Invalid) => Err(ShieldDenial::Email(EmailRejection::Invalid)),
            Err(rejection) => {
                self.enforce(Err(rejection.into()), ip)?;
                Email::parse(email).map_err(|_| ShieldDenial::Email(EmailRejection::Invalid))
            }
        }
    }

    /// Forget rate-limit state for IPs that have fully replenished.
    pub fn retain_recent(&self) {
        self.signups.retain_recent();
        self.signups.shrink_to_fit();
    }

    fn enforce(&self, outcome: Result<(), ShieldDenial>, ip: Option<IpAddr>) -> Result<(), ShieldDenial> {
        let Err(denial) = outcome else {
            return Ok(());
        };
        let ip = ip.map(|ip| ip.to_string()).unwrap_or_default();
        match self.mode {
            ShieldMode::Live => {
                tracing::warn!(kind = denial.kind(), reason = %denial, ip = %ip, "Shield denied request");
                Err(denial)
            }
            ShieldMode::DryRun => {
                tracing::info!(
                    kind = denial.kind(),
                    reason = %denial,
                    ip = %ip,
                    dry_run = true,
                    "Shield would deny request"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BROWSER: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    fn ip(last: u8) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, last)))
    }

    #[test]
    fn test_mode_parses() {
        assert_eq!("live".parse::<ShieldMode>().unwrap(), ShieldMode::Live);
        assert_eq!("DRY_RUN".parse::<ShieldMode>().unwrap(), ShieldMode::DryRun);
        assert!("off".parse::<ShieldMode>().is_err());
    }

    #[test]
    fn test_browsers_pass_and_scripts_are_denied() {
        let shield = Shield::new(ShieldMode::Live);
        assert!(shield.protect_request(ip(1), Some(BROWSER), &Method::POST).is_ok());
        assert_eq!(
            shield.protect_request(ip(1), Some("curl/8.5.0"), &Method::GET),
            Err(ShieldDenial::Bot("curl"))
        );
        assert_eq!(
            shield.protect_request(ip(1), None, &Method::GET),
            Err(ShieldDenial::Bot("missing-user-agent"))
        );
    }

    #[test]
    fn test_search_engines_may_only_read() {
        let shield = Shield::new(ShieldMode::Live);
        assert!(shield.protect_request(ip(1), Some(GOOGLEBOT), &Method::GET).is_ok());
        assert!(shield.protect_request(ip(1), Some(GOOGLEBOT), &Method::HEAD).is_ok());
        assert!(shield.protect_request(ip(1), Some(GOOGLEBOT), &Method::POST).is_err());
    }

    #[test]
    fn test_signup_rate_limit_is_per_ip() {
        let shield = Shield::new(ShieldMode::Live);
        for n in 0..5 {
            let email = format!("shopper{n}@example.com");
            assert!(shield.protect_signup(ip(7), Some(BROWSER), &email).is_ok());
        }
        assert_eq!(
            shield.protect_signup(ip(7), Some(BROWSER), "sixth@example.com"),
            Err(ShieldDenial::RateLimited)
        );
        assert!(shield.protect_signup(ip(8), Some(BROWSER), "other@example.com").is_ok());
    }

    #[test]
    fn test_signup_email_checks() {
        let shield = Shield::new(ShieldMode::Live);
        assert_eq!(
            shield.protect_signup(ip(2), Some(BROWSER), "x@mailinator.com"),
            Err(ShieldDenial::Email(EmailRejection::Disposable))
        );
        let email = shield.protect_signup(ip(3), Some(BROWSER), " Ada@Example.com ").unwrap();
        assert_eq!(email.as_str(), "ada@example.com");
    }

    #[test]
    fn test_signup_denies_search_engines() {
        let shield = Shield::new(ShieldMode::Live);
        assert!(matches!(
            shield.protect_signup(ip(4), Some(GOOGLEBOT), "a@example.com"),
            Err(ShieldDenial::Bot(_))
        ));
    }

    #[test]
    fn test_dry_run_allows_but_rejects_unusable_email() {
        let shield = Shield::new(ShieldMode::DryRun);
        assert!(shield.protect_request(ip(5), Some("curl/8.5.0"), &Method::GET).is_ok());
        assert!(shield.protect_signup(ip(5), None, "x@mailinator.com").is_ok());
        for _ in 0..10 {
            assert!(shield.protect_signup(ip(6), Some(BROWSER), "a@example.com").is_ok());
        }
        assert_eq!(
            shield.protect_signup(ip(5), Some(BROWSER), "nope"),
            Err(ShieldDenial::Email(EmailRejection::Invalid))
        );
    }
}
