//! Access and refresh token issuing and inspection.
//!
//! Both tokens are HS256 JWTs signed with the configured secret. They carry a
//! `typ` claim so one can never be presented in place of the other.
//!
//! Expiry is checked here rather than by `jsonwebtoken`, because an expired
//! access token is still useful: its signature proves who the caller was, and
//! the session guard decides whether to refresh on that basis.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shopfront_core::{Role, UserId};

use crate::config::AuthConfig;
use crate::models::{CurrentUser, User};

/// `iss` claim of every token this service issues.
pub const ISSUER: &str = "shopfront";

/// Random bytes in a CSRF token.
const CSRF_TOKEN_BYTES: usize = 32;

/// Why a refresh token was rejected.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed or has a bad signature: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token has the wrong type")]
    WrongType,
    #[error("token subject is not a user id")]
    BadSubject,
    #[error("token has expired")]
    Expired,
}

/// The `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub csrf: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub typ: TokenKind,
}

impl AccessClaims {
    /// The identity these claims describe.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::BadSubject` if `sub` is not a user id.
    pub fn current_user(&self) -> Result<CurrentUser, TokenError> {
        let id = self
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenError::BadSubject)?;
        Ok(CurrentUser {
            id,
            email: self.email.clone(),
            role: self.role,
            csrf_token: self.csrf.clone(),
            expires_at: self.exp,
        })
    }
}

/// Claims of a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: Uuid,
    pub fam: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub typ: TokenKind,
}

impl RefreshClaims {
    /// # Errors
    ///
    /// Returns `TokenError::BadSubject` if `sub` is not a user id.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub.parse().map_err(|_| TokenError::BadSubject)
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub csrf_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub refresh_id: Uuid,
    pub family_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl TokenPair {
    /// The identity the new access token carries for `user`.
    #[must_use]
    pub fn current_user(&self, user: &User) -> CurrentUser {
        CurrentUser {
            id: user.id,
            email: user.email.to_string(),
            role: user.role,
            csrf_token: self.csrf_token.clone(),
            expires_at: self.access_expires_at.timestamp(),
        }
    }
}

/// Where an access token's expiry sits relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    Valid,
    /// Still accepted, but within the refresh threshold.
    Expiring,
    Expired,
}

/// Result of inspecting an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Valid(AccessClaims),
    Expiring(AccessClaims),
    Expired(AccessClaims),
    Invalid,
}

impl TokenStatus {
    /// Claims that may still be used to serve this request.
    #[must_use]
    pub const fn usable_claims(&self) -> Option<&AccessClaims> {
        match self {
            Self::Valid(claims) | Self::Expiring(claims) => Some(claims),
            Self::Expired(_) | Self::Invalid => None,
        }
    }
}

/// Classify an expiry timestamp against `now`.
///
/// A token whose remaining lifetime is at most `threshold_secs` is
/// `Expiring`; the boundary itself counts as expiring. A token with no
/// remaining lifetime is `Expired`.
#[must_use]
pub const fn classify_expiry(exp: i64, now: i64, threshold_secs: i64) -> ExpiryState {
    let remaining = exp.saturating_sub(now);
    if remaining <= 0 {
        ExpiryState::Expired
    } else if remaining <= threshold_secs {
        ExpiryState::Expiring
    } else {
        ExpiryState::Valid
    }
}

/// Signs and verifies tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    refresh_threshold: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("refresh_threshold", &self.refresh_threshold)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret_bytes()),
            decoding: DecodingKey::from_secret(config.secret_bytes()),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            refresh_threshold: config.refresh_threshold,
        }
    }

    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    #[must_use]
    pub const fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }

    /// Issue a pair for a new login, starting a new rotation family.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if signing fails.
    pub fn issue_pair(&self, user: &User, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        self.issue_in_family(user, Uuid::new_v4(), now)
    }

    /// Issue a pair continuing an existing rotation family.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if signing fails.
    pub fn issue_in_family(
        &self,
        user: &User,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let iat = now.timestamp();
        let access_exp = iat.saturating_add(secs(self.access_ttl));
        let refresh_exp = iat.saturating_add(secs(self.refresh_ttl));
        let csrf_token = generate_csrf_token();
        let refresh_id = Uuid::new_v4();

        let access = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.to_string(),
            role: user.role,
            csrf: csrf_token.clone(),
            iat,
            exp: access_exp,
            iss: ISSUER.to_string(),
            typ: TokenKind::Access,
        };
        let refresh = RefreshClaims {
            sub: user.id.to_string(),
            jti: refresh_id,
            fam: family_id,
            iat,
            exp: refresh_exp,
            iss: ISSUER.to_string(),
            typ: TokenKind::Refresh,
        };

        let header = Header::new(Algorithm::HS256);
        Ok(TokenPair {
            access_token: jsonwebtoken::encode(&header, &access, &self.encoding)?,
            refresh_token: jsonwebtoken::encode(&header, &refresh, &self.encoding)?,
            csrf_token,
            access_expires_at: timestamp(access_exp),
            refresh_expires_at: timestamp(refresh_exp),
            refresh_id,
            family_id,
            issued_at: now,
        })
    }

    /// Verify an access token and classify its expiry.
    #[must_use]
    pub fn inspect_access(&self, token: &str, now: DateTime<Utc>) -> TokenStatus {
        let Ok(data) = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation())
        else {
            return TokenStatus::Invalid;
        };
        let claims = data.claims;
        if claims.typ != TokenKind::Access || claims.current_user().is_err() {
            return TokenStatus::Invalid;
        }

        match classify_expiry(claims.exp, now.timestamp(), secs(self.refresh_threshold)) {
            ExpiryState::Valid => TokenStatus::Valid(claims),
            ExpiryState::Expiring => TokenStatus::Expiring(claims),
            ExpiryState::Expired => TokenStatus::Expired(claims),
        }
    }

    /// Verify a refresh token, including its expiry.
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` describing why the token is unusable.
    pub fn decode_refresh(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, TokenError> {
        let claims =
            jsonwebtoken::decode::<RefreshClaims>(token, &self.decoding, &validation())?.claims;
        if claims.typ != TokenKind::Refresh {
            return Err(TokenError::WrongType);
        }
        claims.user_id()?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Generate a CSRF token: 32 random bytes, URL-safe base64 without padding.
#[must_use]
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Shared validation: HS256, our issuer, required claims, expiry left to the caller.
fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);
    validation
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use secrecy::SecretString;
    use shopfront_core::Email;

    use super::*;

    const MINUTE: i64 = 60;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::from(secret.to_string()),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(7 * 24 * 3600),
            refresh_threshold: Duration::from_secs(300),
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&config("k7#Qm2$vX9!pL4@wZ8^rT1&yB6*nF3%h"))
    }

    fn user() -> User {
        User {
            id: UserId::new(42),
            email: Email::parse("shopper@example.com").unwrap(),
            name: "Shopper".to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_within_threshold_is_flagged() {
        let now = 1_000_000;
        assert_eq!(classify_expiry(now + 4 * MINUTE, now, 5 * MINUTE), ExpiryState::Expiring);
        assert_eq!(classify_expiry(now + 1, now, 5 * MINUTE), ExpiryState::Expiring);
    }

    #[test]
    fn test_outside_threshold_is_not_flagged() {
        let now = 1_000_000;
        assert_eq!(classify_expiry(now + 6 * MINUTE, now, 5 * MINUTE), ExpiryState::Valid);
        assert_eq!(classify_expiry(now + 5 * MINUTE + 1, now, 5 * MINUTE), ExpiryState::Valid);
    }

    #[test]
    fn test_threshold_boundary_is_flagged() {
        let now = 1_000_000;
        assert_eq!(classify_expiry(now + 5 * MINUTE, now, 5 * MINUTE), ExpiryState::Expiring);
    }

    #[test]
    fn test_past_or_present_expiry_is_expired() {
        let now = 1_000_000;
        assert_eq!(classify_expiry(now, now, 5 * MINUTE), ExpiryState::Expired);
        assert_eq!(classify_expiry(now - 1, now, 5 * MINUTE), ExpiryState::Expired);
        assert_eq!(classify_expiry(i64::MIN, now, 5 * MINUTE), ExpiryState::Expired);
    }

    #[test]
    fn test_fresh_access_token_is_valid() {
        let issuer = issuer();
        let now = Utc::now();
        let pair = issuer.issue_pair(&user(), now).unwrap();

        let TokenStatus::Valid(claims) = issuer.inspect_access(&pair.access_token, now) else {
            panic!("expected a valid token");
        };
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.csrf, pair.csrf_token);
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.current_user().unwrap().id, UserId::new(42));
    }

    #[test]
    fn test_access_token_ages_through_states() {
        let issuer = issuer();
        let issued = Utc::now();
        let pair = issuer.issue_pair(&user(), issued).unwrap();

        let later = issued + TimeDelta::seconds(11 * MINUTE);
        assert!(matches!(
            issuer.inspect_access(&pair.access_token, later),
            TokenStatus::Expiring(_)
        ));

        let expired = issued + TimeDelta::seconds(15 * MINUTE);
        assert!(matches!(
            issuer.inspect_access(&pair.access_token, expired),
            TokenStatus::Expired(_)
        ));
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let issuer = issuer();
        let now = Utc::now();
        let pair = issuer.issue_pair(&user(), now).unwrap();

        assert_eq!(issuer.inspect_access(&pair.refresh_token, now), TokenStatus::Invalid);
        assert!(issuer.decode_refresh(&pair.access_token, now).is_err());
    }

    #[test]
    fn test_refresh_claims_round_trip() {
        let issuer = issuer();
        let now = Utc::now();
        let pair = issuer.issue_pair(&user(), now).unwrap();

        let claims = issuer.decode_refresh(&pair.refresh_token, now).unwrap();
        assert_eq!(claims.jti, pair.refresh_id);
        assert_eq!(claims.fam, pair.family_id);
        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
    }

    #[test]
    fn test_rotation_keeps_family() {
        let issuer = issuer();
        let now = Utc::now();
        let first = issuer.issue_pair(&user(), now).unwrap();
        let second = issuer.issue_in_family(&user(), first.family_id, now).unwrap();

        assert_eq!(first.family_id, second.family_id);
        assert_ne!(first.refresh_id, second.refresh_id);
        assert_ne!(first.csrf_token, second.csrf_token);
    }

    #[test]
    fn test_expired_refresh_token_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let pair = issuer.issue_pair(&user(), now).unwrap();

        let later = now + TimeDelta::days(8);
        assert!(matches!(
            issuer.decode_refresh(&pair.refresh_token, later),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_or_foreign_tokens_are_invalid() {
        let issuer = issuer();
        let now = Utc::now();
        let pair = issuer.issue_pair(&user(), now).unwrap();

        let mut tampered = pair.access_token.clone();
        tampered.pop();
        tampered.push(if pair.access_token.ends_with('A') { 'B' } else { 'A' });
        assert_eq!(issuer.inspect_access(&tampered, now), TokenStatus::Invalid);

        let other = TokenIssuer::new(&config("Zx8!Lp3#Vb6$Nm1@Qw4^Er7&Ty0*Ui5%"));
        assert_eq!(other.inspect_access(&pair.access_token, now), TokenStatus::Invalid);
        assert_eq!(issuer.inspect_access("not.a.jwt", now), TokenStatus::Invalid);
    }

    #[test]
    fn test_wrong_issuer_is_invalid() {
        let issuer = issuer();
        let now = Utc::now();
        let claims = AccessClaims {
            sub: "42".to_string(),
            email: "shopper@example.com".to_string(),
            role: Role::Admin,
            csrf: generate_csrf_token(),
            iat: now.timestamp(),
            exp: now.timestamp() + 900,
            iss: "someone-else".to_string(),
            typ: TokenKind::Access,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("k7#Qm2$vX9!pL4@wZ8^rT1&yB6*nF3%h".as_bytes()),
        )
        .unwrap();
        assert_eq!(issuer.inspect_access(&token, now), TokenStatus::Invalid);
    }

    #[test]
    fn test_csrf_tokens_are_url_safe_and_unique() {
        let a = generate_csrf_token();
        let b = generate_csrf_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
