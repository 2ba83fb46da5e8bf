//! Per-request data every page layout needs.

use std::fmt;
use std::str::FromStr;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::middleware::access::PathClass;
use crate::middleware::cookies::{self, THEME_COOKIE};
use crate::models::{CurrentUser, session_keys};
use crate::services::cart::Cart;

/// Content hash of the static assets, for cache busting.
pub const ASSET_VERSION: &str = env!("ASSET_VERSION");

/// Colour scheme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    pub const ALL: [Self; 3] = [Self::Light, Self::Dark, Self::System];
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flash message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// A message shown once on the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Success => "flash flash-success",
            FlashKind::Error => "flash flash-error",
        }
    }
}

/// Queue a flash message. Failures are logged; the page still works without it.
pub async fn set_flash(session: &Session, kind: FlashKind, message: impl Into<String>) {
    let flash = Flash {
        kind,
        message: message.into(),
    };
    if let Err(e) = session.insert(session_keys::FLASH, flash).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

async fn take_flash(session: &Session) -> Option<Flash> {
    session
        .remove::<Flash>(session_keys::FLASH)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read flash message");
            None
        })
}

/// Layout data: who is signed in, their theme, cart badge, and flash.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<CurrentUser>,
    pub theme: Theme,
    pub cart_count: u32,
    pub flash: Option<Flash>,
    pub path: String,
    pub asset_version: &'static str,
}

impl PageContext {
    /// CSRF token for scripts, empty for guests.
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.csrf_token.as_str())
    }

    /// Unix expiry of the access token, 0 for guests.
    #[must_use]
    pub fn session_expires_at(&self) -> i64 {
        self.user.as_ref().map_or(0, |u| u.expires_at)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(CurrentUser::is_admin)
    }

    /// Whether this page is only reachable while signed in.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        matches!(
            crate::middleware::access::classify(&self.path),
            PathClass::SignedIn | PathClass::Admin
        )
    }

    /// Whether the nav link for `prefix` should be highlighted.
    #[must_use]
    pub fn is_current(&self, prefix: &str) -> bool {
        if prefix == "/" {
            return self.path == "/";
        }
        crate::middleware::access::has_segment_prefix(&self.path, prefix)
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let theme = cookies::read(&parts.headers, THEME_COOKIE)
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();

        let (cart_count, flash) = match parts.extensions.get::<Session>() {
            Some(session) => (
                Cart::load(session).await.item_count(),
                take_flash(session).await,
            ),
            None => (0, None),
        };

        Ok(Self {
            user: parts.extensions.get::<CurrentUser>().cloned(),
            theme,
            cart_count,
            flash,
            path: parts.uri.path().to_string(),
            asset_version: ASSET_VERSION,
        })
    }
}
