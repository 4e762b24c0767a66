// Allow dead code: session surface is wider than any single consumer
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// Session validity window in milliseconds (4 hours).
/// The backend's demo tokens carry no usable expiry, so the client
/// decides the window itself at issuance time.
pub const SESSION_TTL_MS: i64 = 4 * 60 * 60 * 1000;

/// Refresh the session once this close to expiry (5 minutes).
pub const REFRESH_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Identity and token exactly as returned by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub image: String,
    pub token: String,
}

/// The authenticated user's identity attributes. Stored and displayed,
/// never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub image: String,
}

/// The currently trusted session: principal, bearer token, and the absolute
/// expiry timestamp (milliseconds since epoch). Token and expiry always
/// travel together; there is no such thing as a partial session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub principal: Principal,
    pub token: String,
    pub expires_at: i64,
}

impl Session {
    /// Build a session from an auth endpoint response, stamping the expiry
    /// relative to the given issuance time.
    pub fn issue(user: AuthUser, issued_at_ms: i64) -> Self {
        Self {
            principal: Principal {
                id: user.id,
                username: user.username,
                email: user.email,
                image: user.image,
            },
            token: user.token,
            expires_at: issued_at_ms + SESSION_TTL_MS,
        }
    }

    /// Milliseconds until expiry at the given instant. Negative once expired.
    pub fn remaining_at(&self, now_ms: i64) -> i64 {
        self.expires_at - now_ms
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.remaining_at(now_ms) <= 0
    }

    /// True while the session is still valid but inside the refresh window.
    pub fn needs_refresh_at(&self, now_ms: i64) -> bool {
        let remaining = self.remaining_at(now_ms);
        remaining > 0 && remaining <= REFRESH_WINDOW_MS
    }

    /// Whole minutes remaining, floored at zero (for display).
    pub fn minutes_remaining_at(&self, now_ms: i64) -> i64 {
        (self.remaining_at(now_ms) / 60_000).max(0)
    }
}
