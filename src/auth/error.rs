use thiserror::Error;

/// Errors surfaced by the session lifecycle operations.
///
/// Only `InvalidCredentials` and `RefreshFailed` are meant for display;
/// corrupted persisted state and locally detected expiry are handled
/// internally and never reach callers as errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The login endpoint rejected the username/password.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The refresh endpoint rejected the current token. The session has
    /// already been torn down by the time this is returned.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    /// An operation that needs a current session was called while logged out.
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("session storage error: {0}")]
    Storage(#[source] anyhow::Error),
}
