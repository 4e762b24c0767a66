//! Session lifecycle management.
//!
//! This module owns the one piece of authenticated state in the
//! application:
//!
//! - `SessionManager`: login/logout/refresh plus the periodic expiry monitor
//! - `Session`/`Principal`: the trusted identity, bearer token, and expiry
//! - `SessionStore`: durable persistence behind pluggable key/value storage
//! - `CredentialStore`: OS keychain storage for remembered passwords
//!
//! Sessions are valid for a fixed 4-hour window chosen by the client and
//! are refreshed automatically once they are within 5 minutes of expiry.

pub mod clock;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use credentials::CredentialStore;
pub use error::AuthError;
pub use manager::{
    AuthApi, AuthPhase, MonitorHandle, RestoreOutcome, SessionManager, TickOutcome,
    MONITOR_INTERVAL,
};
pub use session::{AuthUser, Principal, Session, REFRESH_WINDOW_MS, SESSION_TTL_MS};
pub use store::{FileStorage, KeyValueStorage, MemoryStorage, SessionStore};
