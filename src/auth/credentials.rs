// Allow dead code: session surface is wider than any single consumer
#![allow(dead_code)]

use anyhow::{Context, Result};
use keyring::Entry;

/// Keychain service name for remembered passwords.
const SERVICE_NAME: &str = "storeadmin";

/// Opt-in "remember me" password storage in the OS keychain.
pub struct CredentialStore;

impl CredentialStore {
    /// Remember a password for a username.
    pub fn store(username: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("failed to open keychain entry")?;
        entry
            .set_password(password)
            .context("failed to store password in keychain")?;
        Ok(())
    }

    /// Fetch the remembered password for a username.
    pub fn get_password(username: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("failed to open keychain entry")?;
        entry
            .get_password()
            .context("no remembered password for this username")
    }

    /// Forget a remembered password. Missing entries count as success.
    pub fn delete(username: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("failed to open keychain entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("failed to delete password from keychain"),
        }
    }

    pub fn has_credentials(username: &str) -> bool {
        Entry::new(SERVICE_NAME, username)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}
