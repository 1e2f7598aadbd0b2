use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "rs_mail_triage";

/// Keyring user under which the classifier API key is stored.
const API_KEY_USER: &str = "openai-api-key";

fn save(user: &str, secret: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, user);
    entry?
        .set_password(secret)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

fn load(user: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, user);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Save a refresh token into the OS keyring for the given username (email)
pub fn save_refresh_token(username: &str, refresh_token: &str) -> Result<()> {
    save(username, refresh_token)
}

/// Load a refresh token from the keyring for the given username (email)
pub fn load_refresh_token(username: &str) -> Result<Option<String>> {
    load(username)
}

/// Save a client secret into the keyring, keyed by client_id
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    save(client_id, client_secret)
}

/// Load client secret from keyring by client_id
pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    load(client_id)
}

pub fn save_api_key(api_key: &str) -> Result<()> {
    save(API_KEY_USER, api_key)
}

/// Classifier API key: keyring first, then `OPENAI_API_KEY`.
pub fn load_api_key() -> Result<Option<String>> {
    Ok(load(API_KEY_USER)?.or_else(|| std::env::var("OPENAI_API_KEY").ok()))
}
