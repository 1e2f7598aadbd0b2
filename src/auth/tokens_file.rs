use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::config::config_dir;

/// Non-secret access token metadata stored in ~/.config/rs_mail_triage/tokens.json
#[derive(Debug, Serialize, Deserialize)]
pub struct TokensFile {
    pub access_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
}

impl TokensFile {
    /// The cached token, if it is still valid at `now`.
    pub fn valid_token(self, now: i64) -> Option<(String, i64)> {
        match (self.access_token, self.expires_at_epoch) {
            (Some(at), Some(exp)) if now < exp => Some((at, exp)),
            _ => None,
        }
    }
}

fn tokens_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("tokens.json");
    Ok(p)
}

/// Save access_token and expiry epoch
pub fn save_tokens(access_token: Option<&str>, expires_at_epoch: Option<i64>) -> Result<()> {
    let p = tokens_path()?;
    let tf = TokensFile {
        access_token: access_token.map(|s| s.to_string()),
        expires_at_epoch,
    };
    let s = serde_json::to_string_pretty(&tf)?;
    fs::write(&p, s)?;
    Ok(())
}

/// Load tokens file if present
pub fn load_tokens() -> Result<Option<TokensFile>> {
    let p = tokens_path()?;
    if !p.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(&p)?;
    let tf: TokensFile = serde_json::from_str(&s)?;
    Ok(Some(tf))
}

/// Forget the cached access token so the next lookup re-authenticates.
pub fn clear_tokens() -> Result<()> {
    let p = tokens_path()?;
    if p.exists() {
        fs::remove_file(&p)?;
    }
    Ok(())
}
