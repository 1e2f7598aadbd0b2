use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::auth::{oauth, token_store, tokens_file};
use crate::config::Config;

/// Seconds shaved off the provider's expiry so a token is never used at the edge.
const EXPIRY_SKEW_SECS: i64 = 60;

pub struct TokenManager {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub user_email: String,
    cached: Mutex<Option<(String, i64)>>,
}

fn now_epoch() -> Result<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_id = cfg.client_id.clone();
        let user_email = cfg
            .user_email
            .clone()
            .ok_or_else(|| anyhow!("user_email not set in config"))?;

        let client_secret = token_store::load_client_secret(&client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: cfg.redirect().to_string(),
            user_email,
            cached: Mutex::new(None),
        })
    }

    /// Returns a valid access token; refreshes/PKCE if needed.
    pub async fn get_access_token(&self) -> Result<String> {
        let now = now_epoch()?;
        let mut cached = self.cached.lock().await;

        // 1) in memory
        if let Some((at, exp)) = cached.as_ref()
            && now < *exp
        {
            return Ok(at.clone());
        }

        // 2) tokens file
        if let Some((at, exp)) = tokens_file::load_tokens()?.and_then(|tf| tf.valid_token(now)) {
            debug!("using cached access token from tokens file");
            *cached = Some((at.clone(), exp));
            return Ok(at);
        }

        // 3) refresh if possible, otherwise PKCE
        let t = match token_store::load_refresh_token(&self.user_email)? {
            Some(rt) => {
                info!("refreshing Gmail access token");
                oauth::refresh_access_token(&self.client_id, self.client_secret.as_deref(), &rt)
                    .await?
            }
            None => {
                info!("no refresh token stored; starting interactive authorization");
                oauth::perform_pkce_flow(
                    &self.client_id,
                    self.client_secret.as_deref(),
                    &self.redirect_uri,
                    oauth::GMAIL_MODIFY_SCOPE,
                    &self.user_email,
                )
                .await?
            }
        };

        if let Some(rt) = &t.refresh_token
            && let Err(e) = token_store::save_refresh_token(&self.user_email, rt)
        {
            warn!("couldn't save refresh token to keyring: {e}");
        }

        let exp = t
            .expires_in
            .map(|s| now + s as i64 - EXPIRY_SKEW_SECS)
            .unwrap_or(now + 3500);
        if let Err(e) = tokens_file::save_tokens(Some(&t.access_token), Some(exp)) {
            warn!("couldn't save tokens metadata: {e}");
        }
        *cached = Some((t.access_token.clone(), exp));
        Ok(t.access_token)
    }

    /// Forget every cached access token; the next call re-authenticates.
    pub async fn reset(&self) -> Result<()> {
        self.cached.lock().await.take();
        tokens_file::clear_tokens()
    }
}
