use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::config::PipelineConfig;

pub const APP_DIR: &str = "rs_mail_triage";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    pub user_email: Option<String>,
    pub redirect_uri: Option<String>,
    pub cache_dir: Option<String>,
    pub log_file: Option<String>,
    pub openai_model: Option<String>,
    #[serde(default)]
    pub pipeline: PipelineOverrides,
}

/// Optional `[pipeline]` table; unset keys keep the built-in defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PipelineOverrides {
    pub page_size: Option<u32>,
    pub sub_batch_size: Option<usize>,
    pub max_concurrent: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub batch_delete: Option<bool>,
}

impl PipelineOverrides {
    pub fn apply(&self, mut cfg: PipelineConfig) -> PipelineConfig {
        if let Some(n) = self.page_size {
            cfg.page_size = n.max(1);
        }
        if let Some(n) = self.sub_batch_size {
            cfg.sub_batch_size = n.max(1);
        }
        if let Some(n) = self.max_concurrent {
            cfg.max_concurrent = n.max(1);
        }
        if let Some(s) = self.fetch_timeout_secs {
            cfg.fetch_timeout = Duration::from_secs(s);
        }
        if let Some(b) = self.batch_delete {
            cfg.batch_delete = b;
        }
        cfg
    }
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn default_cache_dir() -> Result<PathBuf> {
    Ok(dirs::cache_dir()
        .ok_or_else(|| anyhow::anyhow!("no cache dir available"))?
        .join(APP_DIR)
        .join("email_batches"))
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            user_email: Some("you@example.com".to_string()),
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            cache_dir: None,
            log_file: None,
            openai_model: Some(DEFAULT_MODEL.to_string()),
            pipeline: PipelineOverrides::default(),
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}; edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}

pub fn resolve_cache_dir(cfg: &Config) -> Result<PathBuf> {
    if let Some(p) = &cfg.cache_dir {
        Ok(PathBuf::from(p))
    } else {
        default_cache_dir()
    }
}

impl Config {
    pub fn model(&self) -> &str {
        self.openai_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn redirect(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse_config(r#"client_id = "abc""#).unwrap();
        assert_eq!(cfg.model(), DEFAULT_MODEL);
        assert_eq!(cfg.redirect(), DEFAULT_REDIRECT_URI);
        assert!(cfg.user_email.is_none());

        let p = cfg.pipeline.apply(PipelineConfig::default());
        assert_eq!(p.sub_batch_size, 50);
        assert_eq!(p.max_concurrent, 10);
    }

    #[test]
    fn pipeline_table_overrides() {
        let cfg = parse_config(
            r#"
            client_id = "abc"
            user_email = "me@example.com"

            [pipeline]
            page_size = 100
            max_concurrent = 0
            fetch_timeout_secs = 45
            batch_delete = true
            "#,
        )
        .unwrap();
        let p = cfg.pipeline.apply(PipelineConfig::default());
        assert_eq!(p.page_size, 100);
        assert_eq!(p.max_concurrent, 1);
        assert_eq!(p.fetch_timeout, Duration::from_secs(45));
        assert!(p.batch_delete);
    }
}
