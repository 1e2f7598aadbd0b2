use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use env_logger::{Env, Target};
use log::{info, warn};
use std::fs::{self, OpenOptions};
use std::path::Path;

use rs_mail_triage::auth::{token_manager::TokenManager, token_store};
use rs_mail_triage::classifier::openai::OpenAiClassifier;
use rs_mail_triage::config::{load_config, resolve_cache_dir};
use rs_mail_triage::mail::gmail::GmailClient;
use rs_mail_triage::pipeline::{Pipeline, PipelineConfig, RunContext, ShutdownFlag};
use rs_mail_triage::store::batch_cache::BatchCache;

#[derive(Parser)]
#[command(name = "rs_mail_triage")]
#[command(about = "Classify inbox mail with an LLM and trash what is not worth keeping", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Triage the whole inbox once, page by page
    Run {
        /// Message ids requested per listing page
        #[arg(long)]
        page_size: Option<u32>,

        /// Cap on concurrent classifier / delete calls
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Trash queued ids with one batchModify call instead of one by one
        #[arg(long)]
        batch_delete: bool,
    },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },

    /// Store the classifier API key in keyring
    SetApiKey,
}

fn init_logging(log_file: Option<&str>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        if let Some(dir) = Path::new(path).parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {path}"))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn read_secret(prompt: &str) -> Result<String> {
    eprintln!("{prompt} (end with Ctrl-D):");
    let mut secret = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
    Ok(secret.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::SetClientSecret { client_id } => {
            init_logging(None)?;
            let secret = read_secret("Paste client secret")?;
            token_store::save_client_secret(&client_id, &secret)?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::SetApiKey => {
            init_logging(None)?;
            let key = read_secret("Paste API key")?;
            token_store::save_api_key(&key)?;
            println!("Saved classifier API key");
            Ok(())
        }

        Command::Run {
            page_size,
            max_concurrent,
            batch_delete,
        } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            init_logging(cfg.log_file.as_deref())?;

            let mut pipeline_cfg = cfg.pipeline.apply(PipelineConfig::default());
            if let Some(n) = page_size {
                pipeline_cfg.page_size = n.max(1);
            }
            if let Some(n) = max_concurrent {
                pipeline_cfg.max_concurrent = n.max(1);
            }
            pipeline_cfg.batch_delete |= batch_delete;

            let api_key = token_store::load_api_key()?.ok_or_else(|| {
                anyhow!("no classifier API key; run set-api-key or export OPENAI_API_KEY")
            })?;
            let classifier = OpenAiClassifier::new(api_key, cfg.model())?;

            let tokens = TokenManager::from_config(&cfg)?;
            tokens
                .get_access_token()
                .await
                .context("authenticating with Gmail")?;
            let gmail = GmailClient::new(tokens)?;

            let cache = BatchCache::open(resolve_cache_dir(&cfg)?)?;

            let shutdown = ShutdownFlag::new();
            let handler_flag = shutdown.clone();
            ctrlc::set_handler(move || {
                if handler_flag.is_requested() {
                    warn!("second interrupt, exiting now");
                    std::process::exit(130);
                }
                info!("interrupt received; finishing in-flight work");
                handler_flag.request();
            })?;

            let ctx = RunContext::new(shutdown);
            let pipeline = Pipeline::new(&gmail, &classifier, pipeline_cfg).with_cache(&cache);
            let summary = pipeline.run(&ctx).await?;

            if summary.shutdown_requested {
                println!("Stopped early. {summary}");
            } else {
                println!("Done. {summary}");
            }
            Ok(())
        }
    }
}
