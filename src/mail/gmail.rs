use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::auth::token_manager::TokenManager;
use crate::mail::raw::{MessageListing, RawMessage};
use crate::mail::{MailClient, MailError, TrashOutcome};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest id list sent in one batchModify call.
pub const BATCH_TRASH_CHUNK: usize = 50;

const TRASH_LABEL: &str = "TRASH";
const INBOX_LABEL: &str = "INBOX";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchModifyRequest<'a> {
    ids: &'a [String],
    add_label_ids: [&'static str; 1],
    remove_label_ids: [&'static str; 1],
}

/// Gmail REST client authenticated with the user's OAuth access token.
pub struct GmailClient {
    http: RwLock<Client>,
    tokens: TokenManager,
}

fn build_http() -> Result<Client, MailError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| MailError::transient("build http client", e))
}

impl GmailClient {
    pub fn new(tokens: TokenManager) -> Result<Self, MailError> {
        Ok(Self {
            http: RwLock::new(build_http()?),
            tokens,
        })
    }

    async fn request(
        &self,
        build: impl FnOnce(&Client) -> RequestBuilder,
    ) -> Result<RequestBuilder, MailError> {
        let token = self
            .tokens
            .get_access_token()
            .await
            .map_err(|e| MailError::Auth(format!("{e:#}")))?;
        let http = self.http.read().await.clone();
        Ok(build(&http).bearer_auth(token))
    }

    async fn send(&self, op: &str, req: RequestBuilder) -> Result<reqwest::Response, MailError> {
        let resp = req
            .send()
            .await
            .map_err(|e| MailError::from_reqwest(op, e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(MailError::from_status(op, status, body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        op: &str,
        req: RequestBuilder,
    ) -> Result<T, MailError> {
        let resp = self.send(op, req).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| MailError::from_reqwest(op, e))?;
        serde_json::from_slice(&bytes).map_err(|e| MailError::malformed(op, e))
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn list_message_page(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MessageListing, MailError> {
        debug!("listing messages (page token: {page_token:?})");
        let max = page_size.to_string();
        let req = self
            .request(|c| {
                let mut q = vec![("q", query), ("maxResults", max.as_str())];
                if let Some(t) = page_token {
                    q.push(("pageToken", t));
                }
                c.get(format!("{GMAIL_API_BASE}/messages")).query(&q)
            })
            .await?;
        self.send_json("list messages", req).await
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage, MailError> {
        let req = self
            .request(|c| {
                c.get(format!("{GMAIL_API_BASE}/messages/{id}"))
                    .query(&[("format", "full")])
            })
            .await?;
        self.send_json("get message", req).await
    }

    async fn trash_message(&self, id: &str) -> Result<TrashOutcome, MailError> {
        let req = self
            .request(|c| {
                c.get(format!("{GMAIL_API_BASE}/messages/{id}"))
                    .query(&[("format", "minimal")])
            })
            .await?;
        let current: RawMessage = self.send_json("check labels", req).await?;
        if current.label_ids.iter().any(|l| l == TRASH_LABEL) {
            info!("email {id} already in trash");
            return Ok(TrashOutcome::AlreadyInTrash);
        }

        let req = self
            .request(|c| c.post(format!("{GMAIL_API_BASE}/messages/{id}/trash")))
            .await?;
        self.send("trash message", req).await?;
        Ok(TrashOutcome::Trashed)
    }

    async fn trash_messages_batch(&self, ids: &[String]) -> Result<(), MailError> {
        for chunk in ids.chunks(BATCH_TRASH_CHUNK) {
            let body = BatchModifyRequest {
                ids: chunk,
                add_label_ids: [TRASH_LABEL],
                remove_label_ids: [INBOX_LABEL],
            };
            let req = self
                .request(|c| {
                    c.post(format!("{GMAIL_API_BASE}/messages/batchModify"))
                        .json(&body)
                })
                .await?;
            self.send("batch trash", req).await?;
        }
        Ok(())
    }

    async fn reset_transport(&self) -> Result<(), MailError> {
        self.tokens
            .reset()
            .await
            .map_err(|e| MailError::Auth(format!("{e:#}")))?;
        *self.http.write().await = build_http()?;
        self.tokens
            .get_access_token()
            .await
            .map_err(|e| MailError::Auth(format!("{e:#}")))?;
        info!("transport state cleared and authentication reset");
        Ok(())
    }
}
