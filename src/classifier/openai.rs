use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

use crate::classifier::Classifier;
use crate::domain::email::{Decision, EmailRecord, Verdict};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str =
    "You are an email retention assistant. You must respond with valid JSON only.";

const PRINCIPLES: &str = "\
Retention principles:
1. KEEP anything with attachments, calendar invites, or pending events, actions or deadlines.
2. Weigh who the sender is and how often they write; colleagues, clients and people the user talks to are kept.
3. KEEP messages that belong to an ongoing conversation or project.
4. DELETE promotional and social mail unless it shows a purchase or signup, is personally relevant, or is likely to be needed later.
5. When unsure, KEEP.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// One element of the model's `decisions` array, before validation.
#[derive(Deserialize)]
struct RawDecision {
    email_id: Option<String>,
    subject: Option<String>,
    decision: Option<String>,
    reason: Option<String>,
}

/// Chat-completions classifier using JSON response mode.
pub struct OpenAiClassifier {
    http: Client,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, batch: &[EmailRecord]) -> Result<Vec<Decision>> {
        let prompt = build_batch_prompt(batch);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("classifier request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("classifier returned HTTP {status}: {text}"));
        }

        let chat: ChatResponse = resp.json().await.context("unreadable classifier response")?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("classifier response has no content"))?;
        debug!("received classifier response ({} bytes)", content.len());

        parse_decisions(&content, batch)
    }
}

/// User prompt listing every record of the batch.
pub fn build_batch_prompt(batch: &[EmailRecord]) -> String {
    let mut out = String::from(
        "Analyze these emails and return a JSON object with a 'decisions' array \
         holding one entry per email.\n",
    );
    for email in batch {
        let _ = write!(
            out,
            "\nEmail ID: {}\nSubject: {}\nFrom: {}\nHas Attachments: {}\nBody:\n{}\n---\n",
            email.message_id, email.subject, email.sender, email.has_attachments, email.body
        );
    }
    out.push('\n');
    out.push_str(PRINCIPLES);
    out.push_str(
        "\n\nReturn ONLY a JSON object in this format:\n\
         {\"decisions\": [{\"email_id\": \"<Email ID>\", \"subject\": \"<subject>\", \
         \"decision\": \"KEEP|DELETE\", \"reason\": \"<short explanation>\"}]}",
    );
    out
}

/// Decode the model's JSON content into decisions.
///
/// Accepts `{"decisions": [...]}` or a bare array. Entries without an id or
/// with an unrecognised verdict are dropped; a missing subject is filled in
/// from the submitted record.
pub fn parse_decisions(content: &str, batch: &[EmailRecord]) -> Result<Vec<Decision>> {
    let value: Value =
        serde_json::from_str(content).context("classifier returned invalid JSON")?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("decisions") {
            Some(Value::Array(items)) => items,
            _ => return Err(anyhow!("classifier JSON has no 'decisions' array")),
        },
        _ => return Err(anyhow!("classifier JSON is neither an object nor an array")),
    };

    let subjects: HashMap<&str, &str> = batch
        .iter()
        .map(|r| (r.message_id.as_str(), r.subject.as_str()))
        .collect();

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let raw: RawDecision = match serde_json::from_value(item) {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping unreadable decision entry: {e}");
                continue;
            }
        };
        let Some(email_id) = raw.email_id.filter(|id| !id.is_empty()) else {
            warn!("skipping decision without email_id");
            continue;
        };
        let Some(verdict) = raw.decision.as_deref().and_then(Verdict::parse) else {
            warn!(
                "skipping decision for {email_id} with verdict {:?}",
                raw.decision
            );
            continue;
        };
        let subject = raw
            .subject
            .or_else(|| subjects.get(email_id.as_str()).map(|s| s.to_string()))
            .unwrap_or_default();
        out.push(Decision {
            email_id,
            subject,
            decision: verdict,
            reason: raw.reason.unwrap_or_default(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, subject: &str) -> EmailRecord {
        EmailRecord {
            message_id: id.into(),
            subject: subject.into(),
            sender: "s@x.io".into(),
            body: "body".into(),
            has_attachments: false,
        }
    }

    #[test]
    fn parses_wrapped_decisions() {
        let batch = [record("a", "A"), record("b", "B")];
        let content = r#"{"decisions": [
            {"email_id": "a", "subject": "A", "decision": "KEEP", "reason": "invoice"},
            {"email_id": "b", "decision": "delete", "reason": "promo"}
        ]}"#;
        let d = parse_decisions(content, &batch).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].decision, Verdict::Keep);
        assert_eq!(d[1].decision, Verdict::Delete);
        assert_eq!(d[1].subject, "B");
    }

    #[test]
    fn parses_bare_array() {
        let batch = [record("a", "A")];
        let d = parse_decisions(r#"[{"email_id":"a","decision":"KEEP"}]"#, &batch).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].reason, "");
    }

    #[test]
    fn drops_unusable_entries() {
        let batch = [record("a", "A")];
        let content = r#"{"decisions": [
            {"subject": "no id", "decision": "KEEP"},
            {"email_id": "a", "decision": "ARCHIVE"},
            {"email_id": 7, "decision": "KEEP"},
            "garbage"
        ]}"#;
        assert!(parse_decisions(content, &batch).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_decisions("Sure! Here are my decisions:", &[]).is_err());
        assert!(parse_decisions(r#"{"result": []}"#, &[]).is_err());
    }

    #[test]
    fn prompt_lists_every_record() {
        let batch = [record("id-1", "Invoice"), record("id-2", "Sale")];
        let p = build_batch_prompt(&batch);
        assert!(p.contains("Email ID: id-1"));
        assert!(p.contains("Email ID: id-2"));
        assert!(p.contains("Subject: Sale"));
        assert!(p.contains("\"decisions\""));
    }
}
