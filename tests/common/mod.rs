#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use rs_mail_triage::classifier::Classifier;
use rs_mail_triage::domain::email::{Decision, EmailRecord, Verdict};
use rs_mail_triage::mail::raw::{Header, MessageListing, MessageRef, MessagePart, PartBody};
use rs_mail_triage::mail::{MailClient, MailError, RawMessage, TrashOutcome};
use rs_mail_triage::pipeline::{PipelineConfig, ShutdownFlag};

/// Injected behavior for one listing call.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Never answers within any sane deadline.
    Stall,
    Transient,
    Forbidden,
}

#[derive(Debug, Default)]
pub struct MailLog {
    pub list_calls: Vec<Option<String>>,
    pub get_calls: Vec<String>,
    pub trash_calls: Vec<String>,
    pub resets: usize,
    pub trashed: Vec<String>,
    pub batch_calls: Vec<Vec<String>>,
}

/// In-memory mailbox. Page `n` is reached with token `p{n}`.
pub struct FakeMail {
    pages: Vec<Vec<String>>,
    list_faults: Mutex<HashMap<Option<String>, VecDeque<Fault>>>,
    broken_ids: HashSet<String>,
    untrashable_ids: HashSet<String>,
    in_trash: HashSet<String>,
    pub log: Mutex<MailLog>,
}

pub fn ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i:03}")).collect()
}

fn token_for(page: usize) -> String {
    format!("p{page}")
}

impl FakeMail {
    pub fn new(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            list_faults: Mutex::new(HashMap::new()),
            broken_ids: HashSet::new(),
            untrashable_ids: HashSet::new(),
            in_trash: HashSet::new(),
            log: Mutex::new(MailLog::default()),
        }
    }

    /// Queue faults for successive listing calls with `token`.
    pub fn with_list_faults(self, token: Option<&str>, faults: &[Fault]) -> Self {
        self.list_faults
            .lock()
            .unwrap()
            .entry(token.map(str::to_string))
            .or_default()
            .extend(faults.iter().copied());
        self
    }

    /// Messages whose fetch always fails with a permanent error.
    pub fn with_broken(mut self, ids: &[&str]) -> Self {
        self.broken_ids.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    /// Messages whose trash call always fails with a transient error.
    pub fn with_untrashable(mut self, ids: &[&str]) -> Self {
        self.untrashable_ids.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_already_trashed(mut self, ids: &[&str]) -> Self {
        self.in_trash.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn list_calls_for(&self, token: Option<&str>) -> usize {
        self.log
            .lock()
            .unwrap()
            .list_calls
            .iter()
            .filter(|t| t.as_deref() == token)
            .count()
    }

    fn page_index(&self, token: Option<&str>) -> Result<usize, MailError> {
        match token {
            None => Ok(0),
            Some(t) => t
                .strip_prefix('p')
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| MailError::from_status("list", StatusCode::BAD_REQUEST, t.into())),
        }
    }
}

pub fn raw_message(id: &str) -> RawMessage {
    let header = |name: &str, value: String| Header {
        name: name.into(),
        value,
    };
    RawMessage {
        id: Some(id.into()),
        payload: Some(MessagePart {
            mime_type: Some("text/plain".into()),
            headers: vec![
                header("Subject", format!("Subject {id}")),
                header("From", format!("sender-{id}@example.com")),
            ],
            body: Some(PartBody {
                data: Some(URL_SAFE_NO_PAD.encode(format!("Body of {id}"))),
                ..PartBody::default()
            }),
            ..MessagePart::default()
        }),
        ..RawMessage::default()
    }
}

#[async_trait]
impl MailClient for FakeMail {
    async fn list_message_page(
        &self,
        _query: &str,
        _page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MessageListing, MailError> {
        self.log
            .lock()
            .unwrap()
            .list_calls
            .push(page_token.map(str::to_string));

        let fault = self
            .list_faults
            .lock()
            .unwrap()
            .get_mut(&page_token.map(str::to_string))
            .and_then(VecDeque::pop_front);
        match fault {
            Some(Fault::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Some(Fault::Transient) => {
                return Err(MailError::transient("list", "connection reset"));
            }
            Some(Fault::Forbidden) => {
                return Err(MailError::from_status(
                    "list",
                    StatusCode::FORBIDDEN,
                    "denied".into(),
                ));
            }
            None => {}
        }

        let idx = self.page_index(page_token)?;
        let Some(page) = self.pages.get(idx) else {
            return Ok(MessageListing::default());
        };
        Ok(MessageListing {
            messages: page
                .iter()
                .map(|id| MessageRef {
                    id: id.clone(),
                    thread_id: None,
                })
                .collect(),
            next_page_token: (idx + 1 < self.pages.len()).then(|| token_for(idx + 1)),
            result_size_estimate: Some(page.len() as u64),
        })
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage, MailError> {
        self.log.lock().unwrap().get_calls.push(id.to_string());
        if self.broken_ids.contains(id) {
            return Err(MailError::from_status(
                "get message",
                StatusCode::NOT_FOUND,
                id.into(),
            ));
        }
        Ok(raw_message(id))
    }

    async fn trash_message(&self, id: &str) -> Result<TrashOutcome, MailError> {
        self.log.lock().unwrap().trash_calls.push(id.to_string());
        if self.untrashable_ids.contains(id) {
            return Err(MailError::transient("trash message", "connection reset"));
        }
        if self.in_trash.contains(id) {
            return Ok(TrashOutcome::AlreadyInTrash);
        }
        self.log.lock().unwrap().trashed.push(id.to_string());
        Ok(TrashOutcome::Trashed)
    }

    async fn trash_messages_batch(&self, ids: &[String]) -> Result<(), MailError> {
        let mut log = self.log.lock().unwrap();
        log.batch_calls.push(ids.to_vec());
        log.trashed.extend(ids.iter().cloned());
        Ok(())
    }

    async fn reset_transport(&self) -> Result<(), MailError> {
        self.log.lock().unwrap().resets += 1;
        Ok(())
    }
}

type Rule = Box<dyn Fn(&EmailRecord) -> Option<Verdict> + Send + Sync>;

/// Classifier driven by a per-record rule. A rule returning `None` leaves
/// the record out of the response.
pub struct ScriptedClassifier {
    rule: Rule,
    failing_calls: HashSet<usize>,
    shutdown_after_first: Option<ShutdownFlag>,
    stray_decisions: bool,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedClassifier {
    pub fn new(rule: impl Fn(&EmailRecord) -> Option<Verdict> + Send + Sync + 'static) -> Self {
        Self {
            rule: Box::new(rule),
            failing_calls: HashSet::new(),
            shutdown_after_first: None,
            stray_decisions: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn keep_all() -> Self {
        Self::new(|_| Some(Verdict::Keep))
    }

    pub fn delete_all() -> Self {
        Self::new(|_| Some(Verdict::Delete))
    }

    /// Fail the `n`th call (0-based).
    pub fn failing_on(mut self, n: usize) -> Self {
        self.failing_calls.insert(n);
        self
    }

    pub fn requesting_shutdown(mut self, flag: ShutdownFlag) -> Self {
        self.shutdown_after_first = Some(flag);
        self
    }

    /// Also answer for an unknown id and repeat the first decision.
    pub fn with_stray_decisions(mut self) -> Self {
        self.stray_decisions = true;
        self
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn seen_ids(&self) -> Vec<String> {
        self.calls.lock().unwrap().concat()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, batch: &[EmailRecord]) -> Result<Vec<Decision>> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(batch.iter().map(|r| r.message_id.clone()).collect());
            calls.len() - 1
        };
        if let Some(flag) = &self.shutdown_after_first {
            flag.request();
        }
        if self.failing_calls.contains(&call) {
            return Err(anyhow!("model returned garbage"));
        }

        let mut out: Vec<Decision> = batch
            .iter()
            .filter_map(|r| {
                (self.rule)(r).map(|decision| Decision {
                    email_id: r.message_id.clone(),
                    subject: r.subject.clone(),
                    decision,
                    reason: "scripted".into(),
                })
            })
            .collect();
        if self.stray_decisions && let Some(first) = out.first().cloned() {
            out.push(Decision {
                email_id: "ghost".into(),
                ..first.clone()
            });
            out.push(first);
        }
        Ok(out)
    }
}

/// Defaults with every pause and cooldown kept, so paused-clock tests
/// exercise the real timing paths.
pub fn test_config() -> PipelineConfig {
    PipelineConfig::default()
}
