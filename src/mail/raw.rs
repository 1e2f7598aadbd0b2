use serde::{Deserialize, Serialize};

/// Gmail `users.messages` resource as returned by `format=full`.
///
/// Every field is optional so that a partial or odd response still
/// deserializes; the normalizer decides what is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: Option<String>,
    pub thread_id: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub part_id: Option<String>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    pub fn is_mime(&self, mime: &str) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(mime))
    }

    /// Base64url body data, if the part carries it inline.
    pub fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    pub attachment_id: Option<String>,
    pub size: Option<u64>,
    pub data: Option<String>,
}

/// One entry of a `users.messages.list` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListing {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
    pub result_size_estimate: Option<u64>,
}

impl MessageListing {
    pub fn ids(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sparse_message() {
        let raw: RawMessage = serde_json::from_str(r#"{"id":"m1"}"#).unwrap();
        assert_eq!(raw.id.as_deref(), Some("m1"));
        assert!(raw.payload.is_none());
        assert!(raw.label_ids.is_empty());
    }

    #[test]
    fn parses_listing_without_messages() {
        let l: MessageListing = serde_json::from_str(r#"{"resultSizeEstimate":0}"#).unwrap();
        assert!(l.messages.is_empty());
        assert!(l.next_page_token.is_none());
    }

    #[test]
    fn parses_nested_parts() {
        let raw: RawMessage = serde_json::from_str(
            r#"{
                "id": "m2",
                "labelIds": ["INBOX"],
                "payload": {
                    "mimeType": "multipart/mixed",
                    "headers": [{"name": "Subject", "value": "Hello"}],
                    "parts": [
                        {"mimeType": "multipart/alternative", "parts": [
                            {"mimeType": "text/plain", "body": {"data": "aGk", "size": 2}}
                        ]},
                        {"mimeType": "application/pdf", "filename": "a.pdf",
                         "body": {"attachmentId": "x", "size": 10}}
                    ]
                }
            }"#,
        )
        .unwrap();
        let payload = raw.payload.unwrap();
        assert_eq!(payload.parts.len(), 2);
        assert_eq!(payload.parts[0].parts[0].data(), Some("aGk"));
        assert!(payload.parts[1].is_mime("APPLICATION/PDF"));
    }
}
