//! Gmail wire types and pure message helpers (body extraction, reply
//! addressing, unsubscribe discovery, label rules).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Gmail delivers base64url both with and without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>|([^\s<]+@[^\s>]+)").expect("valid regex"));
static LIST_UNSUBSCRIBE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(https?://[^>]+)>").expect("valid regex"));
static UNSUBSCRIBE_HREF_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)href=["'](https?://[^"']*unsubscribe[^"']*)["']"#,
        r#"(?i)href=["'](https?://[^"']*opt[_-]out[^"']*)["']"#,
        r#"(?i)href=["'](https?://[^"']*optout[^"']*)["']"#,
        r#"(?i)href=["'](https?://[^"']*remove[^"']*)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Labels owned by Gmail itself.
pub const SYSTEM_LABELS: &[&str] = &[
    "INBOX", "UNREAD", "STARRED", "IMPORTANT", "SPAM", "TRASH", "SENT", "DRAFT", "CHAT",
];

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
    /// Only present for `format=raw`.
    #[serde(default)]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelList {
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentData {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Draft {
    pub id: String,
}

// ── Tool-facing views ───────────────────────────────────────────────

/// Readable projection of a message, returned to the model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub internal_date: Option<String>,
    /// Header names lower-cased. Later duplicates win.
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub attachments: Vec<AttachmentInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

impl GmailMessage {
    /// First header with this name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn summarize(&self) -> MessageSummary {
        let mut headers = BTreeMap::new();
        let mut body = String::new();
        let mut attachments = Vec::new();

        if let Some(payload) = &self.payload {
            for h in &payload.headers {
                headers.insert(h.name.to_lowercase(), h.value.clone());
            }
            collect_part(payload, 0, &mut body, &mut attachments);
        }

        MessageSummary {
            id: self.id.clone(),
            thread_id: self.thread_id.clone(),
            label_ids: self.label_ids.clone(),
            snippet: self.snippet.clone(),
            internal_date: self.internal_date.clone(),
            headers,
            body,
            attachments,
        }
    }

    /// First `text/html` part in depth-first order, decoded.
    pub fn html_body(&self) -> Option<String> {
        fn find(part: &MessagePart) -> Option<String> {
            if part.mime_type == "text/html"
                && let Some(data) = &part.body.data
            {
                return decode_base64url_text(data);
            }
            part.parts.iter().find_map(find)
        }
        self.payload.as_ref().and_then(find)
    }
}

/// Plain text at depth ≤ 1 is concatenated. HTML is used only while no text
/// has been collected yet.
fn collect_part(
    part: &MessagePart,
    depth: usize,
    body: &mut String,
    attachments: &mut Vec<AttachmentInfo>,
) {
    let data = part.body.data.as_deref();
    if part.mime_type == "text/plain" && data.is_some() {
        if depth <= 1
            && let Some(text) = data.and_then(decode_base64url_text)
        {
            body.push_str(&text);
        }
    } else if part.mime_type == "text/html" && data.is_some() && body.is_empty() {
        if let Some(html) = data.and_then(decode_base64url_text) {
            *body = strip_html(&html);
        }
    } else if !part.filename.is_empty()
        && let Some(id) = &part.body.attachment_id
    {
        attachments.push(AttachmentInfo {
            id: id.clone(),
            filename: part.filename.clone(),
            mime_type: part.mime_type.clone(),
            size: part.body.size,
        });
    }

    for child in &part.parts {
        collect_part(child, depth + 1, body, attachments);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn decode_base64url(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_LENIENT.decode(data.trim()).ok()
}

fn decode_base64url_text(data: &str) -> Option<String> {
    decode_base64url(data).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Replace tags with spaces and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    WS_RE.replace_all(&without_tags, " ").trim().to_string()
}

/// Gmail search query for a label filter. `!X` excludes, `X` includes.
/// Exclusions come first.
pub fn build_label_query(filters: &[String]) -> Option<String> {
    let excludes = filters
        .iter()
        .filter_map(|f| f.strip_prefix('!'))
        .map(|l| format!("-label:{l}"));
    let includes = filters
        .iter()
        .filter(|f| !f.starts_with('!'))
        .map(|l| format!("label:{l}"));
    let query = excludes.chain(includes).collect::<Vec<_>>().join(" ");
    (!query.is_empty()).then_some(query)
}

/// Address to reply to, from a `From` header value.
pub fn reply_address(from: &str) -> Option<String> {
    let caps = ADDRESS_RE.captures(from)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

pub fn reply_subject(subject: &str) -> String {
    if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// RFC 822 text of a plain-text reply, base64url encoded for the drafts API.
pub fn build_reply_raw(to: &str, subject: &str, in_reply_to: &str, content: &str) -> String {
    let raw = format!(
        "To: {to}\r\n\
         Subject: {subject}\r\n\
         In-Reply-To: {in_reply_to}\r\n\
         References: {in_reply_to}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\r\n\
         {content}"
    );
    encode_base64url(raw.as_bytes())
}

/// `List-Unsubscribe` http(s) URL first, then the first matching HTML link.
pub fn find_unsubscribe_url(message: &GmailMessage) -> Option<String> {
    if let Some(value) = message.header("list-unsubscribe")
        && let Some(caps) = LIST_UNSUBSCRIBE_RE.captures(value)
    {
        return Some(caps[1].to_string());
    }

    let html = message.html_body().unwrap_or_default();
    UNSUBSCRIBE_HREF_RES
        .iter()
        .find_map(|re| re.captures(&html).map(|c| c[1].to_string()))
}

/// Gmail matches system label ids case-insensitively, so `trash` is `TRASH`.
pub fn is_system_label(label: &str) -> bool {
    let upper = label.to_ascii_uppercase();
    SYSTEM_LABELS.contains(&upper.as_str()) || upper.starts_with("CATEGORY_")
}

/// System labels may not be added, and `INBOX` is the only system label
/// that may be removed.
pub fn validate_label_change(add: &[String], remove: &[String]) -> Result<(), String> {
    if let Some(label) = add.iter().find(|l| is_system_label(l)) {
        return Err(format!("Cannot add system label: {label}"));
    }
    if let Some(label) = remove
        .iter()
        .find(|l| is_system_label(l) && !l.eq_ignore_ascii_case("INBOX"))
    {
        return Err(format!("Cannot remove system label: {label}"));
    }
    Ok(())
}

/// Map label names to IDs using a label list. System labels come back in
/// their canonical upper case; known IDs and unknown names pass through.
pub fn resolve_label_ids(labels: &[Label], names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            if is_system_label(name) {
                return name.to_ascii_uppercase();
            }
            if labels.iter().any(|l| &l.id == name) {
                return name.clone();
            }
            labels
                .iter()
                .find(|l| &l.name == name)
                .or_else(|| labels.iter().find(|l| l.name.eq_ignore_ascii_case(name)))
                .map(|l| l.id.clone())
                .unwrap_or_else(|| name.clone())
        })
        .collect()
}

#[cfg(test)]
#[path = "gmail_types_tests.rs"]
mod tests;
