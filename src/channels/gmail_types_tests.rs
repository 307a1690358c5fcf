use super::*;
use serde_json::json;

fn b64(s: &str) -> String {
    encode_base64url(s.as_bytes())
}

fn message(payload: serde_json::Value) -> GmailMessage {
    serde_json::from_value(json!({
        "id": "m1",
        "threadId": "t1",
        "labelIds": ["INBOX"],
        "snippet": "snip",
        "internalDate": "1700000000000",
        "payload": payload
    }))
    .unwrap()
}

// ── Body extraction ─────────────────────────────────────────────

#[test]
fn plain_text_top_level_and_child_are_concatenated() {
    let msg = message(json!({
        "mimeType": "multipart/mixed",
        "headers": [{"name": "Subject", "value": "Hi"}],
        "parts": [
            {"mimeType": "text/plain", "body": {"data": b64("first ")}},
            {"mimeType": "text/plain", "body": {"data": b64("second")}}
        ]
    }));
    assert_eq!(msg.summarize().body, "first second");
}

#[test]
fn deeply_nested_plain_text_is_ignored() {
    let msg = message(json!({
        "mimeType": "multipart/mixed",
        "parts": [{
            "mimeType": "multipart/alternative",
            "parts": [{"mimeType": "text/plain", "body": {"data": b64("deep")}}]
        }]
    }));
    assert_eq!(msg.summarize().body, "");
}

#[test]
fn html_fallback_strips_tags() {
    let msg = message(json!({
        "mimeType": "multipart/alternative",
        "parts": [
            {"mimeType": "text/html", "body": {"data": b64("<p>Hello</p>\n<b>World</b>")}}
        ]
    }));
    assert_eq!(msg.summarize().body, "Hello World");
}

#[test]
fn attachments_are_listed() {
    let msg = message(json!({
        "mimeType": "multipart/mixed",
        "parts": [
            {"mimeType": "text/plain", "body": {"data": b64("see attached")}},
            {"mimeType": "application/pdf", "filename": "invoice.pdf",
             "body": {"attachmentId": "att1", "size": 1234}}
        ]
    }));
    let summary = msg.summarize();
    assert_eq!(
        summary.attachments,
        vec![AttachmentInfo {
            id: "att1".into(),
            filename: "invoice.pdf".into(),
            mime_type: "application/pdf".into(),
            size: 1234,
        }]
    );
}

#[test]
fn headers_are_lowercased() {
    let msg = message(json!({
        "mimeType": "text/plain",
        "headers": [{"name": "From", "value": "a@b.c"}, {"name": "X-Custom", "value": "1"}],
        "body": {"data": b64("x")}
    }));
    let summary = msg.summarize();
    assert_eq!(summary.headers.get("from").map(String::as_str), Some("a@b.c"));
    assert_eq!(summary.headers.get("x-custom").map(String::as_str), Some("1"));
    assert_eq!(msg.header("FROM"), Some("a@b.c"));
}

#[test]
fn padded_and_unpadded_base64url_decode() {
    assert_eq!(decode_base64url("aGk=").unwrap(), b"hi");
    assert_eq!(decode_base64url("aGk").unwrap(), b"hi");
}

// ── strip_html ──────────────────────────────────────────────────

#[test]
fn strip_html_collapses_whitespace() {
    assert_eq!(strip_html("<div>  a <i>b</i>\n\n c </div>"), "a b c");
    assert_eq!(strip_html(""), "");
    assert_eq!(strip_html("plain"), "plain");
}

// ── Queries ─────────────────────────────────────────────────────

#[test]
fn label_query_puts_exclusions_first() {
    let filters = vec![
        "INBOX".to_string(),
        "!processed-by-hi".to_string(),
        "receipts".to_string(),
    ];
    assert_eq!(
        build_label_query(&filters).as_deref(),
        Some("-label:processed-by-hi label:INBOX label:receipts")
    );
    assert_eq!(build_label_query(&[]), None);
}

// ── Replies ─────────────────────────────────────────────────────

#[test]
fn reply_address_prefers_angle_brackets() {
    assert_eq!(
        reply_address("Alice Example <alice@example.com>").as_deref(),
        Some("alice@example.com")
    );
    assert_eq!(reply_address("bob@example.com").as_deref(), Some("bob@example.com"));
    assert_eq!(reply_address("Nobody"), None);
}

#[test]
fn reply_subject_is_not_doubled() {
    assert_eq!(reply_subject("Invoice"), "Re: Invoice");
    assert_eq!(reply_subject("RE: Invoice"), "RE: Invoice");
    assert_eq!(reply_subject(""), "Re: ");
}

#[test]
fn reply_raw_contains_threading_headers() {
    let raw = build_reply_raw("a@b.c", "Re: x", "m1", "Thanks!");
    let decoded = String::from_utf8(decode_base64url(&raw).unwrap()).unwrap();
    assert!(decoded.starts_with("To: a@b.c\r\nSubject: Re: x\r\n"));
    assert!(decoded.contains("In-Reply-To: m1\r\nReferences: m1\r\n"));
    assert!(decoded.ends_with("\r\n\r\nThanks!"));
}

// ── Unsubscribe ─────────────────────────────────────────────────

#[test]
fn unsubscribe_header_wins() {
    let msg = message(json!({
        "mimeType": "text/html",
        "headers": [{"name": "List-Unsubscribe",
                     "value": "<mailto:u@list.com>, <https://list.com/unsub?id=1>"}],
        "body": {"data": b64(r#"<a href="https://other.com/unsubscribe">x</a>"#)}
    }));
    assert_eq!(
        find_unsubscribe_url(&msg).as_deref(),
        Some("https://list.com/unsub?id=1")
    );
}

#[test]
fn unsubscribe_falls_back_to_html_links() {
    let msg = message(json!({
        "mimeType": "multipart/alternative",
        "parts": [{"mimeType": "text/html", "body": {"data": b64(
            r#"<a href="https://shop.com/home">Shop</a> <a href='https://shop.com/Opt-Out?u=9'>leave</a>"#
        )}}]
    }));
    assert_eq!(
        find_unsubscribe_url(&msg).as_deref(),
        Some("https://shop.com/Opt-Out?u=9")
    );
}

#[test]
fn unsubscribe_missing() {
    let msg = message(json!({"mimeType": "text/plain", "body": {"data": b64("hi")}}));
    assert_eq!(find_unsubscribe_url(&msg), None);
}

// ── Labels ──────────────────────────────────────────────────────

#[test]
fn system_label_rules() {
    assert!(validate_label_change(&[], &["INBOX".into()]).is_ok());
    assert!(validate_label_change(&["Label_1".into()], &["Label_2".into()]).is_ok());

    let err = validate_label_change(&["INBOX".into()], &[]).unwrap_err();
    assert!(err.contains("INBOX"));
    assert!(validate_label_change(&["CATEGORY_PROMOTIONS".into()], &[]).is_err());
    assert!(validate_label_change(&[], &["TRASH".into()]).is_err());
}

#[test]
fn system_label_rules_ignore_case() {
    assert!(is_system_label("unread"));
    assert!(is_system_label("category_social"));
    assert!(validate_label_change(&["unread".into()], &[]).is_err());
    assert!(validate_label_change(&[], &["Trash".into()]).is_err());
    assert!(validate_label_change(&[], &["inbox".into()]).is_ok());
    assert_eq!(resolve_label_ids(&[], &["trash".into()]), vec!["TRASH"]);
}

#[test]
fn label_names_resolve_to_ids() {
    let labels = vec![
        Label {
            id: "Label_7".into(),
            name: "processed-by-hi".into(),
        },
        Label {
            id: "Label_8".into(),
            name: "Receipts".into(),
        },
    ];
    let resolved = resolve_label_ids(
        &labels,
        &[
            "processed-by-hi".into(),
            "receipts".into(),
            "Label_8".into(),
            "INBOX".into(),
            "missing".into(),
        ],
    );
    assert_eq!(
        resolved,
        vec!["Label_7", "Label_8", "Label_8", "INBOX", "missing"]
    );
}
