//! Payload composition, size governance, signing, and delivery for webhook
//! endpoints (C4), including the legacy pre-`endpoint`-table webhook path
//! (SPEC_FULL supplement #1) and the Discord/Slack format variants
//! (SPEC_FULL supplement #2).

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use entity::{endpoint, structured_email, webhook};
use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use sha2::Sha256;
use shared::dto::endpoint::{EndpointConfig, LegacyWebhookConfig, WebhookConfig};
use shared::dto::webhook::{
    AttachmentPayload, CleanedContentPayload, DeliveryResponseData, DiscordEmbed,
    DiscordEmbedField, DiscordPayload, ParsedDataPayload, SlackBlock, SlackPayload, SlackText,
    WebhookEmailPayload, WebhookEndpointPayload, WebhookFormatHint, WebhookPayload,
};
use shared::{DeliveryStatus, DeliveryType};

use crate::errors::PipelineError;
use crate::persistence::Persistence;

/// Payloads larger than this (serialized, bytes) trigger the size governor.
const MAX_PAYLOAD_BYTES: usize = 1_000_000;

const PLACEHOLDER: &str = "[binary attachment data removed - use Attachments API]";

/// Outcome of a single outbound POST, abstracted so tests can substitute a
/// fake transport instead of hitting the network.
#[derive(Clone, Debug)]
pub struct WebhookResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body_snippet: String,
}

#[derive(Clone, Debug)]
pub enum WebhookTransportError {
    Timeout(u64),
    Other(String),
}

impl std::fmt::Display for WebhookTransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookTransportError::Timeout(secs) => write!(f, "Request timeout after {secs}s"),
            WebhookTransportError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// Abstraction over the outbound HTTP POST, per spec.md §4.3 step 6.
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        timeout_secs: u16,
    ) -> Result<WebhookResponse, WebhookTransportError>;
}

/// `reqwest`-backed `WebhookClient`.
pub struct ReqwestWebhookClient {
    client: reqwest::Client,
}

impl ReqwestWebhookClient {
    pub fn new() -> Self {
        ReqwestWebhookClient {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestWebhookClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookClient for ReqwestWebhookClient {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        timeout_secs: u16,
    ) -> Result<WebhookResponse, WebhookTransportError> {
        let mut request = self
            .client
            .post(url)
            .timeout(StdDuration::from_secs(timeout_secs as u64))
            .body(body);

        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                WebhookTransportError::Timeout(timeout_secs as u64)
            } else {
                WebhookTransportError::Other(err.to_string())
            }
        })?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body_bytes = response
            .bytes()
            .await
            .map_err(|err| WebhookTransportError::Other(err.to_string()))?;

        let body_snippet = String::from_utf8_lossy(&body_bytes[..body_bytes.len().min(2000)]).to_string();

        Ok(WebhookResponse {
            status_code,
            headers,
            body_snippet,
        })
    }
}

/// Generates a cryptographically random, URL-safe opaque verification token.
fn generate_verification_token() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..32).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

fn download_url(base_url: &str, structured_id: &str, filename: Option<&str>) -> String {
    let name = filename.unwrap_or("attachment");
    format!(
        "{}/attachments/{}/{}",
        base_url.trim_end_matches('/'),
        structured_id,
        urlencode(name)
    )
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

lazy_static! {
    static ref SCRIPT_TAG: Regex =
        Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("static regex is valid");
    static ref STYLE_TAG: Regex =
        Regex::new(r"(?is)<style\b[^>]*>.*?</style>").expect("static regex is valid");
    static ref EVENT_HANDLER_ATTR: Regex =
        Regex::new(r#"(?i)\son\w+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("static regex is valid");
}

/// Strips `<script>`, `<style>`, and inline `on*` event-handler attributes
/// from HTML. The exact sanitization algorithm is an external collaborator
/// contract per spec.md §4.3; this is a conservative stand-in.
pub fn sanitize_html(html: &str) -> String {
    let no_script = SCRIPT_TAG.replace_all(html, "");
    let no_style = STYLE_TAG.replace_all(&no_script, "");
    EVENT_HANDLER_ATTR.replace_all(&no_style, "").to_string()
}

fn attachment_payloads(
    email: &structured_email::Model,
    base_url: &str,
) -> Vec<AttachmentPayload> {
    email
        .attachments
        .0
        .iter()
        .map(|a| AttachmentPayload {
            filename: a.filename.clone(),
            content_type: a.content_type.clone(),
            size: a.size,
            download_url: download_url(base_url, &email.id, a.filename.as_deref()),
        })
        .collect()
}

/// Composes the canonical `inbound` envelope for `email` destined for
/// `endpoint`, per spec.md §4.3 step 3.
pub fn compose_payload(
    email: &structured_email::Model,
    endpoint: &endpoint::Model,
    base_url: &str,
) -> WebhookPayload {
    let attachments = attachment_payloads(email, base_url);
    let sanitized_html = email.html_body.as_deref().map(sanitize_html);

    WebhookPayload {
        event: "email.received".to_string(),
        timestamp: Utc::now(),
        email: WebhookEmailPayload {
            id: email.id.clone(),
            message_id: email.message_id.clone(),
            from: email.from_data.clone(),
            to: email.to_data.clone(),
            recipient: email.recipient.clone(),
            subject: email.subject.clone(),
            received_at: email.created_at,
            thread_id: email.thread_id.clone(),
            thread_position: email.thread_position,
            parsed_data: ParsedDataPayload {
                from: email.from_data.clone(),
                to: email.to_data.clone(),
                cc: email.cc_data.clone(),
                bcc: email.bcc_data.clone(),
                reply_to: email.reply_to_data.clone(),
                text_body: email.text_body.clone(),
                html_body: email.html_body.clone(),
                raw: email.raw_content.clone(),
                attachments: attachments.clone(),
                headers: email.headers.clone(),
            },
            cleaned_content: CleanedContentPayload {
                has_html: sanitized_html.is_some(),
                has_text: email.text_body.is_some(),
                html: sanitized_html,
                text: email.text_body.clone(),
                attachments,
                headers: email.headers.clone(),
            },
        },
        endpoint: WebhookEndpointPayload {
            id: endpoint.id.clone(),
            name: endpoint.name.clone(),
            r#type: endpoint.r#type,
        },
    }
}

pub fn render_discord(payload: &WebhookPayload) -> DiscordPayload {
    let subject = payload.email.subject.clone().unwrap_or_else(|| "(no subject)".to_string());
    let from = payload
        .email
        .parsed_data
        .from
        .text
        .clone()
        .unwrap_or_else(|| "unknown sender".to_string());

    DiscordPayload {
        content: format!("New email: {subject}"),
        embeds: vec![DiscordEmbed {
            title: subject,
            description: payload.email.cleaned_content.text.clone().unwrap_or_default(),
            fields: vec![
                DiscordEmbedField { name: "From".into(), value: from },
                DiscordEmbedField {
                    name: "To".into(),
                    value: payload.email.recipient.clone(),
                },
            ],
            timestamp: payload.email.received_at,
        }],
    }
}

pub fn render_slack(payload: &WebhookPayload) -> SlackPayload {
    let subject = payload.email.subject.clone().unwrap_or_else(|| "(no subject)".to_string());
    let from = payload
        .email
        .parsed_data
        .from
        .text
        .clone()
        .unwrap_or_else(|| "unknown sender".to_string());

    SlackPayload {
        text: format!("New email: {subject}"),
        blocks: vec![SlackBlock::Section {
            text: SlackText {
                kind: "mrkdwn".to_string(),
                text: format!("*{subject}*\nFrom: {from}\nTo: {}", payload.email.recipient),
            },
        }],
    }
}

/// Strips base64-looking lines (the body of a MIME part encoded with
/// `Content-Transfer-Encoding: base64`) out of `raw`, preserving headers and
/// boundary lines, per spec.md §4.3 step 4.1.
fn strip_base64_bodies(raw: &str) -> String {
    lazy_static! {
        static ref BASE64_LINE: Regex =
            Regex::new(r"^[A-Za-z0-9+/]{40,}={0,2}$").expect("static regex is valid");
    }

    let mut out = String::with_capacity(raw.len());
    let mut in_base64_run = false;

    for line in raw.lines() {
        if BASE64_LINE.is_match(line.trim_end()) {
            if !in_base64_run {
                out.push_str(PLACEHOLDER);
                out.push('\n');
                in_base64_run = true;
            }
        } else {
            in_base64_run = false;
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

/// Re-serializes `payload`, stripping governed fields in order until the
/// result fits under `MAX_PAYLOAD_BYTES`. Returns the final bytes and the
/// list of stripped-field descriptions for the delivery response record.
fn govern_payload(mut payload: WebhookPayload) -> (Vec<u8>, Vec<String>) {
    let mut stripped = Vec::new();

    let mut bytes = serde_json::to_vec(&payload).unwrap_or_default();

    if bytes.len() <= MAX_PAYLOAD_BYTES {
        return (bytes, stripped);
    }

    if let Some(raw) = payload.email.parsed_data.raw.as_ref() {
        payload.email.parsed_data.raw = Some(strip_base64_bodies(raw));
        stripped.push("raw (attachment bodies removed)".to_string());
        bytes = serde_json::to_vec(&payload).unwrap_or_default();
    }

    if bytes.len() > MAX_PAYLOAD_BYTES {
        payload.email.parsed_data.headers = shared::dto::email::Headers::default();
        stripped.push("headers (emptied)".to_string());
        bytes = serde_json::to_vec(&payload).unwrap_or_default();
    }

    (bytes, stripped)
}

fn hmac_signature(secret: &str, body: &[u8]) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn build_headers(
    endpoint_id: &str,
    email_id: &str,
    message_id: Option<&str>,
    verification_token: &str,
    secret: Option<&str>,
    body: &[u8],
    custom_headers: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("User-Agent".to_string(), "InboundEmail-Webhook/1.0".to_string()),
        ("X-Webhook-Event".to_string(), "email.received".to_string()),
        ("X-Endpoint-ID".to_string(), endpoint_id.to_string()),
        ("X-Webhook-Timestamp".to_string(), Utc::now().to_rfc3339()),
        ("X-Email-ID".to_string(), email_id.to_string()),
        (
            "X-Message-ID".to_string(),
            message_id.unwrap_or_default().to_string(),
        ),
        (
            "X-Webhook-Verification-Token".to_string(),
            verification_token.to_string(),
        ),
    ];

    if let Some(secret) = secret {
        headers.push((
            "X-Webhook-Signature".to_string(),
            format!("sha256={}", hmac_signature(secret, body)),
        ));
    }

    // Custom endpoint headers are merged last so they may override the
    // defaults above, per spec.md §4.3 step 5.
    for (name, value) in custom_headers {
        if let Some(existing) = headers.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value.clone();
        } else {
            headers.push((name.clone(), value.clone()));
        }
    }

    headers
}

/// Delivers `email` to a full `Endpoint` of type `webhook`. Idempotent: a
/// duplicate `(email_id, endpoint_id)` row is treated as success.
pub async fn deliver(
    persistence: &dyn Persistence,
    client: &dyn WebhookClient,
    email: &structured_email::Model,
    endpoint: &endpoint::Model,
    base_url: &str,
) -> Result<(), PipelineError> {
    let delivery = match persistence
        .create_pending_delivery(&email.id, &endpoint.id, DeliveryType::Webhook)
        .await
    {
        Ok(d) => d,
        Err(PipelineError::Duplicate) => return Ok(()),
        Err(other) => return Err(other),
    };

    let EndpointConfig::Webhook(config) = &endpoint.config else {
        return Err(PipelineError::Fatal(format!(
            "endpoint {} has type webhook but config is not a webhook config",
            endpoint.id
        )));
    };

    let verification_token = ensure_verification_token(persistence, &endpoint.id, config).await?;

    let payload = compose_payload(email, endpoint, base_url);
    let format_hint = config.format;

    let (body, stripped_fields) = render_and_govern(&payload, format_hint);

    let headers = build_headers(
        &endpoint.id,
        &email.id,
        email.message_id.as_deref(),
        &verification_token,
        config.secret.as_deref(),
        &body,
        &config.headers,
    );

    let payload_size = body.len() as u64;
    let start = std::time::Instant::now();

    let outcome = client.post(&config.url, &headers, body, config.timeout).await;
    let delivery_time_ms = start.elapsed().as_millis() as u64;

    let response = match outcome {
        Ok(resp) if (200..300).contains(&resp.status_code) => DeliveryResponseData {
            status_code: Some(resp.status_code),
            response_body: Some(resp.body_snippet),
            response_headers: Some(resp.headers),
            error: None,
            url: Some(config.url.clone()),
            payload_size: Some(payload_size),
            stripped_fields: non_empty(stripped_fields),
            delivery_time_ms: Some(delivery_time_ms),
            delivered_at: Some(Utc::now()),
            legacy_webhook_id: None,
        },
        Ok(resp) => DeliveryResponseData {
            status_code: Some(resp.status_code),
            response_body: Some(resp.body_snippet),
            response_headers: Some(resp.headers),
            error: Some(format!("receiver responded with status {}", resp.status_code)),
            url: Some(config.url.clone()),
            payload_size: Some(payload_size),
            stripped_fields: non_empty(stripped_fields),
            delivery_time_ms: Some(delivery_time_ms),
            delivered_at: Some(Utc::now()),
            legacy_webhook_id: None,
        },
        Err(err) => DeliveryResponseData {
            status_code: None,
            response_body: None,
            response_headers: None,
            error: Some(err.to_string()),
            url: Some(config.url.clone()),
            payload_size: Some(payload_size),
            stripped_fields: non_empty(stripped_fields),
            delivery_time_ms: Some(delivery_time_ms),
            delivered_at: None,
            legacy_webhook_id: None,
        },
    };

    let status = if response.status_code.map(|c| (200..300).contains(&c)).unwrap_or(false) {
        DeliveryStatus::Success
    } else {
        DeliveryStatus::Failed
    };

    persistence.complete_delivery(&delivery.id, status, response).await
}

/// Delivers `email` through the legacy pre-`endpoint`-table webhook path
/// (SPEC_FULL supplement #1): same compose/sign/POST/record contract as
/// `deliver`, but against a bare `webhook` row. The idempotency lock reuses
/// `webhook.id` as the `endpoint_id` column since that column is non-null.
pub async fn deliver_legacy(
    persistence: &dyn Persistence,
    client: &dyn WebhookClient,
    email: &structured_email::Model,
    legacy: &webhook::Model,
    base_url: &str,
) -> Result<(), PipelineError> {
    let delivery = match persistence
        .create_pending_delivery(&email.id, &legacy.id, DeliveryType::Webhook)
        .await
    {
        Ok(d) => d,
        Err(PipelineError::Duplicate) => return Ok(()),
        Err(other) => return Err(other),
    };

    let mut config = LegacyWebhookConfig {
        url: legacy.url.clone(),
        secret: legacy.secret.clone(),
        verification_token: legacy.verification_token.clone(),
    };

    if config.verification_token.is_none() {
        let token = generate_verification_token();
        let installed = persistence
            .set_webhook_verification_token_if_absent(&legacy.id, &token)
            .await?;
        config.verification_token = Some(installed);
    }

    let synthetic_endpoint = endpoint::Model {
        id: legacy.id.clone(),
        user_id: legacy.user_id.clone(),
        r#type: shared::EndpointType::Webhook,
        name: "legacy webhook".to_string(),
        description: None,
        is_active: legacy.is_active,
        webhook_format: None,
        config: EndpointConfig::Webhook(WebhookConfig {
            url: config.url.clone(),
            timeout: 30,
            retry_attempts: 0,
            headers: HashMap::new(),
            verification_token: config.verification_token.clone(),
            secret: config.secret.clone(),
            format: None,
        }),
    };

    let payload = compose_payload(email, &synthetic_endpoint, base_url);
    let (body, stripped_fields) = render_and_govern(&payload, None);

    let headers = build_headers(
        &legacy.id,
        &email.id,
        email.message_id.as_deref(),
        config.verification_token.as_deref().unwrap_or_default(),
        config.secret.as_deref(),
        &body,
        &HashMap::new(),
    );

    let payload_size = body.len() as u64;
    let start = std::time::Instant::now();
    let outcome = client.post(&config.url, &headers, body, 30).await;
    let delivery_time_ms = start.elapsed().as_millis() as u64;

    let (status, response) = match outcome {
        Ok(resp) if (200..300).contains(&resp.status_code) => (
            DeliveryStatus::Success,
            DeliveryResponseData {
                status_code: Some(resp.status_code),
                response_body: Some(resp.body_snippet),
                response_headers: Some(resp.headers),
                error: None,
                url: Some(config.url.clone()),
                payload_size: Some(payload_size),
                stripped_fields: non_empty(stripped_fields),
                delivery_time_ms: Some(delivery_time_ms),
                delivered_at: Some(Utc::now()),
                legacy_webhook_id: Some(legacy.id.clone()),
            },
        ),
        Ok(resp) => (
            DeliveryStatus::Failed,
            DeliveryResponseData {
                status_code: Some(resp.status_code),
                response_body: Some(resp.body_snippet),
                response_headers: Some(resp.headers),
                error: Some(format!("receiver responded with status {}", resp.status_code)),
                url: Some(config.url.clone()),
                payload_size: Some(payload_size),
                stripped_fields: non_empty(stripped_fields),
                delivery_time_ms: Some(delivery_time_ms),
                delivered_at: Some(Utc::now()),
                legacy_webhook_id: Some(legacy.id.clone()),
            },
        ),
        Err(err) => (
            DeliveryStatus::Failed,
            DeliveryResponseData {
                status_code: None,
                response_body: None,
                response_headers: None,
                error: Some(err.to_string()),
                url: Some(config.url.clone()),
                payload_size: Some(payload_size),
                stripped_fields: non_empty(stripped_fields),
                delivery_time_ms: Some(delivery_time_ms),
                delivered_at: None,
                legacy_webhook_id: Some(legacy.id.clone()),
            },
        ),
    };

    persistence.complete_delivery(&delivery.id, status, response).await
}

async fn ensure_verification_token(
    persistence: &dyn Persistence,
    endpoint_id: &str,
    config: &WebhookConfig,
) -> Result<String, PipelineError> {
    if let Some(token) = &config.verification_token {
        return Ok(token.clone());
    }

    let token = generate_verification_token();
    persistence
        .set_endpoint_verification_token_if_absent(endpoint_id, &token)
        .await
}

fn render_and_govern(
    payload: &WebhookPayload,
    format_hint: Option<WebhookFormatHint>,
) -> (Vec<u8>, Vec<String>) {
    match format_hint {
        Some(WebhookFormatHint::Discord) => {
            (serde_json::to_vec(&render_discord(payload)).unwrap_or_default(), Vec::new())
        }
        Some(WebhookFormatHint::Slack) => {
            (serde_json::to_vec(&render_slack(payload)).unwrap_or_default(), Vec::new())
        }
        None => govern_payload(payload.clone()),
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_html_strips_script_and_event_handlers() {
        let html = r#"<div onclick="evil()">hi</div><script>evil()</script><style>body{}</style>"#;
        let sanitized = sanitize_html(html);
        assert!(!sanitized.contains("onclick"));
        assert!(!sanitized.contains("<script>"));
        assert!(!sanitized.contains("<style>"));
        assert!(sanitized.contains("hi"));
    }

    #[test]
    fn hmac_signature_is_deterministic_hex() {
        let sig_a = hmac_signature("secret", b"body");
        let sig_b = hmac_signature("secret", b"body");
        assert_eq!(sig_a, sig_b);
        assert!(sig_a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn strip_base64_bodies_collapses_consecutive_base64_lines() {
        let raw = "Content-Type: image/png\nContent-Transfer-Encoding: base64\n\nQUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVowMTIzNDU2Nzg5\nQUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVowMTIzNDU2Nzg5\n\n--boundary--";
        let stripped = strip_base64_bodies(raw);
        assert!(stripped.contains(PLACEHOLDER));
        assert!(stripped.contains("--boundary--"));
        assert_eq!(stripped.matches(PLACEHOLDER).count(), 1);
    }

    #[test]
    fn govern_payload_fits_under_max_after_stripping_raw() {
        let mut payload_json = serde_json::json!({
            "event": "email.received",
            "timestamp": "2024-01-01T00:00:00Z",
            "email": {
                "id": "e1",
                "messageId": null,
                "from": {"addresses": [], "text": null},
                "to": {"addresses": [], "text": null},
                "recipient": "a@b.com",
                "subject": "hi",
                "receivedAt": "2024-01-01T00:00:00Z",
                "threadId": null,
                "threadPosition": null,
                "parsedData": {
                    "from": {"addresses": [], "text": null},
                    "to": {"addresses": [], "text": null},
                    "cc": {"addresses": [], "text": null},
                    "bcc": {"addresses": [], "text": null},
                    "replyTo": {"addresses": [], "text": null},
                    "textBody": null,
                    "htmlBody": null,
                    "raw": "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVowMTIzNDU2Nzg5".repeat(60000),
                    "attachments": [],
                    "headers": {}
                },
                "cleanedContent": {
                    "html": null, "text": null, "hasHtml": false, "hasText": false,
                    "attachments": [], "headers": {}
                }
            },
            "endpoint": {"id": "ep1", "name": "n", "type": "webhook"}
        });

        payload_json["email"]["parsedData"]["raw"] = serde_json::Value::String(
            "A".repeat(2_000_000),
        );

        let payload: WebhookPayload = serde_json::from_value(payload_json).unwrap();
        let (bytes, stripped) = govern_payload(payload);

        assert!(bytes.len() <= MAX_PAYLOAD_BYTES);
        assert!(!stripped.is_empty());
    }
}
