//! SES-backed `OutboundSender` (C5's collaborator): places the forwarded
//! message via `SendEmail`, rate-limited with a per-second token bucket.

use std::num::NonZeroU32;

use aws_sdk_sesv2::{
    config::Region,
    types::{Body, Content, Destination, EmailContent, Message, RawMessage},
    Client,
};
use governor::{
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota,
};
use inbound_core::forwarder::{OutboundHandoff, OutboundSender};

type RateLimiter =
    governor::RateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

pub struct SesOutboundSender {
    client: Client,
    rate_limiter: RateLimiter,
}

impl SesOutboundSender {
    pub async fn new(region: &str, max_emails_per_second: u32) -> Self {
        let aws_cfg = aws_config::from_env().region(Region::new(region.to_owned())).load().await;

        let quota = NonZeroU32::new(max_emails_per_second).unwrap_or(NonZeroU32::new(1).unwrap());

        SesOutboundSender {
            client: Client::new(&aws_cfg),
            rate_limiter: governor::RateLimiter::direct(Quota::per_second(quota)),
        }
    }
}

fn to_utf8_content(input: &str) -> Result<Content, String> {
    Content::builder()
        .data(input)
        .charset("UTF-8")
        .build()
        .map_err(|e| format!("failed to build email content: {e}"))
}

fn subject_for(handoff: &OutboundHandoff<'_>) -> String {
    let original = handoff.parsed_email.subject.as_deref().unwrap_or("(no subject)");

    match &handoff.subject_prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}{original}"),
        _ => original.to_string(),
    }
}

/// Builds a `multipart/mixed` RFC-5322 message carrying the text/html body
/// plus every inbound attachment unmodified.
fn build_raw_mime(handoff: &OutboundHandoff<'_>, subject: &str) -> Vec<u8> {
    let boundary = format!("----forward-{}", nanoid::nanoid!(16));
    let alt_boundary = format!("----alt-{}", nanoid::nanoid!(16));

    let mut out = String::new();

    out.push_str(&format!("From: {}\r\n", handoff.from_address));
    out.push_str(&format!("To: {}\r\n", handoff.to_addresses.join(", ")));
    out.push_str(&format!("Subject: {subject}\r\n"));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str(&format!("Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"));

    out.push_str(&format!("--{boundary}\r\n"));
    out.push_str(&format!("Content-Type: multipart/alternative; boundary=\"{alt_boundary}\"\r\n\r\n"));

    if let Some(text) = &handoff.parsed_email.text_body {
        out.push_str(&format!("--{alt_boundary}\r\n"));
        out.push_str("Content-Type: text/plain; charset=UTF-8\r\n\r\n");
        out.push_str(text);
        out.push_str("\r\n");
    }

    if let Some(html) = &handoff.parsed_email.html_body {
        out.push_str(&format!("--{alt_boundary}\r\n"));
        out.push_str("Content-Type: text/html; charset=UTF-8\r\n\r\n");
        out.push_str(html);
        out.push_str("\r\n");
    }

    out.push_str(&format!("--{alt_boundary}--\r\n\r\n"));

    for attachment in &handoff.parsed_email.attachments.0 {
        let filename = attachment.filename.clone().unwrap_or_else(|| "attachment".to_string());

        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str(&format!("Content-Type: {}; name=\"{filename}\"\r\n", attachment.content_type));
        out.push_str("Content-Transfer-Encoding: base64\r\n");
        out.push_str(&format!("Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n"));
        out.push_str(&attachment.content_base64);
        out.push_str("\r\n");
    }

    out.push_str(&format!("--{boundary}--\r\n"));

    out.into_bytes()
}

#[async_trait::async_trait]
impl OutboundSender for SesOutboundSender {
    async fn send(&self, handoff: OutboundHandoff<'_>) -> Result<(), String> {
        self.rate_limiter.until_ready().await;

        let subject = subject_for(&handoff);
        let destination = Destination::builder().set_to_addresses(Some(handoff.to_addresses.clone())).build();

        let content = if handoff.include_attachments && !handoff.parsed_email.attachments.is_empty() {
            let raw = build_raw_mime(&handoff, &subject);
            let blob = aws_sdk_sesv2::primitives::Blob::new(raw);

            EmailContent::builder().raw(RawMessage::builder().data(blob).build().map_err(|e| e.to_string())?).build()
        } else {
            let body = Body::builder()
                .html(to_utf8_content(handoff.parsed_email.html_body.as_deref().unwrap_or(""))?)
                .text(to_utf8_content(handoff.parsed_email.text_body.as_deref().unwrap_or(""))?)
                .build();

            let subject_content = to_utf8_content(&subject)?;
            let message = Message::builder().subject(subject_content).body(body).build();

            EmailContent::builder().simple(message).build()
        };

        let mut op = self
            .client
            .send_email()
            .from_email_address(handoff.from_address.clone())
            .destination(destination)
            .content(content)
            .set_configuration_set_name(handoff.configuration_set_name.clone());

        if let Some(source_arn) = &handoff.source_arn {
            op = op.from_email_address_identity_arn(source_arn);
        }

        op.send().await.map(|_| ()).map_err(|e| e.to_string())
    }
}
