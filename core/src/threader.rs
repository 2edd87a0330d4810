//! RFC-2822 header-based conversation threading with normalized-subject
//! fallback (C3).

use chrono::{Duration, Utc};
use entity::structured_email;
use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::PipelineError;
use crate::persistence::Persistence;

/// Subject threads must stay within this window of the thread's last
/// message to be matched by the fallback path.
const SUBJECT_THREAD_WINDOW_DAYS: i64 = 30;

/// Subjects shorter than this after prefix stripping are disqualified from
/// subject-based threading (too generic to be a reliable signal).
const MIN_NORMALIZED_SUBJECT_LEN: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadAttachment {
    pub thread_id: String,
    pub thread_position: i32,
    pub is_new_thread: bool,
}

lazy_static! {
    static ref REPLY_PREFIX: Regex =
        Regex::new(r"(?i)^(re|r|fwd|fw|aw|wg|vs|sv):\s*").expect("static regex is valid");
}

/// Strips any number of leading `Re:`/`R:`/`Fwd:`/`Fw:`/`Aw:`/`Wg:`/`Vs:`/`Sv:`
/// prefixes (case-insensitive) and lowercases the result.
pub fn normalize_subject(subject: &str) -> String {
    let mut current = subject.trim().to_string();

    loop {
        let replaced = REPLY_PREFIX.replace(&current, "").trim().to_string();
        if replaced == current {
            break;
        }
        current = replaced;
    }

    current.to_lowercase()
}

/// Normalizes the candidate Message-IDs on `email` (its own `messageId`,
/// `inReplyTo`, and each `references` entry) into the set `M` spec.md §4.2
/// describes: stripped of `<` `>` and surrounding whitespace, deduplicated.
fn candidate_message_ids(email: &structured_email::Model) -> Vec<String> {
    let mut ids = Vec::new();

    if let Some(id) = &email.message_id {
        ids.push(normalize_message_id(id));
    }
    if let Some(id) = &email.in_reply_to {
        ids.push(normalize_message_id(id));
    }
    for id in &email.references.0 {
        ids.push(normalize_message_id(id));
    }

    ids.sort();
    ids.dedup();
    ids
}

fn normalize_message_id(raw: &str) -> String {
    raw.trim().trim_start_matches('<').trim_end_matches('>').to_string()
}

/// Assigns `email` a `threadId`/`threadPosition`, creating a new thread when
/// no candidate attaches it to an existing one.
pub async fn thread_email(
    persistence: &dyn Persistence,
    email: &structured_email::Model,
) -> Result<ThreadAttachment, PipelineError> {
    let candidates = candidate_message_ids(email);
    let had_reply_headers = email.in_reply_to.is_some() || !email.references.is_empty();

    let thread_id = if !candidates.is_empty() {
        persistence
            .find_thread_id_by_message_ids(&email.user_id, &candidates)
            .await?
    } else {
        None
    };

    let (thread_id, is_new_thread) = if let Some(id) = thread_id {
        (id, false)
    } else if !had_reply_headers {
        match subject_fallback(persistence, email).await? {
            Some(id) => (id, false),
            None => (create_new_thread(persistence, email).await?, true),
        }
    } else {
        (create_new_thread(persistence, email).await?, true)
    };

    let participants = participant_addresses(email);
    let message_at = email.date.unwrap_or_else(Utc::now);

    let position = persistence
        .attach_structured_email_to_thread(&thread_id, &email.id, participants, message_at)
        .await?;

    Ok(ThreadAttachment {
        thread_id,
        thread_position: position,
        is_new_thread,
    })
}

async fn subject_fallback(
    persistence: &dyn Persistence,
    email: &structured_email::Model,
) -> Result<Option<String>, PipelineError> {
    let normalized = normalize_subject(email.subject.as_deref().unwrap_or(""));

    if normalized.len() < MIN_NORMALIZED_SUBJECT_LEN {
        return Ok(None);
    }

    let since = Utc::now() - Duration::days(SUBJECT_THREAD_WINDOW_DAYS);

    let thread = persistence
        .find_thread_by_subject_window(&email.user_id, &normalized, since)
        .await?;

    Ok(thread.map(|t| t.id))
}

async fn create_new_thread(
    persistence: &dyn Persistence,
    email: &structured_email::Model,
) -> Result<String, PipelineError> {
    let root_message_id = email
        .message_id
        .clone()
        .unwrap_or_else(|| email.id.clone());

    let normalized_subject = normalize_subject(email.subject.as_deref().unwrap_or(""));
    let participants = participant_addresses(email);
    let last_message_at = email.date.unwrap_or_else(Utc::now);

    let thread = persistence
        .create_thread(
            &email.user_id,
            &root_message_id,
            &normalized_subject,
            participants,
            last_message_at,
        )
        .await?;

    Ok(thread.id)
}

fn participant_addresses(email: &structured_email::Model) -> Vec<String> {
    let mut participants = Vec::new();
    participants.extend(email.from_data.lowercased_addresses());
    participants.extend(email.to_data.lowercased_addresses());
    participants.extend(email.cc_data.lowercased_addresses());
    participants.sort();
    participants.dedup();
    participants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_subject_strips_multiple_prefixes() {
        assert_eq!(normalize_subject("Re: Fwd: Re: hi"), "hi");
        assert_eq!(normalize_subject("fwd: FW: hello world"), "hello world");
        assert_eq!(normalize_subject("just a subject"), "just a subject");
    }

    #[test]
    fn normalize_subject_is_case_insensitive_on_prefixes() {
        assert_eq!(normalize_subject("RE: Hi"), "hi");
        assert_eq!(normalize_subject("Aw: Hallo"), "hallo");
    }

    #[test]
    fn normalize_message_id_strips_brackets_and_whitespace() {
        assert_eq!(normalize_message_id("  <abc@example.com>  "), "abc@example.com");
    }
}
