// apkd/src/bot/render.rs
//! Chat texts, inline keyboards and callback payloads.
use apkd_common::AppRecord;
use apkd_core::{ConfirmReason, IntakeOutcome};
use apkd_net::telegram::{InlineButton, InlineKeyboard};
use uuid::Uuid;

pub const HELP_TEXT: &str = "APK catalog bot\n\n\
/apps - list catalog entries\n\
/updateall - check every source now\n\
/cancel - discard pending uploads\n\n\
Send an .apk file to publish it for an existing app.";

/// Decoded inline-keyboard payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Select { id: Uuid, index: usize },
    Confirm { id: Uuid },
    Cancel { id: Uuid },
}

impl Callback {
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.splitn(3, ':');
        let kind = parts.next()?;
        let id = Uuid::parse_str(parts.next()?).ok()?;
        let rest = parts.next();
        match (kind, rest) {
            ("sel", Some(index)) => Some(Callback::Select {
                id,
                index: index.parse().ok()?,
            }),
            ("ok", None) => Some(Callback::Confirm { id }),
            ("no", None) => Some(Callback::Cancel { id }),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Callback::Select { id, index } => format!("sel:{id}:{index}"),
            Callback::Confirm { id } => format!("ok:{id}"),
            Callback::Cancel { id } => format!("no:{id}"),
        }
    }
}

pub fn confirmation_prompt(
    title: &str,
    recorded: &str,
    submitted: &str,
    reason: ConfirmReason,
) -> String {
    match reason {
        ConfirmReason::Older => format!(
            "⚠️ {title}: uploaded version {submitted} is older than the published {recorded}. Replace anyway?"
        ),
        ConfirmReason::SameVersion => format!(
            "⚠️ {title}: version {submitted} is already published. Replace it with this build?"
        ),
        ConfirmReason::UnknownVersion => format!(
            "⚠️ {title}: the uploaded file's version could not be read (published: {recorded}). Replace anyway?"
        ),
    }
}

/// Reply text and keyboard for an intake result.
pub fn outcome_message(outcome: &IntakeOutcome) -> (String, Option<InlineKeyboard>) {
    match outcome {
        IntakeOutcome::NeedsSelection {
            id,
            candidates,
            matched,
        } => {
            let text = if *matched {
                "Several apps match this file. Which one is it?"
            } else {
                "No app matches this file name. Which one is it?"
            };
            let mut rows: InlineKeyboard = candidates
                .iter()
                .map(|c| {
                    vec![InlineButton::new(
                        format!("{} ({})", c.title, c.version),
                        Callback::Select {
                            id: *id,
                            index: c.index,
                        }
                        .encode(),
                    )]
                })
                .collect();
            rows.push(vec![cancel_button(*id)]);
            (text.to_string(), Some(rows))
        }
        IntakeOutcome::NeedsConfirmation {
            id,
            title,
            recorded,
            submitted,
            reason,
        } => (
            confirmation_prompt(title, recorded, submitted, *reason),
            Some(vec![vec![
                InlineButton::new("✅ Replace", Callback::Confirm { id: *id }.encode()),
                cancel_button(*id),
            ]]),
        ),
        IntakeOutcome::Committed { title, change } => (
            format!("✅ {title} is now at version {}", change.version()),
            None,
        ),
        IntakeOutcome::Cancelled => ("Upload discarded.".to_string(), None),
    }
}

fn cancel_button(id: Uuid) -> InlineButton {
    InlineButton::new("✖ Cancel", Callback::Cancel { id }.encode())
}

pub fn apps_listing(apps: &[AppRecord]) -> String {
    if apps.is_empty() {
        return "The catalog is empty.".to_string();
    }
    let mut text = format!("{} apps:\n", apps.len());
    for app in apps {
        let method = match app.source() {
            None => "manual".to_string(),
            Some(Ok(d)) => d.method.to_string(),
            Some(Err(_)) => "misconfigured".to_string(),
        };
        text.push_str(&format!(
            "\n• {} {} ({})",
            app.title,
            app.version_or_unknown(),
            method
        ));
    }
    text
}
