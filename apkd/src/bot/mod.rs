// apkd/src/bot/mod.rs
//! Telegram front end: long-polls for updates and maps chat commands,
//! uploads and button presses onto the scheduler and the intake handler.
use std::sync::Arc;
use std::time::Duration;

use apkd_common::error::{ApkdError, Result};
use apkd_core::Submission;
use apkd_net::telegram::{CallbackQuery, Document, Message, TelegramClient, Update};
use tracing::{debug, error, info, instrument, warn};

use crate::context::AppContext;
use crate::scheduler::trigger_pass;

pub mod render;

use render::{apps_listing, outcome_message, Callback, HELP_TEXT};

const POLL_SECS: u64 = 50;
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct Bot {
    ctx: Arc<AppContext>,
    tg: TelegramClient,
}

impl Bot {
    pub fn new(ctx: Arc<AppContext>, tg: TelegramClient) -> Self {
        Self { ctx, tg }
    }

    pub async fn run(self) {
        info!("Telegram bot polling for updates");
        let mut offset = 0;
        loop {
            let updates = match self.tg.get_updates(offset, POLL_SECS).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Polling Telegram failed: {}", e);
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };
            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.dispatch(update).await;
            }
        }
    }

    async fn dispatch(&self, update: Update) {
        if let Some(query) = update.callback_query {
            self.handle_callback(query).await;
        } else if let Some(message) = update.message {
            self.handle_message(message).await;
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.tg.send_message(&chat_id.to_string(), text, None).await {
            warn!("Failed to reply in chat {}: {}", chat_id, e);
        }
    }

    #[instrument(skip_all, fields(chat = message.chat.id))]
    async fn handle_message(&self, message: Message) {
        let chat_id = message.chat.id;
        let user = message.from.as_ref().map_or(chat_id, |u| u.id);
        if !self.ctx.intake.is_authorized(user) {
            warn!("Ignoring message from unauthorized user {}", user);
            self.reply(chat_id, "⛔ Access denied.").await;
            return;
        }

        if let Some(document) = &message.document {
            self.handle_upload(chat_id, user, document).await;
            return;
        }

        let text = message.text.as_deref().unwrap_or_default().trim();
        // Commands may carry a bot suffix: /apps@my_bot
        let command = text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();
        match command {
            "/start" | "/help" => self.reply(chat_id, HELP_TEXT).await,
            "/apps" => {
                let text = match self.ctx.catalog().load().await {
                    Ok(catalog) => apps_listing(&catalog.apps),
                    Err(e) => {
                        error!("Cannot list apps: {}", e);
                        format!("❌ {}", e.operator_reason())
                    }
                };
                self.reply(chat_id, &text).await;
            }
            "/updateall" => self.start_pass(chat_id).await,
            "/cancel" => {
                let n = self.ctx.intake.cancel_all(user).await;
                self.reply(chat_id, &format!("Discarded {n} pending upload(s).")).await;
            }
            _ => self.reply(chat_id, HELP_TEXT).await,
        }
    }

    async fn start_pass(&self, chat_id: i64) {
        if self.ctx.state.is_pass_running() {
            self.reply(chat_id, "⏳ An update pass is already running.").await;
            return;
        }
        self.reply(chat_id, "🔍 Checking all sources...").await;
        let ctx = Arc::clone(&self.ctx);
        let tg = self.tg.clone();
        tokio::spawn(async move {
            let text = match trigger_pass(&ctx).await {
                Some(report) => format!(
                    "Checked {} apps: {} updated, {} failed.",
                    report.entries.len(),
                    report.updated(),
                    report.failed()
                ),
                None => "❌ The update pass did not run, see the logs.".to_string(),
            };
            if let Err(e) = tg.send_message(&chat_id.to_string(), &text, None).await {
                warn!("Failed to report pass result: {}", e);
            }
        });
    }

    #[instrument(skip_all, fields(file = document.file_name.as_deref().unwrap_or("?")))]
    async fn handle_upload(&self, chat_id: i64, user: i64, document: &Document) {
        let name = document
            .file_name
            .clone()
            .unwrap_or_else(|| "upload.apk".to_string());
        if !name.to_lowercase().ends_with(".apk") {
            self.reply(chat_id, "Only .apk files are accepted.").await;
            return;
        }
        let limit = self.ctx.config.max_upload_bytes;
        if document.file_size.is_some_and(|size| size > limit) {
            self.reply(
                chat_id,
                &format!("File too large (limit {} MiB).", limit / (1024 * 1024)),
            )
            .await;
            return;
        }

        let (text, keyboard) = match self.receive_upload(user, name, document).await {
            Ok(outcome) => outcome_message(&outcome),
            Err(e) => {
                error!("Upload failed: {}", e);
                (format!("❌ {}", e.operator_reason()), None)
            }
        };
        if let Err(e) = self
            .tg
            .send_message(&chat_id.to_string(), &text, keyboard)
            .await
        {
            warn!("Failed to answer upload: {}", e);
        }
    }

    async fn receive_upload(
        &self,
        user: i64,
        name: String,
        document: &Document,
    ) -> Result<apkd_core::IntakeOutcome> {
        let remote = self.tg.get_file(&document.file_id).await?;
        let file_path = remote.file_path.ok_or_else(|| {
            ApkdError::Generic(format!("Telegram has no path for file {}", remote.file_id))
        })?;
        let scratch = self.ctx.intake.scratch_dir()?;
        let artifact = scratch.path().join("upload.apk");
        let bytes = self.tg.download_file(&file_path, &artifact).await?;
        debug!("Received {} ({} bytes)", name, bytes);

        self.ctx
            .intake
            .submit(Submission {
                submitter: user,
                filename_hint: name,
                scratch,
                artifact,
            })
            .await
    }

    async fn handle_callback(&self, query: CallbackQuery) {
        if let Err(e) = self.tg.answer_callback_query(&query.id).await {
            debug!("answerCallbackQuery failed: {}", e);
        }
        let Some(message) = query.message else {
            return;
        };
        let user = query.from.id;
        let Some(callback) = query.data.as_deref().and_then(Callback::parse) else {
            warn!("Ignoring unknown callback data {:?}", query.data);
            return;
        };

        let intake = &self.ctx.intake;
        let result = match callback {
            Callback::Select { id, index } => intake.select(user, id, index).await,
            Callback::Confirm { id } => intake.confirm(user, id).await,
            Callback::Cancel { id } => intake.cancel(user, id).await,
        };
        let (text, keyboard) = match result {
            Ok(outcome) => outcome_message(&outcome),
            // The pending upload is kept; leave its buttons in place.
            Err(ApkdError::InvalidSelection(reason)) => {
                self.reply(message.chat.id, &format!("❌ invalid selection: {reason}"))
                    .await;
                return;
            }
            Err(ApkdError::NotAuthorized(_)) => {
                self.reply(message.chat.id, "⛔ Access denied.").await;
                return;
            }
            Err(e) => {
                error!("Callback {:?} failed: {}", callback, e);
                (format!("❌ {}", e.operator_reason()), None)
            }
        };
        if let Err(e) = self
            .tg
            .edit_message_text(message.chat.id, message.message_id, &text, keyboard)
            .await
        {
            warn!("Failed to update message: {}", e);
        }
    }
}
