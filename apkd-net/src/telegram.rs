// apkd-net/src/telegram.rs
//! Minimal Telegram Bot API client: the calls the notifier and the chat
//! front end need, nothing more.
use std::path::Path;
use std::time::Duration;

use apkd_common::error::{ApkdError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::http::download_to_file_as;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Rows of inline buttons.
pub type InlineKeyboard = Vec<Vec<InlineButton>>;

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self::with_api_base(client, token, DEFAULT_API_BASE)
    }

    /// Client talking to a different Bot API server (self-hosted or test).
    pub fn with_api_base(
        client: Client,
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        debug!("Telegram API call: {}", method);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApkdError::Generic(format!("Telegram {method} failed: {}", e.without_url())))?;
        let status = response.status();
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ApkdError::Generic(format!("Telegram {method} returned HTTP {status}: {}", e.without_url())))?;
        if !parsed.ok {
            let description = parsed.description.unwrap_or_default();
            warn!("Telegram {} rejected: {} {}", method, status, description);
            return Err(ApkdError::Generic(format!(
                "Telegram {method} rejected: {description}"
            )));
        }
        parsed
            .result
            .ok_or_else(|| ApkdError::Generic(format!("Telegram {method} returned no result")))
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<Message> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(rows) = keyboard {
            body["reply_markup"] = json!({ "inline_keyboard": rows });
        }
        self.call("sendMessage", body, Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .await
    }

    /// Replaces a message's text, dropping its keyboard unless a new one is
    /// given.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(rows) = keyboard {
            body["reply_markup"] = json!({ "inline_keyboard": rows });
        }
        self.call::<Value>("editMessageText", body, Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .await
            .map(|_| ())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        self.call::<bool>(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_query_id }),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
        .await
        .map(|_| ())
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, poll_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": poll_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
            Duration::from_secs(poll_secs + REQUEST_TIMEOUT_SECS),
        )
        .await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<RemoteFile> {
        self.call(
            "getFile",
            json!({ "file_id": file_id }),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
        .await
    }

    /// Downloads a file previously located with [`get_file`](Self::get_file).
    /// The download URL carries the token, so logs and errors only name
    /// `file_path`.
    pub async fn download_file(&self, file_path: &str, dest: &Path) -> Result<u64> {
        let url = format!("{}/file/bot{}/{}", self.api_base, self.token, file_path);
        let label = format!("telegram file {file_path}");
        download_to_file_as(&self.client, &url, &label, dest).await
    }
}
