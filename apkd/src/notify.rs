// apkd/src/notify.rs
//! Renders notifications and forwards them to the operator chat.
use apkd_common::Notification;
use apkd_net::TelegramClient;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub fn render(notification: &Notification) -> String {
    match notification {
        Notification::Added { title, version } => {
            format!("🆕 Added: {title}\nVersion: {version}")
        }
        Notification::Updated { title, from, to } => {
            format!("🔄 Updated: {title}\nVersion: {from} → {to}")
        }
        Notification::Failed { title, reason } => format!("❌ {reason}: {title}"),
        Notification::PassSummary { updated } => {
            format!("Update pass finished: {updated} updated")
        }
    }
}

/// Delivers notifications until every sender is dropped. Without a bot
/// token or chat id they are only logged.
pub fn spawn_forwarder(
    mut rx: UnboundedReceiver<Notification>,
    telegram: Option<TelegramClient>,
    chat_id: Option<String>,
) -> JoinHandle<()> {
    let sink = telegram.zip(chat_id);
    if sink.is_none() {
        debug!("Telegram notifications disabled (TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID unset)");
    }
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let text = render(&notification);
            info!("Notification: {}", text.replace('\n', " / "));
            if let Some((tg, chat_id)) = &sink {
                if let Err(e) = tg.send_message(chat_id, &text, None).await {
                    warn!("Failed to deliver notification: {}", e);
                }
            }
        }
        debug!("Notification forwarder stopped");
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn renders_operator_texts() {
        assert_eq!(
            render(&Notification::Added {
                title: "Kino".into(),
                version: "1.0".into()
            }),
            "🆕 Added: Kino\nVersion: 1.0"
        );
        assert_eq!(
            render(&Notification::Updated {
                title: "Kino".into(),
                from: "1.0".into(),
                to: "1.1".into()
            }),
            "🔄 Updated: Kino\nVersion: 1.0 → 1.1"
        );
        assert_eq!(
            render(&Notification::Failed {
                title: "Kino".into(),
                reason: "download failed".into()
            }),
            "❌ download failed: Kino"
        );
        assert_eq!(
            render(&Notification::PassSummary { updated: 2 }),
            "Update pass finished: 2 updated"
        );
    }

    #[tokio::test]
    async fn forwarder_stops_when_senders_are_gone() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = spawn_forwarder(rx, None, None);
        tx.send(Notification::PassSummary { updated: 1 }).unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
