// apkd-core/src/notifier.rs
use apkd_common::Notification;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Fire-and-forget handle to the notification sink. Sending never fails
/// the caller; a closed or absent sink is only logged.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Notifier whose messages are only logged.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, notification: Notification) {
        match &self.tx {
            Some(tx) => {
                if let Err(e) = tx.send(notification) {
                    warn!("Notification sink closed, dropping {:?}", e.0);
                }
            }
            None => debug!("Notifications disabled, dropping {:?}", notification),
        }
    }
}
