// apkd/src/context.rs
use std::sync::Arc;

use apkd_common::error::Result;
use apkd_common::Config;
use apkd_core::{ArtifactStore, IntakeHandler, MetadataRepository, Notifier, Reconciler, UpdateState};
use apkd_net::{build_http_client, TelegramClient};
use reqwest::Client;
use tokio::task::JoinHandle;

use crate::notify::spawn_forwarder;

/// Everything a command needs, built once per process.
pub struct AppContext {
    pub config: Config,
    pub client: Client,
    pub state: Arc<UpdateState>,
    pub notifier: Notifier,
    pub reconciler: Reconciler,
    pub intake: IntakeHandler,
    pub telegram: Option<TelegramClient>,
}

impl AppContext {
    /// Also starts the notification forwarder; its handle completes once
    /// every clone of the context's notifier is gone.
    pub fn build(config: Config) -> Result<(Arc<Self>, JoinHandle<()>)> {
        let client = build_http_client(config.download_timeout)?;
        let telegram = config
            .telegram_bot_token
            .as_ref()
            .map(|token| TelegramClient::new(client.clone(), token.clone()));

        let (notifier, rx) = Notifier::channel();
        let forwarder = spawn_forwarder(rx, telegram.clone(), config.telegram_chat_id.clone());

        let state = Arc::new(UpdateState::new());
        let reconciler = Reconciler::new(&config, client.clone(), Arc::clone(&state), notifier.clone());
        let intake = IntakeHandler::new(&config, client.clone(), Arc::clone(&state), notifier.clone());

        Ok((
            Arc::new(Self {
                config,
                client,
                state,
                notifier,
                reconciler,
                intake,
                telegram,
            }),
            forwarder,
        ))
    }

    pub fn catalog(&self) -> MetadataRepository {
        MetadataRepository::new(&self.config.catalog_path)
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(self.client.clone(), &self.config)
    }
}
