use std::sync::Arc;

use flatmate_domain::ports::chat::ChatRepository;
use flatmate_domain::ports::db::DbAdapter;
use flatmate_domain::ports::users::UserDirectory;
use flatmate_domain::realtime::ChatRealtimeHub;
use flatmate_infra::config::AppConfig;
use flatmate_infra::db::{DbConfig, MongoAdapter};
use flatmate_infra::repositories::{InMemoryChatRepository, InMemoryUserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub chat_repo: Arc<dyn ChatRepository>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub chat_realtime: Arc<ChatRealtimeHub>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        if config.data_backend.eq_ignore_ascii_case("mongo") {
            let adapter = MongoAdapter::new(DbConfig::from_app_config(&config));
            if let Err(err) = adapter.health_check().await {
                tracing::warn!(error = %err, backend = adapter.name(), "store health check failed");
            }
        }

        Ok(Self::with_repositories(
            config,
            Arc::new(InMemoryChatRepository::new()),
            Arc::new(InMemoryUserDirectory::new()),
        ))
    }

    pub fn with_repositories(
        config: AppConfig,
        chat_repo: Arc<dyn ChatRepository>,
        user_directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let chat_realtime = Arc::new(ChatRealtimeHub::new(config.chat_realtime_buffer));
        Self {
            config,
            chat_repo,
            user_directory,
            chat_realtime,
        }
    }
}
