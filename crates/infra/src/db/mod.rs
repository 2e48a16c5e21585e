use flatmate_domain::ports::BoxFuture;
use flatmate_domain::ports::db::{DbAdapter, DbError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub database: String,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.mongo_uri.clone(),
            database: config.mongo_db.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoAdapter {
    config: DbConfig,
}

impl MongoAdapter {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }
}

impl DbAdapter for MongoAdapter {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    fn health_check(&self) -> BoxFuture<'_, Result<(), DbError>> {
        let endpoint = self.config.endpoint.clone();
        let database = self.config.database.clone();

        Box::pin(async move {
            let address = parse_socket_address(&endpoint)?;
            let connect = timeout(Duration::from_secs(2), TcpStream::connect(address))
                .await
                .map_err(|_| DbError::Unavailable("mongo endpoint connect timed out".to_string()))?;
            connect.map_err(|err| {
                DbError::Unavailable(format!("mongo endpoint connect failed: {err}"))
            })?;

            tracing::debug!(endpoint, database, "mongo health check succeeded");
            Ok(())
        })
    }
}

fn parse_socket_address(endpoint: &str) -> Result<String, DbError> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("mongodb://{endpoint}")
    };
    let parsed = Url::parse(&normalized)
        .map_err(|err| DbError::Unavailable(format!("invalid mongo endpoint '{endpoint}': {err}")))?;

    let host = parsed.host_str().ok_or_else(|| {
        DbError::Unavailable(format!("missing mongo host in endpoint '{endpoint}'"))
    })?;
    let port = parsed.port().unwrap_or(27017);
    Ok(format!("{host}:{port}"))
}
