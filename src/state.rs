use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let pg = PgStore::connect(url, config.database_max_connections).await?;
                if let Err(e) = pg.migrate().await {
                    warn!(error = %e, "migration failed; continuing");
                }
                info!("using postgres store");
                Arc::new(pg)
            }
            None => {
                warn!("DATABASE_URL not set; data lives in memory and is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::from_parts(store, config, Arc::new(SystemClock)))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// State over an empty memory store and the system clock.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(test_config()),
            Arc::new(SystemClock),
        )
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        database_url: None,
        database_max_connections: 1,
        jwt: crate::config::JwtConfig {
            secret: "test".into(),
            issuer: "test".into(),
            audience: "test".into(),
        },
        invitation_cleanup_interval_secs: 0,
        host: "127.0.0.1".into(),
        port: 0,
    }
}
