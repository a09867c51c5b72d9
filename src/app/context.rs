use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{AnifeedError, Result};
use crate::config::Config;
use crate::notifier::{Notifier, WebhookNotifier};
use crate::source::{ActivitySource, AniListSource};
use crate::store::SqliteStore;

/// Wires together the store and the external collaborators.
///
/// All components are injected rather than reached through globals, so tests
/// can assemble a context from scripted sources and notifiers.
pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub source: Arc<dyn ActivitySource + Send + Sync>,
    pub notifier: Arc<dyn Notifier + Send + Sync>,
    pub config: Config,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.database_path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let source: Arc<dyn ActivitySource + Send + Sync> = Arc::new(AniListSource::new());
        let notifier: Arc<dyn Notifier + Send + Sync> = Arc::new(WebhookNotifier::new());

        Ok(Self {
            store,
            source,
            notifier,
            config,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| AnifeedError::Other("Could not find data directory".into()))?;
        let anifeed_dir = data_dir.join("anifeed");
        std::fs::create_dir_all(&anifeed_dir)?;
        Ok(anifeed_dir.join("anifeed.db"))
    }
}
