//! Host → site configuration resolution backed by the configuration cache.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    application::repos::{OptionsRepo, RepoError},
    cache::SiteConfigCache,
    domain::{document::Document, site_config::SiteConfig},
};

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("invalid configuration for `{host}`: {reason}")]
    InvalidConfiguration { host: String, reason: String },
    #[error("configuration for `{host}` could not be encoded: {reason}")]
    Encode { host: String, reason: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl SiteError {
    fn invalid(host: &str, reason: impl ToString) -> Self {
        Self::InvalidConfiguration {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub struct SiteService {
    options: Arc<dyn OptionsRepo>,
    cache: Arc<SiteConfigCache>,
}

impl SiteService {
    pub fn new(options: Arc<dyn OptionsRepo>, cache: Arc<SiteConfigCache>) -> Self {
        Self { options, cache }
    }

    pub fn cache(&self) -> &SiteConfigCache {
        &self.cache
    }

    /// Resolve the configuration for `host`, populating the cache on a miss.
    ///
    /// A host with no stored document gets an empty one persisted as its baseline.
    pub async fn resolve(&self, host: &str) -> Result<SiteConfig, SiteError> {
        if let Some(serialized) = self.cache.get(host) {
            return SiteConfig::from_json(&serialized).map_err(|err| SiteError::invalid(host, err));
        }

        let stored = match self.options.latest_options(host).await? {
            Some(value) => value,
            None => {
                let baseline = Document::new();
                let id = self.options.insert_options(host, &baseline).await?;
                info!(
                    target = "sitehook::site",
                    host,
                    options_id = %id,
                    "Persisted empty baseline configuration"
                );
                Value::Object(baseline)
            }
        };

        let serialized = serde_json::to_string(&stored).map_err(|err| SiteError::Encode {
            host: host.to_string(),
            reason: err.to_string(),
        })?;
        self.cache.put(host, serialized.clone());
        debug!(target = "sitehook::site", host, "Cached site configuration");

        SiteConfig::from_json(&serialized).map_err(|err| SiteError::invalid(host, err))
    }

    /// Persist a new configuration document for `host` and drop the cached copy.
    pub async fn save(&self, host: &str, config: &SiteConfig) -> Result<(), SiteError> {
        let id = self
            .options
            .insert_options(host, config.as_document())
            .await?;
        self.cache.evict(host);
        info!(
            target = "sitehook::site",
            host,
            options_id = %id,
            "Saved site configuration"
        );
        Ok(())
    }

    pub fn evict(&self, host: &str) -> bool {
        self.cache.evict(host)
    }
}
