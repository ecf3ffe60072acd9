use super::DirectorySource;
use crate::error::SourceError;
use crate::types::RawInstance;
use async_trait::async_trait;
use log::debug;

/// A JSON endpoint publishing an array of [`RawInstance`] records.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl DirectorySource for HttpSource {
    async fn fetch_instances(&self) -> Result<Vec<RawInstance>, SourceError> {
        let instances: Vec<RawInstance> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Fetched {} servers from {}", instances.len(), self.url);
        Ok(instances)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
