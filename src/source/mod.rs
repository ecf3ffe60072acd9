use async_trait::async_trait;
use futures_util::future::join_all;
use log::warn;

use crate::error::SourceError;
use crate::types::RawInstance;

pub mod http;
pub use http::HttpSource;

#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetch a fresh, unordered snapshot of the advertised servers.
    async fn fetch_instances(&self) -> Result<Vec<RawInstance>, SourceError>;

    /// Short human readable name used in logs.
    fn describe(&self) -> String;
}

/// Several sources fetched concurrently and concatenated in configured order.
///
/// A failing member is logged and skipped; the composite only fails when
/// every member does.
pub struct CompositeSource {
    sources: Vec<Box<dyn DirectorySource>>,
}

impl CompositeSource {
    pub fn new(sources: Vec<Box<dyn DirectorySource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl DirectorySource for CompositeSource {
    async fn fetch_instances(&self) -> Result<Vec<RawInstance>, SourceError> {
        if self.sources.is_empty() {
            return Err(SourceError::Unavailable("no sources configured".into()));
        }

        let results = join_all(self.sources.iter().map(|s| s.fetch_instances())).await;

        let mut instances = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(mut batch) => instances.append(&mut batch),
                Err(e) => {
                    warn!("Directory source {} failed: {}", source.describe(), e);
                    failures.push(format!("{}: {}", source.describe(), e));
                }
            }
        }

        if failures.len() == self.sources.len() {
            return Err(SourceError::Unavailable(failures.join("; ")));
        }
        Ok(instances)
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        format!("[{}]", names.join(", "))
    }
}
