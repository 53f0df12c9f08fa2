//! `feed` adapter: a JSON array of raw records on disk.
//!
//! Used for hand-curated listings and for records produced by external
//! extractors. Field names follow [`RawEventRecord`].

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use agenda_shared::{AgendaError, RawEventRecord, Result, expand_home};

use super::SourceAdapter;

pub struct FeedAdapter {
    name: String,
    path: PathBuf,
}

impl FeedAdapter {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: expand_home(path),
        }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(source = %self.name, path = %self.path.display()))]
    async fn fetch(&self) -> Result<Vec<RawEventRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AgendaError::io(&self.path, e))?;

        let mut records: Vec<RawEventRecord> = serde_json::from_str(&content).map_err(|e| {
            AgendaError::parse(format!("{}: invalid feed: {e}", self.path.display()))
        })?;

        for record in &mut records {
            if record.source.is_empty() {
                record.source = self.name.clone();
            }
        }

        debug!(records = records.len(), "feed loaded");
        Ok(records)
    }
}
