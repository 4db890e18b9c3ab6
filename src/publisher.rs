//! Hand-off of the accepted item to whatever announces it.

use crate::error::PublishError;
use crate::models::NewsItem;
use crate::utils::truncate_for_log;
use tracing::{info, instrument};

/// Announces an accepted item. Called exactly once per accepted run.
pub trait Publisher {
    async fn post(&self, item: &NewsItem) -> Result<(), PublishError>;
}

/// Publisher that only records the post in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    #[instrument(level = "info", skip_all, fields(guid = %item.guid))]
    async fn post(&self, item: &NewsItem) -> Result<(), PublishError> {
        info!(
            title = %item.title,
            kind = %item.kind,
            published_at = %item.published_at,
            image = ?item.image_path,
            description = %truncate_for_log(&item.description, 200),
            "Posting news item"
        );
        Ok(())
    }
}
