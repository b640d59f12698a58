use crate::app::RunPage;
use async_trait::async_trait;
use color_eyre::eyre::{Report, Result};

/// Remote source of application runs.
#[async_trait]
pub trait RunSource: Send + Sync {
    /// Fetches `limit` runs of application `entity` starting at `offset`.
    async fn fetch_runs(&self, entity: &str, offset: usize, limit: usize) -> Result<RunPage>;
}

/// Shows a failure to the user. Must not block.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &Report);
}
