use super::types::{BackendKind, ConversionTicket, DownloadLink, MediaCatalog};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &'static str;

    fn kind(&self) -> BackendKind;

    /// Resolve a source URL into its catalog of variants
    async fn resolve(&self, url: &str) -> Result<MediaCatalog>;

    /// Exchange a ticket produced by [`Backend::resolve`] for a download link
    async fn convert(&self, ticket: &ConversionTicket) -> Result<DownloadLink>;
}
