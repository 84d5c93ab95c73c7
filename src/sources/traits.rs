use crate::error::SourceError;
use crate::models::Listing;
use async_trait::async_trait;

/// Common trait for all listing sources
/// This allows easy addition of new landlords (Vonovia, Immowelt, etc) in the future
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch and normalize the provider's current offers. Must not block
    /// sibling adapters; parse trouble degrades to a best-effort list or a
    /// typed error, never a panic.
    async fn fetch(&self) -> Result<Vec<Listing>, SourceError>;

    /// Get the name of the listing provider
    fn provider(&self) -> &'static str;
}
