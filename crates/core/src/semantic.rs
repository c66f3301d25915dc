use async_trait::async_trait;

use crate::error::StoreError;
use crate::event::EventId;

/// Nearest-neighbour search over event embeddings.
///
/// Implementations return the ids whose similarity to `query` is at least
/// `similarity_threshold` (similarity = 1 - cosine distance).
#[async_trait]
pub trait SemanticMatcher: Send + Sync {
    async fn matching_ids(
        &self,
        query: &str,
        similarity_threshold: f64,
    ) -> Result<Vec<EventId>, StoreError>;
}
