//! Conversation repository trait.
//!
//! Defines the interface for persisting the whole container collection.

use super::model::Container;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for the versioned conversation collection.
///
/// The store keeps the working copy in memory and hands the complete,
/// ordered collection to [`persist_all`](Self::persist_all) after every
/// mutation. Implementations decide how that collection is encoded and where
/// it lives (JSON file, in-memory table for tests, ...).
///
/// # Implementation Notes
///
/// Implementations should handle:
/// - Recognising legacy flat records and migrating them while loading
/// - Replacing the persisted collection atomically
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Loads every persisted container in stored order.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Container>)`: All containers (empty if nothing was stored yet)
    /// - `Err(_)`: The stored collection could not be read or decoded
    async fn load_all(&self) -> Result<Vec<Container>>;

    /// Replaces the persisted collection with `containers`.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Collection written
    /// - `Err(_)`: Encoding or writing failed; the previous copy is intact
    async fn persist_all(&self, containers: &[Container]) -> Result<()>;
}
