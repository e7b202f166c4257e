use async_trait::async_trait;

/// Fan-out of one text frame to every live subscriber.
///
/// Implementations evict peers whose send fails before returning, so the next
/// call never reaches a dead entry.
#[async_trait]
pub trait BroadcastPort: Send + Sync {
    async fn broadcast(&self, text: &str);

    /// Number of subscribers currently registered.
    async fn size(&self) -> usize;
}
