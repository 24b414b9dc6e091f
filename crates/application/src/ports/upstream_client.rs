use async_trait::async_trait;
use hickory_proto::op::Message;
use sans_domain::{DomainError, UpstreamGroup};

/// One logical client per upstream group.
///
/// Implementations own transaction-id mapping: the returned message
/// carries whatever id the upstream used, the caller restores the
/// client's id. Failures of one group never affect another.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, group: &UpstreamGroup, request: &Message)
        -> Result<Message, DomainError>;
}
