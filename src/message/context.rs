//! Per-publish context and publish results.

use crate::bus::TierKind;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Context shared by every handler invoked for one publish.
///
/// Cancellation is cooperative: the broker stops dispatching further
/// handlers once the token fires, but a running handler only stops if
/// it checks [`PublishContext::is_cancelled`] or awaits
/// [`PublishContext::cancelled`] itself.
#[derive(Debug, Clone)]
pub struct PublishContext {
    /// Unique identifier for this publish
    pub publish_id: Uuid,

    /// Timestamp when the publish started
    pub published_at: DateTime<Utc>,

    /// Readable name of the message type
    pub message_type: &'static str,

    /// Tier the message was published on
    pub tier: TierKind,

    cancellation: CancellationToken,
}

impl PublishContext {
    /// Create a new context with a generated publish ID
    pub fn new(message_type: &'static str, tier: TierKind, cancellation: CancellationToken) -> Self {
        Self {
            publish_id: Uuid::new_v4(),
            published_at: Utc::now(),
            message_type,
            tier,
            cancellation,
        }
    }

    /// Whether the publisher asked to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the publisher asks to stop
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// The token driving this publish
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Outcome of a publish that reached every handler in its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Identifier shared with the handlers' [`PublishContext`]
    pub publish_id: Uuid,

    /// Readable name of the message type
    pub message_type: &'static str,

    /// Number of handlers that completed
    pub delivered: usize,
}

impl PublishReceipt {
    pub(crate) fn new(context: &PublishContext, delivered: usize) -> Self {
        Self {
            publish_id: context.publish_id,
            message_type: context.message_type,
            delivered,
        }
    }

    /// Receipt for a publish that found no registry to deliver to
    pub(crate) fn empty(message_type: &'static str) -> Self {
        Self {
            publish_id: Uuid::new_v4(),
            message_type,
            delivered: 0,
        }
    }
}

impl fmt::Display for PublishReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] delivered to {} handler(s)",
            self.message_type, self.publish_id, self.delivered
        )
    }
}
