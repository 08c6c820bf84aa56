//! Error taxonomy for the sync layer.
//!
//! Every variant is caught at the boundary where it happens and logged; none of
//! them ends the event loop.

use thiserror::Error;

use crate::entity::CollectionId;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Store configuration missing or malformed. Resolves to demo mode.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Sign-in failed or the session was lost. Resolves to demo mode.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// A single collection listener failed; that collection keeps stale data.
    #[error("subscription error on {collection}: {message}")]
    Subscription {
        collection: CollectionId,
        message: String,
    },

    /// A live write was rejected; it is not applied anywhere.
    #[error("write error on {collection}: {message}")]
    Write {
        collection: CollectionId,
        message: String,
    },

    /// User input rejected before reaching the writer.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl SyncError {
    pub fn write(collection: CollectionId, message: impl Into<String>) -> Self {
        Self::Write {
            collection,
            message: message.into(),
        }
    }

    pub fn subscription(collection: CollectionId, message: impl Into<String>) -> Self {
        Self::Subscription {
            collection,
            message: message.into(),
        }
    }

    /// True when the failure means the store no longer accepts our identity.
    pub fn is_auth_loss(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}
