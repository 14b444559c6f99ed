//! Unified error type for Raidforge.

use std::path::PathBuf;

use raidforge_protocol::ProtocolError;
use raidforge_raid::RaidError;
use raidforge_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `raidforge` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
#[derive(Debug, thiserror::Error)]
pub enum RaidforgeError {
    /// A raid operation was rejected or failed.
    #[error(transparent)]
    Raid(#[from] RaidError),

    /// The durable store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A record could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`ServiceConfig`](crate::ServiceConfig).
    #[error("invalid config {path}: {source}")]
    ConfigFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The builder was started without a required collaborator.
    #[error("no {0} configured")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use raidforge_protocol::{PlayerId, SessionId};

    use super::*;

    #[test]
    fn test_from_raid_error() {
        let err: RaidforgeError = RaidError::Full(SessionId(4)).into();
        assert!(matches!(err, RaidforgeError::Raid(RaidError::Full(_))));
        assert!(err.to_string().contains("full"));
    }

    #[test]
    fn test_from_store_error() {
        let err: RaidforgeError =
            StoreError::ParticipantNotFound(SessionId(1), PlayerId(2)).into();
        assert!(matches!(err, RaidforgeError::Store(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: RaidforgeError = ProtocolError::InvalidRecord("bad".into()).into();
        assert!(matches!(err, RaidforgeError::Protocol(_)));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_missing_names_the_collaborator() {
        assert_eq!(RaidforgeError::Missing("messenger").to_string(), "no messenger configured");
    }
}
