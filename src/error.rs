//! Error types for dataset-dl
//!
//! Three tiers, matching how far a failure is allowed to propagate:
//! - [`Error`]: run-level failures that abort the whole pipeline
//! - [`PlanError`]: shard accounting inconsistencies, fatal before any
//!   worker starts
//! - [`FetchError`]: per-row failures inside a shard worker; these never
//!   propagate, they degrade to a failure sentinel in the provenance log

use thiserror::Error;

/// Result type alias for dataset-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dataset-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "shard_count")
        key: Option<String>,
    },

    /// Shard planning inconsistency (fatal to the run, detected before any worker starts)
    #[error("shard planning error: {0}")]
    Plan(#[from] PlanError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (HTTP client construction; per-request failures stay row-scoped)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Shard accounting errors raised by the planner.
///
/// Any of these means the partition would not reconstruct the input row
/// sequence exactly, so the run aborts rather than downloading into a
/// misaligned output tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Shard count of zero can never partition anything
    #[error("shard count must be nonzero")]
    ZeroShards,

    /// The dataset ran out of rows before a shard reached its planned size
    #[error("shard {shard} received {actual} rows, planned {planned}")]
    ShardUnderfilled {
        /// Shard id that could not be filled
        shard: usize,
        /// Planned row count for this shard
        planned: usize,
        /// Rows actually available
        actual: usize,
    },

    /// Rows remained after every shard reached its planned size
    #[error("{count} rows left unassigned after partitioning")]
    RowsUnassigned {
        /// Number of leftover rows
        count: usize,
    },
}

/// Row-scoped fetch failures.
///
/// A shard worker catches every variant, records the failure sentinel in
/// the provenance log, and moves on to the next row.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed at all
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// URL parsed but uses a scheme we do not fetch
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Request failed: DNS, connect, timeout, or a non-success status
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Writing or renaming the downloaded file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_error_messages_name_the_mismatch() {
        let err = PlanError::ShardUnderfilled {
            shard: 3,
            planned: 10,
            actual: 7,
        };
        assert_eq!(err.to_string(), "shard 3 received 7 rows, planned 10");

        let err = PlanError::RowsUnassigned { count: 5 };
        assert_eq!(err.to_string(), "5 rows left unassigned after partitioning");
    }

    #[test]
    fn plan_error_converts_into_run_error() {
        let err: Error = PlanError::ZeroShards.into();
        assert!(
            err.to_string().contains("shard count must be nonzero"),
            "wrapped message should surface the planning detail, got: {err}"
        );
    }

    #[test]
    fn config_error_displays_message() {
        let err = Error::Config {
            message: "max_parallel must be nonzero".to_string(),
            key: Some("max_parallel".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "configuration error: max_parallel must be nonzero"
        );
    }
}
