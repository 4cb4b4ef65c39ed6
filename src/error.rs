//! Error types for the gallery core.
//!
//! List-level failures end the current load and are shown to the user.
//! Per-image failures never leave the resolver: they are logged and replaced
//! by fallback dimensions.

use std::time::Duration;

use thiserror::Error;

/// Transport failure while talking to the network.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("invalid url {0}")]
    InvalidUrl(String),
}

/// Failure to obtain the image listing.
#[derive(Debug, Error)]
pub enum ListFetchError {
    #[error(transparent)]
    Network(#[from] FetchError),
    #[error("image list endpoint {url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("image list is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("failed to read image directory: {0}")]
    Io(String),
}

/// Failure to discover the dimensions of one image.
#[derive(Debug, Error)]
pub enum DimensionError {
    #[error("failed to load {image}: {reason}")]
    Load { image: String, reason: String },
    #[error("failed to decode {image}: {reason}")]
    Decode { image: String, reason: String },
    #[error("{image} reports a zero dimension")]
    ZeroSized { image: String },
    #[error("loading {image} timed out after {timeout:?}")]
    Timeout { image: String, timeout: Duration },
}

/// Failure inside the offline response cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("response store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("precaching {url} failed with status {status}")]
    Install { url: String, status: u16 },
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_error_messages() {
        let err = ListFetchError::Status {
            url: "http://localhost/list".to_string(),
            status: 503,
        };
        assert_eq!(
            err.to_string(),
            "image list endpoint http://localhost/list answered with status 503"
        );

        let parse = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let err = ListFetchError::from(parse);
        assert!(err.to_string().starts_with("image list is malformed"));
    }

    #[test]
    fn test_timeout_message() {
        let err = DimensionError::Timeout {
            image: "Tree.png".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "loading Tree.png timed out after 10s");
    }
}
