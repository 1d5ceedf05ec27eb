use std::fmt;

use thiserror::Error;

/// A single endpoint's failure, collected while fanning an auth or logout
/// call out to every connected router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    /// Address of the endpoint that failed
    pub address: String,
    /// Rendered error message from the endpoint
    pub message: String,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.address, self.message)
    }
}

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("topology was destroyed")]
    TopologyDestroyed,

    #[error("no router proxy available")]
    NoProxyAvailable,

    #[error("no router proxies found in seed list")]
    NoProxyFound,

    #[error("authentication failed against {} endpoint(s)", .0.len())]
    AuthenticationFailed(Vec<EndpointFailure>),

    #[error("logout failed against db {db} on {} endpoint(s)", .failures.len())]
    LogoutFailed {
        db: String,
        failures: Vec<EndpointFailure>,
    },

    #[error("authentication or logout already in progress")]
    OperationInProgress,

    #[error("auth mechanism {0} does not exist")]
    UnknownAuthMechanism(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timeout after {0}ms")]
    Timeout(u64),

    #[error("command failed: {0}")]
    Command(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_failure_display() {
        let failure = EndpointFailure {
            address: "localhost:27017".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(failure.to_string(), "localhost:27017: connection refused");
    }

    #[test]
    fn test_aggregate_auth_error_counts_failures() {
        let err = RouterError::AuthenticationFailed(vec![
            EndpointFailure {
                address: "a:1".to_string(),
                message: "bad credentials".to_string(),
            },
            EndpointFailure {
                address: "b:1".to_string(),
                message: "timeout".to_string(),
            },
        ]);
        assert_eq!(err.to_string(), "authentication failed against 2 endpoint(s)");
    }

    #[test]
    fn test_fatal_startup_error_message() {
        assert_eq!(
            RouterError::NoProxyFound.to_string(),
            "no router proxies found in seed list"
        );
    }
}
