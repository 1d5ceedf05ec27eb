use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::RouterError;

/// Supported authentication mechanisms.
///
/// The concrete challenge/response protocols live behind the
/// [`RouterEndpoint`](crate::endpoint::RouterEndpoint) trait; the topology
/// only routes the mechanism name and credential payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    ScramSha1,
    ScramSha256,
    Plain,
    X509,
    Default,
}

impl FromStr for AuthMechanism {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scram-sha-1" => Ok(Self::ScramSha1),
            "scram-sha-256" => Ok(Self::ScramSha256),
            "plain" => Ok(Self::Plain),
            "x509" => Ok(Self::X509),
            "default" => Ok(Self::Default),
            other => Err(RouterError::UnknownAuthMechanism(other.to_string())),
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ScramSha1 => "scram-sha-1",
            Self::ScramSha256 => "scram-sha-256",
            Self::Plain => "plain",
            Self::X509 => "x509",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// An ordered, immutable record of a credential handshake.
///
/// Every attempt is replayed, oldest first, against each endpoint that joins
/// the topology after the attempt was recorded, keeping credential state
/// consistent across all routers.
#[derive(Clone)]
pub struct AuthAttempt {
    pub mechanism: AuthMechanism,
    pub db: String,
    pub credentials: Value,
}

impl AuthAttempt {
    pub fn new(mechanism: AuthMechanism, db: impl Into<String>, credentials: Value) -> Self {
        Self {
            mechanism,
            db: db.into(),
            credentials,
        }
    }
}

// Credentials stay out of debug output and logs.
impl fmt::Debug for AuthAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthAttempt")
            .field("mechanism", &self.mechanism)
            .field("db", &self.db)
            .field("credentials", &"<redacted>")
            .finish()
    }
}
