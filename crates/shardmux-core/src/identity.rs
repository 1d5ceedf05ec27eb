use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Administrative namespace the identity probe is issued against.
pub const ADMIN_NAMESPACE: &str = "admin.$cmd";

/// The identity/handshake command used both to validate an endpoint's role
/// at connect time and as the periodic liveness probe.
pub fn probe_command() -> Value {
    json!({ "hello": 1 })
}

/// Identity descriptor reported by an endpoint's admin handshake.
///
/// Only endpoints reporting `isRouter == true` are eligible for the
/// connected set. Arbiters are excluded from authentication fan-outs.
/// Unknown or malformed probe replies parse to the default descriptor,
/// which reports a non-router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityDescriptor {
    pub is_router: bool,
    pub arbiter_only: bool,
}

impl IdentityDescriptor {
    /// Parses a probe reply into an identity descriptor.
    ///
    /// Extra fields in the reply are ignored; missing fields default to
    /// `false`, so a reply that does not claim router identity is never
    /// treated as a router.
    pub fn from_probe_reply(reply: &Value) -> Self {
        serde_json::from_value(reply.clone()).unwrap_or_default()
    }

    pub fn router() -> Self {
        Self {
            is_router: true,
            arbiter_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_reply_router() {
        let reply = json!({ "isRouter": true, "ok": 1 });
        let identity = IdentityDescriptor::from_probe_reply(&reply);
        assert!(identity.is_router);
        assert!(!identity.arbiter_only);
    }

    #[test]
    fn test_probe_reply_non_router_defaults() {
        let reply = json!({ "ok": 1 });
        let identity = IdentityDescriptor::from_probe_reply(&reply);
        assert!(!identity.is_router);
    }

    #[test]
    fn test_probe_reply_malformed_is_not_router() {
        let identity = IdentityDescriptor::from_probe_reply(&json!("garbage"));
        assert_eq!(identity, IdentityDescriptor::default());
    }

    #[test]
    fn test_probe_reply_arbiter() {
        let reply = json!({ "isRouter": true, "arbiterOnly": true });
        let identity = IdentityDescriptor::from_probe_reply(&reply);
        assert!(identity.arbiter_only);
    }

    #[test]
    fn test_probe_command_shape() {
        assert_eq!(probe_command(), json!({ "hello": 1 }));
    }
}
