//! The SASL seam.
//!
//! Mechanism implementations live outside this crate; the engine only
//! drives the challenge/response exchange with opaque base64 tokens.

use crate::Result;

/// A SASL mechanism driven by the AUTHENTICATE exchange.
///
/// Tokens are opaque base64 strings in both directions; the engine never
/// decodes them.
pub trait SaslMechanism: Send {
    /// The mechanism name as advertised in `AUTH=<name>`.
    fn name(&self) -> &str;

    /// The initial client response, for servers with SASL-IR (RFC 4959).
    ///
    /// Mechanisms without an initial response return `None` and the first
    /// token is produced by [`SaslMechanism::respond`] after the first
    /// empty challenge.
    fn initial_response(&mut self) -> Option<String> {
        None
    }

    /// Produces the client token for a server challenge.
    ///
    /// # Errors
    ///
    /// A mechanism may refuse a challenge (for example a server error
    /// token); the engine aborts the exchange and surfaces the error.
    fn respond(&mut self, challenge: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticMechanism {
        token: String,
    }

    impl SaslMechanism for StaticMechanism {
        fn name(&self) -> &str {
            "PLAIN"
        }

        fn initial_response(&mut self) -> Option<String> {
            Some(self.token.clone())
        }

        fn respond(&mut self, _challenge: &str) -> Result<String> {
            Ok(self.token.clone())
        }
    }

    #[test]
    fn mechanism_contract() {
        let mut mech = StaticMechanism {
            token: "AGJvYgBzZWNyZXQ=".to_string(),
        };
        assert_eq!(mech.name(), "PLAIN");
        assert_eq!(mech.initial_response().as_deref(), Some("AGJvYgBzZWNyZXQ="));
        assert_eq!(mech.respond("").unwrap(), "AGJvYgBzZWNyZXQ=");
    }
}
