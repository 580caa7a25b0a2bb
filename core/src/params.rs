use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_SERVER_NAME: &str = "cloudflare.com";

/// Server names known to front well for Reality. Anything else is a custom SNI.
pub const CURATED_SERVER_NAMES: &[&str] = &[
    "cloudflare.com",
    "fastly.net",
    "www.wikipedia.org",
    "cdn.segment.com",
    "assets.hcaptcha.com",
    "www.speedtest.net",
    "www.visa.com",
    "www.samsung.com",
    "www.microsoft.com",
    "www.apple.com",
    "www.amazon.com",
];

pub fn is_curated_server_name(name: &str) -> bool {
    CURATED_SERVER_NAMES.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("port {0} is out of range (1-65535)")]
    PortOutOfRange(u16),
}

/// The live connection parameters of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerParameters {
    pub address: String,
    pub port: u16,
    pub client_id: String,
    pub private_key: String,
    pub public_key: String,
    pub server_name: String,
}

impl Default for ServerParameters {
    fn default() -> Self {
        ServerParameters {
            address: String::new(),
            port: DEFAULT_PORT,
            client_id: String::new(),
            private_key: String::new(),
            public_key: String::new(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

impl ServerParameters {
    /// Checks that every field an encoder needs is present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("address", &self.address),
            ("clientId", &self.client_id),
            ("publicKey", &self.public_key),
            ("privateKey", &self.private_key),
            ("serverName", &self.server_name),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }
        if self.port == 0 {
            return Err(ValidationError::PortOutOfRange(self.port));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn short_id(&self) -> ShortId {
        ShortId::derive(&self.public_key)
    }
}

/// Short id shared by the client link and the server descriptor.
///
/// Derived from the first eight characters of the public key: lowercased, with
/// everything outside `[a-z0-9]` removed. May therefore be shorter than eight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(String);

impl ShortId {
    pub const PREFIX_LEN: usize = 8;

    pub fn derive(public_key: &str) -> Self {
        let id = public_key
            .chars()
            .take(Self::PREFIX_LEN)
            .flat_map(char::to_lowercase)
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .collect();
        ShortId(id)
    }

    /// A short id as it appears in an already encoded link or descriptor.
    pub fn from_encoded(raw: &str) -> Self {
        ShortId(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for ShortId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ServerParameters {
        ServerParameters {
            address: "203.0.113.7".into(),
            client_id: "6f1c1f9e-2d7b-4c43-9d0e-2f3a5b1c7e11".into(),
            private_key: "kLq1vYx9cR2mWbTz0aHn4pUe8sJdGfOi7kMw3tXyZ0A".into(),
            public_key: "Zq3N-x_7PkR2mWbTz0aHn4pUe8sJdGfOi7kMw3tXyZ0".into(),
            ..ServerParameters::default()
        }
    }

    #[test]
    fn defaults_match_wizard_initial_state() {
        let p = ServerParameters::default();
        assert_eq!(p.port, 443);
        assert_eq!(p.server_name, "cloudflare.com");
        assert!(p.address.is_empty());
        assert_eq!(p.validate(), Err(ValidationError::MissingField("address")));
    }

    #[test]
    fn each_missing_field_is_reported() {
        let mut p = complete();
        assert!(p.is_valid());
        p.public_key.clear();
        assert_eq!(p.validate(), Err(ValidationError::MissingField("publicKey")));

        let mut p = complete();
        p.private_key = "   ".into();
        assert_eq!(p.validate(), Err(ValidationError::MissingField("privateKey")));

        let mut p = complete();
        p.server_name.clear();
        assert_eq!(p.validate(), Err(ValidationError::MissingField("serverName")));

        let mut p = complete();
        p.port = 0;
        assert_eq!(p.validate(), Err(ValidationError::PortOutOfRange(0)));
    }

    #[test]
    fn short_id_takes_prefix_then_strips() {
        assert_eq!(ShortId::derive("Zq3N-x_7PkR2").as_str(), "zq3nx7");
        assert_eq!(ShortId::derive("ABCDEFGHIJ").as_str(), "abcdefgh");
        assert_eq!(ShortId::derive("abc").as_str(), "abc");
        assert!(ShortId::derive("-_-_-_-_abcdef").is_empty());
    }

    #[test]
    fn params_short_id_uses_public_key() {
        let p = complete();
        assert_eq!(p.short_id(), ShortId::derive(&p.public_key));
        assert_eq!(p.short_id().to_string(), "zq3nx7");
    }

    #[test]
    fn curated_list_contains_default() {
        assert!(is_curated_server_name(DEFAULT_SERVER_NAME));
        assert!(!is_curated_server_name("example.org"));
    }
}
