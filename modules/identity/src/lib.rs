//! Session identity: client UUID plus an X25519 key pair for Reality.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use reality_core::ServerParameters;
use uuid::Uuid;
use x25519_dalek::{PublicKey, StaticSecret};

const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("key must be 32 bytes, got {0}")]
    Length(usize),
}

/// A freshly generated identity. The key halves always come from one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub client_id: String,
    pub private_key: String,
    pub public_key: String,
}

impl Identity {
    /// Replace all identity fields of `params` at once.
    pub fn apply_to(self, params: &mut ServerParameters) {
        params.client_id = self.client_id;
        params.private_key = self.private_key;
        params.public_key = self.public_key;
    }
}

/// Generate a new client id and key pair.
///
/// Keys are encoded as URL-safe base64 without padding, which is what the
/// proxy daemon's `x25519` command prints and what clients expect in `pbk`.
pub fn generate_identity() -> Identity {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    let identity = Identity {
        client_id: Uuid::new_v4().to_string(),
        private_key: URL_SAFE_NO_PAD.encode(secret.to_bytes()),
        public_key: URL_SAFE_NO_PAD.encode(public.as_bytes()),
    };
    tracing::debug!(client_id = %identity.client_id, "generated identity");
    identity
}

/// Recompute the public key for an encoded private key.
pub fn derive_public_key(private_key: &str) -> Result<String, KeyError> {
    let bytes = decode_key(private_key)?;
    let secret = StaticSecret::from(bytes);
    Ok(URL_SAFE_NO_PAD.encode(PublicKey::from(&secret).as_bytes()))
}

fn decode_key(encoded: &str) -> Result<[u8; KEY_LEN], KeyError> {
    let raw = URL_SAFE_NO_PAD.decode(encoded.trim().trim_end_matches('='))?;
    let len = raw.len();
    raw.try_into().map_err(|_| KeyError::Length(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_a_matched_pair() {
        let id = generate_identity();
        assert_eq!(id.private_key.len(), 43);
        assert_eq!(id.public_key.len(), 43);
        assert_eq!(derive_public_key(&id.private_key).unwrap(), id.public_key);
    }

    #[test]
    fn client_id_is_a_uuid() {
        let id = generate_identity();
        assert!(Uuid::parse_str(&id.client_id).is_ok());
    }

    #[test]
    fn thousand_generations_do_not_collide() {
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for _ in 0..1000 {
            let id = generate_identity();
            assert!(ids.insert(id.client_id));
            assert!(keys.insert(id.public_key));
        }
    }

    #[test]
    fn apply_replaces_all_three_fields() {
        let mut params = ServerParameters::default();
        let first = generate_identity();
        first.clone().apply_to(&mut params);
        let second = generate_identity();
        second.clone().apply_to(&mut params);
        assert_eq!(params.client_id, second.client_id);
        assert_eq!(params.private_key, second.private_key);
        assert_eq!(params.public_key, second.public_key);
        assert_ne!(params.public_key, first.public_key);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(derive_public_key("%%%"), Err(KeyError::Encoding(_))));
        assert!(matches!(derive_public_key("AAAA"), Err(KeyError::Length(3))));
    }
}
