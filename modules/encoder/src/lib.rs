//! Encoders for the two representations of a Reality endpoint: the client
//! `vless://` link and the server `config.json` descriptor.
//!
//! Both derive the short id through [`reality_core::ShortId::derive`], so a
//! link and a descriptor built from the same parameters always agree.

mod descriptor;
#[cfg(feature = "qr")]
mod qr;
mod uri;

pub use descriptor::{
    encode_server_descriptor, Client, Inbound, InboundSettings, LogSettings, Outbound,
    RealitySettings, ServerDescriptor, StreamSettings,
};
#[cfg(feature = "qr")]
pub use qr::{render_qr_svg, render_qr_text, QrError};
pub use uri::{encode_client_uri, try_encode_client_uri, ClientLink, LinkError, FINGERPRINT, FLOW};

use reality_core::ServerParameters;

/// Both encodings of one parameter set. Empty when the parameters are incomplete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encodings {
    pub client_uri: String,
    pub descriptor: Option<ServerDescriptor>,
}

impl Encodings {
    pub fn is_complete(&self) -> bool {
        !self.client_uri.is_empty() && self.descriptor.is_some()
    }
}

/// Encode both representations, or neither.
pub fn encode_all(params: &ServerParameters) -> Encodings {
    match (try_encode_client_uri(params), encode_server_descriptor(params)) {
        (Ok(client_uri), Ok(descriptor)) => Encodings { client_uri, descriptor: Some(descriptor) },
        _ => Encodings::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(public_key: &str) -> ServerParameters {
        ServerParameters {
            address: "104.16.0.1".into(),
            port: 8443,
            client_id: "0b5c4f3e-8a9d-4f61-b2a7-3c1d5e6f7a80".into(),
            private_key: "yJ0Tq6gC3nP9wL2sV8xZ1bH5kM7rD4fA6eU0iO3tQ1w".into(),
            public_key: public_key.into(),
            server_name: "www.speedtest.net".into(),
        }
    }

    #[test]
    fn short_id_agrees_across_representations() {
        for key in [
            "Zq3N-x_7PkR2mWbTz0aHn4pUe8sJdGfOi7kMw3tXyZ0",
            "ABCDEFGH1234",
            "a-b_c-d_efgh",
            "________rest",
        ] {
            let p = params(key);
            let link = ClientLink::parse(&encode_client_uri(&p)).unwrap();
            let desc = encode_server_descriptor(&p).unwrap();
            let expected = reality_core::ShortId::derive(key);
            assert_eq!(link.short_id, expected);
            assert_eq!(desc.short_id(), Some(&expected));
        }
    }

    #[test]
    fn encode_all_is_all_or_nothing() {
        let p = params("Zq3N-x_7PkR2mWbTz0aHn4pUe8sJdGfOi7kMw3tXyZ0");
        assert!(encode_all(&p).is_complete());

        let mut missing = p.clone();
        missing.address.clear();
        let e = encode_all(&missing);
        assert!(e.client_uri.is_empty());
        assert!(e.descriptor.is_none());
    }

    #[test]
    fn dest_follows_server_name() {
        let p = params("Zq3N-x_7PkR2mWbTz0aHn4pUe8sJdGfOi7kMw3tXyZ0");
        let desc = encode_server_descriptor(&p).unwrap();
        assert_eq!(desc.reality().unwrap().dest, format!("{}:443", p.server_name));
    }
}
