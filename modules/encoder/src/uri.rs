use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reality_core::{ServerParameters, ShortId, ValidationError};
use std::net::Ipv6Addr;
use url::{form_urlencoded, Url};

pub const FINGERPRINT: &str = "chrome";
pub const FLOW: &str = "xtls-rprx-vision";
const NETWORK: &str = "tcp";
const SECURITY: &str = "reality";
const SCHEME: &str = "vless";

/// Characters left alone by a URI-component encoder.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Build the client link, or explain which field is missing.
///
/// Query order is fixed: `type, security, sni, fp, pbk, sid, flow`. An empty
/// short id drops the `sid` pair.
pub fn try_encode_client_uri(params: &ServerParameters) -> Result<String, ValidationError> {
    params.validate()?;
    let short_id = params.short_id();

    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("type", NETWORK)
        .append_pair("security", SECURITY)
        .append_pair("sni", &params.server_name)
        .append_pair("fp", FINGERPRINT)
        .append_pair("pbk", &params.public_key);
    if !short_id.is_empty() {
        query.append_pair("sid", short_id.as_str());
    }
    query.append_pair("flow", FLOW);

    let remark = format!("reality-{}", params.address);
    Ok(format!(
        "{SCHEME}://{}@{}:{}?{}#{}",
        params.client_id,
        authority_host(&params.address),
        params.port,
        query.finish(),
        utf8_percent_encode(&remark, URI_COMPONENT),
    ))
}

/// Total form of [`try_encode_client_uri`]: incomplete parameters yield `""`.
pub fn encode_client_uri(params: &ServerParameters) -> String {
    match try_encode_client_uri(params) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "client link not generated: incomplete configuration");
            String::new()
        }
    }
}

fn authority_host(address: &str) -> String {
    if address.parse::<Ipv6Addr>().is_ok() {
        format!("[{address}]")
    } else {
        address.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid link: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported scheme `{0}`")]
    Scheme(String),
    #[error("link has no `{0}`")]
    Missing(&'static str),
}

/// Decoded client link fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLink {
    pub client_id: String,
    pub address: String,
    pub port: u16,
    pub network: String,
    pub security: String,
    pub server_name: String,
    pub fingerprint: String,
    pub public_key: String,
    pub short_id: ShortId,
    pub flow: String,
    pub remark: String,
}

impl ClientLink {
    pub fn parse(link: &str) -> Result<Self, LinkError> {
        let url = Url::parse(link)?;
        if url.scheme() != SCHEME {
            return Err(LinkError::Scheme(url.scheme().to_string()));
        }
        let client_id = percent_decode_str(url.username()).decode_utf8_lossy().into_owned();
        if client_id.is_empty() {
            return Err(LinkError::Missing("client id"));
        }
        let address = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .ok_or(LinkError::Missing("address"))?;
        let port = url.port().ok_or(LinkError::Missing("port"))?;

        let mut out = ClientLink {
            client_id,
            address,
            port,
            network: String::new(),
            security: String::new(),
            server_name: String::new(),
            fingerprint: String::new(),
            public_key: String::new(),
            short_id: ShortId::default(),
            flow: String::new(),
            remark: url
                .fragment()
                .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned())
                .unwrap_or_default(),
        };
        for (k, v) in url.query_pairs() {
            let v = v.into_owned();
            match k.as_ref() {
                "type" => out.network = v,
                "security" => out.security = v,
                "sni" => out.server_name = v,
                "fp" => out.fingerprint = v,
                "pbk" => out.public_key = v,
                "sid" => out.short_id = ShortId::from_encoded(&v),
                "flow" => out.flow = v,
                _ => {}
            }
        }
        Ok(out)
    }
}
