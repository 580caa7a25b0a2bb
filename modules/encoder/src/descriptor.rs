use crate::uri::FLOW;
use reality_core::{ServerParameters, ShortId, ValidationError};
use serde::{Deserialize, Serialize};

const LOG_LEVEL: &str = "warning";
const DEST_PORT: u16 = 443;

/// Server `config.json` for the proxy daemon.
///
/// Field order matches the rendered file; `serde_json` keeps declaration order
/// when serializing a struct directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub log: LogSettings,
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    pub loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    pub port: u16,
    pub protocol: String,
    pub settings: InboundSettings,
    pub stream_settings: StreamSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundSettings {
    pub clients: Vec<Client>,
    pub decryption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub flow: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub network: String,
    pub security: String,
    pub reality_settings: RealitySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealitySettings {
    pub show: bool,
    pub dest: String,
    pub xver: u8,
    pub server_names: Vec<String>,
    pub private_key: String,
    pub short_ids: Vec<ShortId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub protocol: String,
    pub tag: String,
}

impl ServerDescriptor {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn reality(&self) -> Option<&RealitySettings> {
        self.inbounds.first().map(|i| &i.stream_settings.reality_settings)
    }

    pub fn short_id(&self) -> Option<&ShortId> {
        self.reality().and_then(|r| r.short_ids.first())
    }
}

/// Build the server descriptor. Outbounds are fixed: direct passthrough and blackhole.
pub fn encode_server_descriptor(params: &ServerParameters) -> Result<ServerDescriptor, ValidationError> {
    params.validate()?;
    Ok(ServerDescriptor {
        log: LogSettings { loglevel: LOG_LEVEL.into() },
        inbounds: vec![Inbound {
            port: params.port,
            protocol: "vless".into(),
            settings: InboundSettings {
                clients: vec![Client { id: params.client_id.clone(), flow: FLOW.into() }],
                decryption: "none".into(),
            },
            stream_settings: StreamSettings {
                network: "tcp".into(),
                security: "reality".into(),
                reality_settings: RealitySettings {
                    show: false,
                    dest: format!("{}:{}", params.server_name, DEST_PORT),
                    xver: 0,
                    server_names: vec![params.server_name.clone()],
                    private_key: params.private_key.clone(),
                    short_ids: vec![params.short_id()],
                },
            },
        }],
        outbounds: vec![
            Outbound { protocol: "freedom".into(), tag: "direct".into() },
            Outbound { protocol: "blackhole".into(), tag: "blocked".into() },
        ],
    })
}
