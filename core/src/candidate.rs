use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// One entry of a candidate range list: a CIDR network or a bare address.
/// Ranges are never expanded; an entry is scanned as a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateAddress(pub String);

impl From<&str> for CandidateAddress {
    fn from(s: &str) -> Self {
        CandidateAddress(s.to_string())
    }
}

impl CandidateAddress {
    /// Accepts a sanitized line if it is a CIDR network or an IP address.
    pub fn parse_entry(line: &str) -> Option<Self> {
        let t = line.trim();
        if t.parse::<IpNet>().is_ok() || t.parse::<IpAddr>().is_ok() {
            Some(CandidateAddress(t.to_string()))
        } else {
            None
        }
    }

    pub fn address(&self) -> &str {
        &self.0
    }

    pub fn network(&self) -> Option<IpNet> {
        self.0.parse().ok()
    }

    /// Representative host for probing and selection: first usable host of a
    /// network, or the address itself.
    pub fn probe_host(&self) -> String {
        if let Some(net) = self.network() {
            let host = net.hosts().next().unwrap_or_else(|| net.addr());
            return host.to_string();
        }
        self.0.clone()
    }
}

impl fmt::Display for CandidateAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
