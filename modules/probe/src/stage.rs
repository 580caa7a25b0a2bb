use async_trait::async_trait;
use reality_core::ServerParameters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Probe stages, declared in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageKind {
    Reachability,
    Handshake,
    ProtocolProbe,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Reachability, StageKind::Handshake, StageKind::ProtocolProbe];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Reachability => "reachability",
            StageKind::Handshake => "handshake",
            StageKind::ProtocolProbe => "protocolProbe",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Reachability => "Basic connectivity",
            StageKind::Handshake => "TLS handshake & SNI match",
            StageKind::ProtocolProbe => "Reality protocol probe",
        }
    }

    /// Data a stage needs before it can run at all. Missing data is a stage
    /// error, not a failure.
    pub fn check_preconditions(&self, host: &str, params: &ServerParameters) -> Result<(), String> {
        let blank = |s: &str| s.trim().is_empty();
        match self {
            StageKind::Reachability if blank(host) || params.port == 0 => {
                Err("missing address or port".into())
            }
            StageKind::Handshake if blank(host) || params.port == 0 || blank(&params.server_name) => {
                Err("missing address, port or SNI".into())
            }
            StageKind::ProtocolProbe if blank(&params.client_id) || blank(&params.public_key) => {
                Err("missing client id or public key".into())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    Pending,
    Running,
    Success,
    Failure,
    Error,
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Success | StageState::Failure | StageState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Success => "success",
            StageState::Failure => "failure",
            StageState::Error => "error",
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status a stage reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failure,
    Error,
}

impl From<StageStatus> for StageState {
    fn from(s: StageStatus) -> Self {
        match s {
            StageStatus::Success => StageState::Success,
            StageStatus::Failure => StageState::Failure,
            StageStatus::Error => StageState::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub status: StageStatus,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub latency_ms: Option<u64>,
    pub packet_loss_percent: Option<u8>,
}

impl StageOutcome {
    fn with_status(status: StageStatus, message: impl Into<String>) -> Self {
        StageOutcome {
            status,
            message: Some(message.into()),
            detail: None,
            latency_ms: None,
            packet_loss_percent: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_status(StageStatus::Success, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_status(StageStatus::Failure, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(StageStatus::Error, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64, packet_loss_percent: u8) -> Self {
        self.latency_ms = Some(latency_ms);
        self.packet_loss_percent = Some(packet_loss_percent);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage {stage} cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub stage: StageKind,
    pub from: StageState,
    pub to: StageState,
}

/// State of one stage for one address. Moves forward only:
/// `pending -> running -> success | failure | error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub kind: StageKind,
    pub state: StageState,
    pub message: Option<String>,
    pub detail: Option<String>,
}

impl StageRecord {
    pub fn new(kind: StageKind) -> Self {
        StageRecord { kind, state: StageState::Pending, message: None, detail: None }
    }

    pub fn begin(&mut self) -> Result<(), InvalidTransition> {
        if self.state != StageState::Pending {
            return Err(self.invalid(StageState::Running));
        }
        self.state = StageState::Running;
        Ok(())
    }

    pub fn finish(&mut self, outcome: &StageOutcome) -> Result<(), InvalidTransition> {
        let next = StageState::from(outcome.status);
        if self.state != StageState::Running {
            return Err(self.invalid(next));
        }
        self.state = next;
        self.message = outcome.message.clone();
        self.detail = outcome.detail.clone();
        Ok(())
    }

    fn invalid(&self, to: StageState) -> InvalidTransition {
        InvalidTransition { stage: self.kind, from: self.state, to }
    }
}

/// One validation step. Implementations report every problem through the
/// returned outcome; the pipeline applies the timeout and preconditions.
#[async_trait]
pub trait ProbeStage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Per-stage override of the pipeline's stage timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn run(&self, host: &str, params: &ServerParameters) -> StageOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions() {
        let mut r = StageRecord::new(StageKind::Handshake);
        r.begin().unwrap();
        assert_eq!(r.state, StageState::Running);
        r.finish(&StageOutcome::failure("no tls").with_detail("alert 40")).unwrap();
        assert_eq!(r.state, StageState::Failure);
        assert_eq!(r.message.as_deref(), Some("no tls"));
        assert_eq!(r.detail.as_deref(), Some("alert 40"));
    }

    #[test]
    fn rejects_backwards_and_skipped_transitions() {
        let mut r = StageRecord::new(StageKind::Reachability);
        let err = r.finish(&StageOutcome::success("ok")).unwrap_err();
        assert_eq!(err.from, StageState::Pending);
        assert_eq!(err.to, StageState::Success);

        r.begin().unwrap();
        assert!(r.begin().is_err());

        r.finish(&StageOutcome::success("ok")).unwrap();
        assert!(r.begin().is_err());
        assert!(r.finish(&StageOutcome::error("again")).is_err());
        assert_eq!(r.state, StageState::Success);
    }

    #[test]
    fn preconditions_per_stage() {
        let mut p = ServerParameters {
            client_id: "id".into(),
            public_key: "key".into(),
            ..ServerParameters::default()
        };
        assert!(StageKind::Reachability.check_preconditions("1.1.1.1", &p).is_ok());
        assert!(StageKind::Reachability.check_preconditions("", &p).is_err());

        p.server_name.clear();
        assert_eq!(
            StageKind::Handshake.check_preconditions("1.1.1.1", &p),
            Err("missing address, port or SNI".to_string())
        );

        p.public_key.clear();
        assert!(StageKind::ProtocolProbe.check_preconditions("1.1.1.1", &p).is_err());
    }

    #[test]
    fn kinds_sort_in_execution_order() {
        let mut kinds = vec![StageKind::ProtocolProbe, StageKind::Reachability, StageKind::Handshake];
        kinds.sort();
        assert_eq!(kinds, StageKind::ALL.to_vec());
    }
}
