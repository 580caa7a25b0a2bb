//! Wizard session: the one mutable home of the server parameters, their
//! encodings and the latest probe results.
//!
//! Every parameter change passes through a single update step, which
//! re-encodes before any listener is told, so a listener never sees
//! parameters paired with stale encodings. Probe progress enters only through
//! [`Session::apply`], which drops events from any run but the active one.

mod listener;
mod scan;

pub use listener::{track, EventLog, SessionListener};
pub use scan::{run_connection_test, run_scan};

use encoder::{encode_all, Encodings};
use probe::{ProbeEvent, ProbeResult};
use reality_core::{is_curated_server_name, Locale, RunId, ServerParameters, ValidationError};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no scan result for {0}")]
    UnknownResult(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScanStatus {
    #[default]
    Idle,
    Running(RunId),
    Finished(RunId),
    Unavailable { run: RunId, reason: String },
}

pub struct Session {
    params: ServerParameters,
    encodings: Encodings,
    results: Vec<ProbeResult>,
    active_run: Option<RunId>,
    status: ScanStatus,
    locale: Locale,
    listeners: Vec<Box<dyn SessionListener>>,
}

impl Session {
    pub fn new(params: ServerParameters, locale: Locale) -> Self {
        let encodings = encode_all(&params);
        Session {
            params,
            encodings,
            results: Vec::new(),
            active_run: None,
            status: ScanStatus::Idle,
            locale,
            listeners: Vec::new(),
        }
    }

    pub fn parameters(&self) -> &ServerParameters {
        &self.params
    }

    pub fn encodings(&self) -> &Encodings {
        &self.encodings
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn status(&self) -> &ScanStatus {
        &self.status
    }

    pub fn active_run(&self) -> Option<RunId> {
        self.active_run
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Register a listener and hand it the current state right away.
    pub fn subscribe(&mut self, listener: Box<dyn SessionListener>) {
        listener.on_parameters_changed(&self.params, &self.encodings);
        listener.on_probe_results_changed(&self.results);
        self.listeners.push(listener);
    }

    pub fn set_address(&mut self, address: &str) {
        let address = address.trim().to_string();
        self.update(|p| p.address = address);
    }

    pub fn set_port(&mut self, port: u16) {
        self.update(|p| p.port = port);
    }

    pub fn set_server_name(&mut self, server_name: &str) {
        let server_name = server_name.trim().to_string();
        if !server_name.is_empty() && !is_curated_server_name(&server_name) {
            info!(sni = %server_name, "using custom SNI");
        }
        self.update(|p| p.server_name = server_name);
    }

    /// Replace client id and key pair in one step.
    pub fn regenerate_identity(&mut self) {
        let identity = identity::generate_identity();
        self.update(|p| identity.apply_to(p));
    }

    /// Use a scan result's host as the server address.
    pub fn select_result(&mut self, address: &str) -> Result<(), SessionError> {
        let host = self
            .results
            .iter()
            .find(|r| r.address == address || r.host == address)
            .map(|r| r.host.clone())
            .ok_or_else(|| SessionError::UnknownResult(address.to_string()))?;
        track("ip_selected_from_scan", self.locale, &format!("ip={host} sni={}", self.params.server_name));
        self.update(|p| p.address = host);
        Ok(())
    }

    fn update(&mut self, change: impl FnOnce(&mut ServerParameters)) {
        change(&mut self.params);
        self.encodings = encode_all(&self.params);
        debug!(complete = self.encodings.is_complete(), "parameters updated");
        for l in &self.listeners {
            l.on_parameters_changed(&self.params, &self.encodings);
        }
    }

    /// Start a new run. Results of any earlier run are discarded.
    pub fn begin_scan(&mut self) -> RunId {
        let run = RunId::new();
        self.active_run = Some(run);
        self.status = ScanStatus::Running(run);
        self.results.clear();
        self.notify_results();
        run
    }

    /// Apply one pipeline event. Returns false for events of a stale run.
    pub fn apply(&mut self, event: ProbeEvent) -> bool {
        if self.active_run != Some(event.run()) {
            debug!(run = %event.run(), "dropping event from stale run");
            return false;
        }
        match &event {
            ProbeEvent::Started { .. } | ProbeEvent::StageChanged { .. } => {}
            ProbeEvent::AddressFinished { result, .. } => {
                self.results.push(result.clone());
                self.notify_results();
            }
            ProbeEvent::Finished { run, results } => {
                self.results = results.clone();
                self.status = ScanStatus::Finished(*run);
                self.notify_results();
            }
            ProbeEvent::SourceUnavailable { run, reason } => {
                self.results.clear();
                self.status = ScanStatus::Unavailable { run: *run, reason: reason.clone() };
                self.notify_results();
            }
        }
        for l in &self.listeners {
            l.on_probe_event(&event);
        }
        true
    }

    fn notify_results(&self) {
        for l in &self.listeners {
            l.on_probe_results_changed(&self.results);
        }
    }
}
