use encoder::Encodings;
use probe::{ProbeEvent, ProbeResult};
use reality_core::{Locale, ServerParameters};
use std::sync::Mutex;
use tracing::info;

/// Observer of session changes. Called synchronously by the session after
/// each update; implementations must not block. The first parameter
/// notification may carry empty values.
pub trait SessionListener: Send {
    fn on_parameters_changed(&self, _params: &ServerParameters, _encodings: &Encodings) {}

    fn on_probe_results_changed(&self, _results: &[ProbeResult]) {}

    /// Every accepted event of the active run, after the session applied it.
    fn on_probe_event(&self, _event: &ProbeEvent) {}
}

/// Emit one usage event as a structured log record.
pub fn track(event: &'static str, locale: Locale, detail: &str) {
    info!(target: "analytics", event, locale = %locale, detail, "usage event");
}

/// Analytics listener: turns session changes into usage events.
pub struct EventLog {
    locale: Locale,
    last_uri: Mutex<String>,
}

impl EventLog {
    pub fn new(locale: Locale) -> Self {
        EventLog { locale, last_uri: Mutex::new(String::new()) }
    }
}

impl SessionListener for EventLog {
    fn on_parameters_changed(&self, params: &ServerParameters, encodings: &Encodings) {
        if encodings.client_uri.is_empty() {
            return;
        }
        let mut last = self.last_uri.lock().unwrap_or_else(|e| e.into_inner());
        if *last != encodings.client_uri {
            last.clone_from(&encodings.client_uri);
            let detail = format!("address={} sni={}", params.address, params.server_name);
            track("client_config_generated", self.locale, &detail);
        }
    }

    fn on_probe_event(&self, event: &ProbeEvent) {
        match event {
            ProbeEvent::Started { addresses, .. } => {
                track("ip_scan_started", self.locale, &format!("addresses={}", addresses.len()))
            }
            ProbeEvent::Finished { results, .. } => {
                let passed = results.iter().filter(|r| r.is_passed()).count();
                track("ip_scan_finished", self.locale, &format!("passed={passed} total={}", results.len()))
            }
            ProbeEvent::SourceUnavailable { reason, .. } => track("ip_scan_unavailable", self.locale, reason),
            _ => {}
        }
    }
}
