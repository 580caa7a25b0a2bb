use crate::listener::track;
use crate::Session;
use candidates::{CandidateSource, SourceUnavailable};
use probe::{ProbeEvent, ProbePipeline, ProbeResult};
use reality_core::{CandidateAddress, RunId, ValidationError};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Fetch candidates and probe them, feeding every event into the session.
/// The pipeline runs alongside the aggregator on the current task; the
/// session is only touched from here.
pub async fn run_scan(
    session: &mut Session,
    source: &dyn CandidateSource,
    pipeline: &ProbePipeline,
) -> Result<Vec<ProbeResult>, SourceUnavailable> {
    let run = session.begin_scan();
    info!(%run, source = %source.describe(), "fetching candidates");
    let candidates = match source.fetch_candidates().await {
        Ok(c) => c,
        Err(e) => {
            warn!(%run, reason = %e.reason, "scan aborted");
            session.apply(ProbeEvent::SourceUnavailable { run, reason: e.reason.clone() });
            return Err(e);
        }
    };

    let params = session.parameters().clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let probing = async move { pipeline.run(run, &candidates, &params, &tx).await };
    let aggregate = async {
        while let Some(event) = rx.recv().await {
            session.apply(event);
        }
    };
    let (results, ()) = tokio::join!(probing, aggregate);
    Ok(results)
}

/// Probe the session's own address once. Refuses incomplete parameters.
pub async fn run_connection_test(
    session: &Session,
    pipeline: &ProbePipeline,
    mut on_event: impl FnMut(&ProbeEvent),
) -> Result<ProbeResult, ValidationError> {
    let params = session.parameters().clone();
    params.validate()?;
    track("connection_test_run", session.locale(), &format!("ip={} sni={}", params.address, params.server_name));

    let run = RunId::new();
    let target = CandidateAddress::from(params.address.as_str());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let probing = async move { pipeline.probe_address(run, &target, &params, &tx).await };
    let observe = async {
        while let Some(event) = rx.recv().await {
            on_event(&event);
        }
    };
    let (result, ()) = tokio::join!(probing, observe);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScanStatus, SessionListener};
    use async_trait::async_trait;
    use probe::{PipelineOptions, ProbeStage, SimulatedStage, SimulationProfile, StageKind, StageOutcome, StageState};
    use reality_core::{Locale, ServerParameters};
    use std::sync::{Arc, Mutex};

    struct Fixed(Result<Vec<CandidateAddress>, SourceUnavailable>);

    #[async_trait]
    impl CandidateSource for Fixed {
        fn describe(&self) -> String {
            "fixed".into()
        }

        async fn fetch_candidates(&self) -> Result<Vec<CandidateAddress>, SourceUnavailable> {
            self.0.clone()
        }
    }

    struct FailHandshake;

    #[async_trait]
    impl ProbeStage for FailHandshake {
        fn kind(&self) -> StageKind {
            StageKind::Handshake
        }

        async fn run(&self, _host: &str, _params: &ServerParameters) -> StageOutcome {
            StageOutcome::failure("handshake refused")
        }
    }

    struct Counter(Arc<Mutex<Vec<usize>>>);

    impl SessionListener for Counter {
        fn on_probe_results_changed(&self, results: &[probe::ProbeResult]) {
            self.0.lock().unwrap().push(results.len());
        }
    }

    fn instant_pipeline() -> ProbePipeline {
        let always = |k: StageKind| SimulationProfile { success_rate: 1.0, ..SimulationProfile::for_kind(k).instant() };
        ProbePipeline::new(SimulatedStage::set(always, Some(1)), PipelineOptions::default())
    }

    fn ready_session() -> Session {
        let mut s = Session::new(ServerParameters::default(), Locale::Fa);
        s.regenerate_identity();
        s.set_address("203.0.113.7");
        s
    }

    #[tokio::test]
    async fn scan_publishes_incrementally_and_ranks() {
        let mut session = ready_session();
        let seen = Arc::new(Mutex::new(Vec::new()));
        session.subscribe(Box::new(Counter(seen.clone())));
        let list = vec![CandidateAddress::from("104.16.0.0/13"), CandidateAddress::from("172.64.0.0/13")];

        let results = run_scan(&mut session, &Fixed(Ok(list)), &instant_pipeline()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_passed()));
        assert_eq!(session.results(), results.as_slice());
        assert!(matches!(session.status(), ScanStatus::Finished(_)));
        // subscribe, begin, two incremental, final
        assert_eq!(*seen.lock().unwrap(), vec![0, 0, 1, 2, 2]);
    }

    #[tokio::test]
    async fn unavailable_source_ends_with_empty_results() {
        let mut session = ready_session();
        let err = run_scan(&mut session, &Fixed(Err(SourceUnavailable::new("offline"))), &instant_pipeline())
            .await
            .unwrap_err();
        assert_eq!(err.reason, "offline");
        assert!(session.results().is_empty());
        assert!(matches!(session.status(), ScanStatus::Unavailable { reason, .. } if reason == "offline"));
    }

    #[tokio::test]
    async fn connection_test_reports_every_transition() {
        let session = ready_session();
        let always = |k: StageKind| SimulationProfile { success_rate: 1.0, ..SimulationProfile::for_kind(k).instant() };
        let mut stages = SimulatedStage::set(always, Some(2));
        stages.retain(|s| s.kind() != StageKind::Handshake);
        stages.push(Arc::new(FailHandshake));
        let pipeline = ProbePipeline::new(stages, PipelineOptions::default());

        let mut states = Vec::new();
        let result = run_connection_test(&session, &pipeline, |e| {
            if let ProbeEvent::StageChanged { stage, state, .. } = e {
                states.push((*stage, *state));
            }
        })
        .await
        .unwrap();

        assert_eq!(result.host, "203.0.113.7");
        assert_eq!(result.passed, Some(true));
        assert_eq!(states.len(), 6);
        assert_eq!(states[3], (StageKind::Handshake, StageState::Failure));
    }

    #[tokio::test]
    async fn connection_test_refuses_incomplete_parameters() {
        let session = Session::new(ServerParameters::default(), Locale::En);
        let err = run_connection_test(&session, &instant_pipeline(), |_| {}).await.unwrap_err();
        assert_eq!(err, ValidationError::MissingField("address"));
    }
}
