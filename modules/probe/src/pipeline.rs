use crate::result::{rank, ProbeResult, ProbeRun};
use crate::simulated::{SimulatedStage, SimulationProfile};
use crate::stage::{ProbeStage, StageKind, StageOutcome, StageRecord, StageState};
use reality_core::{CandidateAddress, RunId, ServerParameters};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CANDIDATES: usize = 10;
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RUN_BUDGET: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_candidates: usize,
    pub stage_timeout: Duration,
    /// Wall-clock limit for a whole run. Addresses not started in time are skipped.
    pub run_budget: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            max_candidates: DEFAULT_MAX_CANDIDATES,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            run_budget: Some(DEFAULT_RUN_BUDGET),
        }
    }
}

/// Progress of a run, tagged with its id so the aggregator can drop stale ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Started {
        run: RunId,
        addresses: Vec<String>,
    },
    StageChanged {
        run: RunId,
        address: String,
        stage: StageKind,
        state: StageState,
        message: Option<String>,
        detail: Option<String>,
    },
    AddressFinished {
        run: RunId,
        result: ProbeResult,
    },
    Finished {
        run: RunId,
        results: Vec<ProbeResult>,
    },
    SourceUnavailable {
        run: RunId,
        reason: String,
    },
}

impl ProbeEvent {
    pub fn run(&self) -> RunId {
        match self {
            ProbeEvent::Started { run, .. }
            | ProbeEvent::StageChanged { run, .. }
            | ProbeEvent::AddressFinished { run, .. }
            | ProbeEvent::Finished { run, .. }
            | ProbeEvent::SourceUnavailable { run, .. } => *run,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<ProbeEvent>;

pub struct ProbePipeline {
    stages: Vec<Arc<dyn ProbeStage>>,
    options: PipelineOptions,
}

impl ProbePipeline {
    pub fn new(mut stages: Vec<Arc<dyn ProbeStage>>, options: PipelineOptions) -> Self {
        stages.sort_by_key(|s| s.kind());
        ProbePipeline { stages, options }
    }

    /// Pipeline over the simulated stages with their default profiles.
    pub fn simulated(options: PipelineOptions, seed: Option<u64>) -> Self {
        Self::new(SimulatedStage::set(SimulationProfile::for_kind, seed), options)
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Probe the first `max_candidates` addresses in order and return the
    /// ranked results. Progress is published on `events` as it happens; a
    /// closed receiver does not stop the run.
    pub async fn run(
        &self,
        run: RunId,
        candidates: &[CandidateAddress],
        params: &ServerParameters,
        events: &EventSender,
    ) -> Vec<ProbeResult> {
        let selected = &candidates[..candidates.len().min(self.options.max_candidates)];
        if selected.len() < candidates.len() {
            debug!(total = candidates.len(), probing = selected.len(), "candidate list capped");
        }
        let _ = events.send(ProbeEvent::Started {
            run,
            addresses: selected.iter().map(|c| c.address().to_string()).collect(),
        });
        info!(%run, addresses = selected.len(), "probe run started");

        let deadline = self.options.run_budget.map(|b| Instant::now() + b);
        let mut results = Vec::with_capacity(selected.len());
        for candidate in selected {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(%run, probed = results.len(), skipped = selected.len() - results.len(), "run budget exhausted");
                break;
            }
            let result = self.probe_address(run, candidate, params, events).await;
            let _ = events.send(ProbeEvent::AddressFinished { run, result: result.clone() });
            results.push(result);
        }

        rank(&mut results);
        info!(%run, passed = results.iter().filter(|r| r.is_passed()).count(), total = results.len(), "probe run finished");
        let _ = events.send(ProbeEvent::Finished { run, results: results.clone() });
        results
    }

    /// Run every stage for one address, in order, regardless of earlier outcomes.
    pub async fn probe_address(
        &self,
        run: RunId,
        candidate: &CandidateAddress,
        params: &ServerParameters,
        events: &EventSender,
    ) -> ProbeResult {
        let host = candidate.probe_host();
        let kinds = self.stage_kinds();
        let mut probe = ProbeRun::new(candidate.clone(), &kinds);
        let mut result = ProbeResult::pending(candidate, &host);

        for (stage, record) in self.stages.iter().zip(probe.stages.iter_mut()) {
            if let Err(e) = record.begin() {
                warn!(error = %e, "skipping stage");
                continue;
            }
            publish(events, run, candidate, record);

            let outcome = match stage.kind().check_preconditions(&host, params) {
                Err(message) => StageOutcome::error(message),
                Ok(()) => {
                    let limit = stage.timeout().unwrap_or(self.options.stage_timeout);
                    match tokio::time::timeout(limit, stage.run(&host, params)).await {
                        Ok(outcome) => outcome,
                        Err(_) => StageOutcome::failure(format!("timed out after {} ms", limit.as_millis())),
                    }
                }
            };
            result.record_metrics(&outcome);

            if let Err(e) = record.finish(&outcome) {
                warn!(error = %e, "dropping stage outcome");
                continue;
            }
            debug!(address = %candidate, stage = %record.kind, state = %record.state, "stage finished");
            publish(events, run, candidate, record);
        }

        result.passed = Some(probe.passed());
        result
    }
}

fn publish(events: &EventSender, run: RunId, candidate: &CandidateAddress, record: &StageRecord) {
    let _ = events.send(ProbeEvent::StageChanged {
        run,
        address: candidate.address().to_string(),
        stage: record.kind,
        state: record.state,
        message: record.message.clone(),
        detail: record.detail.clone(),
    });
}
