use crate::stage::{StageKind, StageOutcome, StageRecord, StageState};
use reality_core::CandidateAddress;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Minimum number of successful stages for an address to pass.
pub const PASS_THRESHOLD: usize = 2;

/// An address passes when no stage errored and at least two stages succeeded.
pub fn passes<I: IntoIterator<Item = StageState>>(states: I) -> bool {
    let mut successes = 0;
    for s in states {
        match s {
            StageState::Error => return false,
            StageState::Success => successes += 1,
            _ => {}
        }
    }
    successes >= PASS_THRESHOLD
}

/// Per-address stage records for the duration of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRun {
    pub address: CandidateAddress,
    pub stages: Vec<StageRecord>,
}

impl ProbeRun {
    pub fn new(address: CandidateAddress, kinds: &[StageKind]) -> Self {
        ProbeRun { address, stages: kinds.iter().copied().map(StageRecord::new).collect() }
    }

    pub fn is_finished(&self) -> bool {
        self.stages.iter().all(|s| s.state.is_terminal())
    }

    pub fn passed(&self) -> bool {
        self.is_finished() && passes(self.stages.iter().map(|s| s.state))
    }
}

/// Published outcome for one candidate. `passed` stays `None` while pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub address: String,
    pub host: String,
    pub latency_ms: Option<u64>,
    pub packet_loss_percent: Option<u8>,
    pub passed: Option<bool>,
}

impl ProbeResult {
    pub fn pending(address: &CandidateAddress, host: &str) -> Self {
        ProbeResult {
            address: address.address().to_string(),
            host: host.to_string(),
            latency_ms: None,
            packet_loss_percent: None,
            passed: None,
        }
    }

    /// Keep the first latency/loss measurement any stage reports.
    pub fn record_metrics(&mut self, outcome: &StageOutcome) {
        if self.latency_ms.is_none() {
            self.latency_ms = outcome.latency_ms;
        }
        if self.packet_loss_percent.is_none() {
            self.packet_loss_percent = outcome.packet_loss_percent;
        }
    }

    pub fn is_passed(&self) -> bool {
        self.passed == Some(true)
    }
}

fn compare(a: &ProbeResult, b: &ProbeResult) -> Ordering {
    let group = |r: &ProbeResult| if r.is_passed() { 0u8 } else { 1 };
    group(a).cmp(&group(b)).then_with(|| match (a.latency_ms, b.latency_ms) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

/// Passed addresses first, then by latency; unmeasured latency sorts last in
/// its group. Stable, so ties keep scan order.
pub fn rank(results: &mut [ProbeResult]) {
    results.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageState::*;

    fn result(address: &str, passed: bool, latency: Option<u64>) -> ProbeResult {
        ProbeResult {
            address: address.into(),
            host: address.into(),
            latency_ms: latency,
            packet_loss_percent: None,
            passed: Some(passed),
        }
    }

    #[test]
    fn two_of_three_without_errors() {
        assert!(passes([Success, Success, Success]));
        assert!(passes([Success, Failure, Success]));
        assert!(!passes([Success, Error, Success]));
        assert!(!passes([Failure, Failure, Success]));
        assert!(!passes([Success, Failure, Failure]));
        assert!(!passes([Error, Success, Success]));
    }

    #[test]
    fn unfinished_run_does_not_pass() {
        let mut run = ProbeRun::new(CandidateAddress::from("1.1.1.1"), &StageKind::ALL);
        for s in run.stages.iter_mut().take(2) {
            s.begin().unwrap();
            s.finish(&StageOutcome::success("ok")).unwrap();
        }
        assert!(!run.is_finished());
        assert!(!run.passed());
    }

    #[test]
    fn passed_first_then_latency() {
        let mut v = vec![
            result("a", false, Some(10)),
            result("b", true, Some(120)),
            result("c", true, None),
            result("d", true, Some(40)),
            result("e", false, None),
            result("f", false, Some(5)),
        ];
        rank(&mut v);
        let order: Vec<_> = v.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(order, vec!["d", "b", "c", "f", "a", "e"]);
    }

    #[test]
    fn ties_keep_scan_order() {
        let mut v = vec![
            result("first", true, Some(80)),
            result("second", true, Some(80)),
            result("third", false, None),
            result("fourth", false, None),
        ];
        rank(&mut v);
        let order: Vec<_> = v.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn first_measurement_wins() {
        let mut r = ProbeResult::pending(&CandidateAddress::from("1.1.1.1"), "1.1.1.1");
        r.record_metrics(&StageOutcome::success("ok").with_latency(70, 0));
        r.record_metrics(&StageOutcome::success("ok").with_latency(900, 50));
        assert_eq!(r.latency_ms, Some(70));
        assert_eq!(r.packet_loss_percent, Some(0));
        assert_eq!(r.passed, None);
    }
}
