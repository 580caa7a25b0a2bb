use crate::stage::{ProbeStage, StageKind, StageOutcome};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reality_core::ServerParameters;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Success rate and delay range for a simulated stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationProfile {
    pub success_rate: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl SimulationProfile {
    pub fn for_kind(kind: StageKind) -> Self {
        let (success_rate, min_delay_ms, max_delay_ms) = match kind {
            StageKind::Reachability => (0.8, 500, 1000),
            StageKind::Handshake => (0.7, 700, 1500),
            StageKind::ProtocolProbe => (0.75, 1000, 2000),
        };
        SimulationProfile { success_rate, min_delay_ms, max_delay_ms }
    }

    /// A usable profile has a success rate in `0.0..=1.0` and an ordered delay range.
    pub fn check(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(format!("success_rate must be between 0 and 1, got {}", self.success_rate));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(format!("min_delay_ms {} exceeds max_delay_ms {}", self.min_delay_ms, self.max_delay_ms));
        }
        Ok(())
    }

    /// Same success rate, no waiting.
    pub fn instant(self) -> Self {
        SimulationProfile { min_delay_ms: 0, max_delay_ms: 0, ..self }
    }
}

/// Stand-in for a network probe: waits a random delay, then succeeds with the
/// profile's probability. Replace with real probes behind the same trait.
pub struct SimulatedStage {
    kind: StageKind,
    profile: SimulationProfile,
    rng: Mutex<StdRng>,
}

struct Roll {
    delay_ms: u64,
    ok: bool,
    latency_ms: u64,
    loss: u8,
}

impl SimulatedStage {
    pub fn new(kind: StageKind, profile: SimulationProfile, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s.wrapping_add(kind as u64)),
            None => StdRng::from_entropy(),
        };
        SimulatedStage { kind, profile, rng: Mutex::new(rng) }
    }

    /// All three stages in execution order with the given profiles.
    pub fn set(
        profiles: impl Fn(StageKind) -> SimulationProfile,
        seed: Option<u64>,
    ) -> Vec<Arc<dyn ProbeStage>> {
        StageKind::ALL
            .iter()
            .map(|&k| Arc::new(SimulatedStage::new(k, profiles(k), seed)) as Arc<dyn ProbeStage>)
            .collect()
    }

    fn roll(&self) -> Roll {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let p = self.profile;
        let delay_ms = if p.max_delay_ms > p.min_delay_ms {
            rng.gen_range(p.min_delay_ms..p.max_delay_ms)
        } else {
            p.min_delay_ms
        };
        // NaN never succeeds.
        let rate = if p.success_rate.is_nan() { 0.0 } else { p.success_rate.clamp(0.0, 1.0) };
        let ok = rng.gen_bool(rate);
        let latency_ms = rng.gen_range(50..250);
        let loss = if rng.gen_bool(0.1) { rng.gen_range(0..10) } else { 0 };
        Roll { delay_ms, ok, latency_ms, loss }
    }
}

#[async_trait]
impl ProbeStage for SimulatedStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn run(&self, host: &str, params: &ServerParameters) -> StageOutcome {
        let roll = self.roll();
        if roll.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(roll.delay_ms)).await;
        }
        let sni = &params.server_name;
        let port = params.port;
        match (self.kind, roll.ok) {
            (StageKind::Reachability, true) => {
                StageOutcome::success("host seems reachable").with_latency(roll.latency_ms, roll.loss)
            }
            (StageKind::Reachability, false) => StageOutcome::failure("host or port might be unreachable"),
            (StageKind::Handshake, true) => StageOutcome::success("TLS handshake successful with SNI")
                .with_detail(format!("simulated: curl --resolve {sni}:{port}:{host} https://{sni} -v OK")),
            (StageKind::Handshake, false) => StageOutcome::failure("TLS handshake or SNI match failed")
                .with_detail(format!(
                    "simulated: curl --resolve {sni}:{port}:{host} https://{sni} -v FAILED \
                     (check SNI, port, firewall, or whether the proxy is running)"
                )),
            (StageKind::ProtocolProbe, true) => {
                StageOutcome::success("Reality probe successful").with_detail("simulated: probe reported OK")
            }
            (StageKind::ProtocolProbe, false) => StageOutcome::failure("Reality probe failed")
                .with_detail("simulated: probe failed; check Reality config, keys, UUID, SNI"),
        }
    }
}
