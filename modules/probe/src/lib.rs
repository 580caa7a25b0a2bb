//! Probe pipeline: validates candidate edge addresses with an ordered set of
//! stages (reachability, handshake, protocol probe) and ranks the results.
//!
//! Addresses are probed one at a time in input order. Within an address the
//! stages run strictly in order and every stage runs, whatever the previous
//! one reported. Per-stage problems are recorded as data; a run never aborts
//! because of them.

mod pipeline;
mod result;
mod simulated;
mod stage;

pub use pipeline::{
    EventSender, PipelineOptions, ProbeEvent, ProbePipeline, DEFAULT_MAX_CANDIDATES,
    DEFAULT_RUN_BUDGET, DEFAULT_STAGE_TIMEOUT,
};
pub use result::{passes, rank, ProbeResult, ProbeRun, PASS_THRESHOLD};
pub use simulated::{SimulatedStage, SimulationProfile};
pub use stage::{
    InvalidTransition, ProbeStage, StageKind, StageOutcome, StageRecord, StageState, StageStatus,
};
