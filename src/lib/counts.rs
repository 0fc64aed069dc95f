//! Per-ZMW outcome classification and aggregate counters.

use std::ops::AddAssign;

use crate::model::{SnrVector, ZmwId};

/// The mutually exclusive outcomes a ZMW can be classified into.
///
/// Every molecule seen by the pipeline lands in exactly one of these, or is
/// excluded without counter effect (whitelist/chemistry exclusion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZmwOutcome {
    /// A consensus sequence was generated
    Success,
    /// Molecule SNR below the minimum threshold
    PoorSnr,
    /// No usable subreads after engine-side filtering
    NoSubreads,
    /// Insert size too small
    TooShort,
    /// Fewer passes than the configured minimum
    TooFewPasses,
    /// Too many subreads dropped as unusable
    TooManyUnusable,
    /// The consensus did not converge
    NonConvergent,
    /// Consensus below the minimum predicted accuracy
    PoorQuality,
}

impl ZmwOutcome {
    /// All outcomes in report order.
    pub const ALL: [ZmwOutcome; 8] = [
        ZmwOutcome::Success,
        ZmwOutcome::PoorSnr,
        ZmwOutcome::NoSubreads,
        ZmwOutcome::TooShort,
        ZmwOutcome::TooFewPasses,
        ZmwOutcome::TooManyUnusable,
        ZmwOutcome::NonConvergent,
        ZmwOutcome::PoorQuality,
    ];

    /// The report row label for this outcome.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ZmwOutcome::Success => "Success -- CCS generated",
            ZmwOutcome::PoorSnr => "Failed -- Below SNR threshold",
            ZmwOutcome::NoSubreads => "Failed -- No usable subreads",
            ZmwOutcome::TooShort => "Failed -- Insert size too small",
            ZmwOutcome::TooFewPasses => "Failed -- Not enough full passes",
            ZmwOutcome::TooManyUnusable => "Failed -- Too many unusable subreads",
            ZmwOutcome::NonConvergent => "Failed -- CCS did not converge",
            ZmwOutcome::PoorQuality => "Failed -- CCS below minimum predicted accuracy",
        }
    }
}

/// Aggregate outcome counters for a run.
///
/// Combinable by `+=`: the writer thread accumulates one instance per
/// consumed batch, and the pre-submission rejections tracked by the
/// assembler are merged in at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsensusCounts {
    pub success: u64,
    pub poor_snr: u64,
    pub no_subreads: u64,
    pub too_short: u64,
    pub too_few_passes: u64,
    pub too_many_unusable: u64,
    pub non_convergent: u64,
    pub poor_quality: u64,
}

impl ConsensusCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter for `outcome` by one.
    pub fn record(&mut self, outcome: ZmwOutcome) {
        match outcome {
            ZmwOutcome::Success => self.success += 1,
            ZmwOutcome::PoorSnr => self.poor_snr += 1,
            ZmwOutcome::NoSubreads => self.no_subreads += 1,
            ZmwOutcome::TooShort => self.too_short += 1,
            ZmwOutcome::TooFewPasses => self.too_few_passes += 1,
            ZmwOutcome::TooManyUnusable => self.too_many_unusable += 1,
            ZmwOutcome::NonConvergent => self.non_convergent += 1,
            ZmwOutcome::PoorQuality => self.poor_quality += 1,
        }
    }

    #[must_use]
    pub fn get(&self, outcome: ZmwOutcome) -> u64 {
        match outcome {
            ZmwOutcome::Success => self.success,
            ZmwOutcome::PoorSnr => self.poor_snr,
            ZmwOutcome::NoSubreads => self.no_subreads,
            ZmwOutcome::TooShort => self.too_short,
            ZmwOutcome::TooFewPasses => self.too_few_passes,
            ZmwOutcome::TooManyUnusable => self.too_many_unusable,
            ZmwOutcome::NonConvergent => self.non_convergent,
            ZmwOutcome::PoorQuality => self.poor_quality,
        }
    }

    /// Total molecules accounted for across all outcomes.
    #[must_use]
    pub fn total(&self) -> u64 {
        ZmwOutcome::ALL.iter().map(|outcome| self.get(*outcome)).sum()
    }
}

impl AddAssign for ConsensusCounts {
    fn add_assign(&mut self, other: Self) {
        self.success += other.success;
        self.poor_snr += other.poor_snr;
        self.no_subreads += other.no_subreads;
        self.too_short += other.too_short;
        self.too_few_passes += other.too_few_passes;
        self.too_many_unusable += other.too_many_unusable;
        self.non_convergent += other.non_convergent;
        self.poor_quality += other.poor_quality;
    }
}

/// One computed consensus sequence.
#[derive(Debug, Clone)]
pub struct ConsensusRecord {
    pub id: ZmwId,
    pub sequence: Vec<u8>,
    /// Raw Phred scores, one per consensus base.
    pub qualities: Vec<u8>,
    pub num_passes: u32,
    pub predicted_accuracy: f32,
    pub snr: SnrVector,
}

/// Output of one consensus engine invocation: zero or more records plus the
/// outcome counters for the chunk. Ownership moves from worker to the writer
/// thread exactly once.
#[derive(Debug, Clone, Default)]
pub struct ResultBatch {
    pub records: Vec<ConsensusRecord>,
    pub counts: ConsensusCounts,
}

impl ResultBatch {
    /// A batch recording a single failed ZMW.
    #[must_use]
    pub fn failure(outcome: ZmwOutcome) -> Self {
        let mut counts = ConsensusCounts::new();
        counts.record(outcome);
        Self { records: Vec::new(), counts }
    }

    /// A batch recording one successful consensus record.
    #[must_use]
    pub fn success(record: ConsensusRecord) -> Self {
        let mut counts = ConsensusCounts::new();
        counts.record(ZmwOutcome::Success);
        Self { records: vec![record], counts }
    }
}
