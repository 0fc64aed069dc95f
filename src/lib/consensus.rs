//! Draft consensus engine.
//!
//! The pipeline is engine-agnostic: it accepts any
//! `Fn(Chunk, &ConsensusSettings) -> ResultBatch`. This module ships a simple
//! draft caller so the binary runs end to end: the insert size is estimated
//! as the median pass length, passes far from that estimate are dropped as
//! unusable, the survivors are combined by per-position majority vote, and
//! the predicted accuracy is derived from the pass read scores. It never
//! yields a non-convergent outcome; that classification belongs to iterative
//! engines.

use crate::counts::{ConsensusRecord, ResultBatch, ZmwOutcome};
use crate::model::{Chunk, Subread};
use crate::settings::ConsensusSettings;

const MAX_QUALITY: u8 = 93;

/// Computes a draft consensus for one chunk.
///
/// Classification order: no subreads, insert too short, too many unusable
/// subreads, below predicted accuracy, success. Each chunk lands in exactly
/// one outcome.
#[must_use]
pub fn draft_consensus(chunk: Chunk, settings: &ConsensusSettings) -> ResultBatch {
    let total = chunk.reads.len();
    if total == 0 {
        return ResultBatch::failure(ZmwOutcome::NoSubreads);
    }

    // The median pass length estimates the insert size.
    let mut lengths: Vec<usize> = chunk.reads.iter().map(|read| read.seq.len()).collect();
    lengths.sort_unstable();
    let insert_size = lengths[total / 2];
    if insert_size < settings.min_length {
        return ResultBatch::failure(ZmwOutcome::TooShort);
    }

    // A usable pass is one that plausibly spans the insert: at least half
    // and at most twice the estimated size, and within the length window.
    let usable: Vec<&Subread> = chunk
        .reads
        .iter()
        .filter(|read| {
            let len = read.seq.len();
            len * 2 >= insert_size && len <= insert_size * 2 && len <= settings.max_length
        })
        .collect();
    if usable.is_empty() {
        return ResultBatch::failure(ZmwOutcome::NoSubreads);
    }
    let dropped = (total - usable.len()) as f32 / total as f32;
    if dropped > settings.max_unusable_fraction {
        return ResultBatch::failure(ZmwOutcome::TooManyUnusable);
    }

    let (sequence, qualities) = majority_vote(&usable, insert_size);

    let predicted_accuracy = usable
        .iter()
        .map(|read| read.read_accuracy / 1000.0)
        .sum::<f32>()
        / usable.len() as f32;
    if predicted_accuracy < settings.min_predicted_accuracy {
        return ResultBatch::failure(ZmwOutcome::PoorQuality);
    }

    let num_passes = usable.len() as u32;
    ResultBatch::success(ConsensusRecord {
        id: chunk.id,
        sequence,
        qualities,
        num_passes,
        predicted_accuracy,
        snr: chunk.snr,
    })
}

/// Per-position plurality vote across passes, out to the insert size.
///
/// Base qualities come from the agreement fraction at each position with a
/// Laplace correction, capped at Phred 93.
fn majority_vote(reads: &[&Subread], consensus_len: usize) -> (Vec<u8>, Vec<u8>) {
    let mut sequence = Vec::with_capacity(consensus_len);
    let mut qualities = Vec::with_capacity(consensus_len);
    for i in 0..consensus_len {
        let mut tally = [0u32; 4];
        let mut covering = 0u32;
        for read in reads {
            if let Some(base) = read.seq.get(i) {
                covering += 1;
                if let Some(channel) = channel_of(*base) {
                    tally[channel] += 1;
                }
            }
        }
        let (winner, votes) = tally
            .iter()
            .enumerate()
            .max_by_key(|(_, votes)| **votes)
            .map(|(channel, votes)| (channel, *votes))
            .unwrap_or((0, 0));
        sequence.push(b"ACGT"[winner]);
        qualities.push(agreement_quality(votes, covering));
    }
    (sequence, qualities)
}

fn channel_of(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

fn agreement_quality(votes: u32, covering: u32) -> u8 {
    // Laplace-corrected error estimate so unanimity never yields Phred inf.
    let error = f64::from(covering - votes + 1) / f64::from(covering + 2);
    let quality = (-10.0 * error.log10()).round();
    quality.clamp(0.0, f64::from(MAX_QUALITY)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Interval, SnrVector, ZmwId};
    use std::sync::Arc;

    fn chunk_of(seqs: &[&[u8]], accuracy: f32) -> Chunk {
        let movie: Arc<str> = Arc::from("movie1");
        let mut chunk = Chunk::new(
            ZmwId::new(Arc::clone(&movie), 1),
            SnrVector::new(8.0, 8.0, 8.0, 8.0),
        );
        for seq in seqs {
            chunk.reads.push(Subread {
                id: ZmwId::with_interval(
                    Arc::clone(&movie),
                    1,
                    Interval::new(0, seq.len() as u32),
                ),
                seq: seq.to_vec(),
                local_context_flags: 0,
                read_accuracy: accuracy,
            });
        }
        chunk
    }

    fn settings() -> ConsensusSettings {
        ConsensusSettings { min_length: 4, ..ConsensusSettings::default() }
    }

    #[test]
    fn test_unanimous_passes_succeed() {
        let chunk = chunk_of(&[b"ACGTACGT", b"ACGTACGT", b"ACGTACGT"], 950.0);
        let batch = draft_consensus(chunk, &settings());

        assert_eq!(batch.counts.success, 1);
        let record = &batch.records[0];
        assert_eq!(record.sequence, b"ACGTACGT");
        assert_eq!(record.num_passes, 3);
        assert!(record.predicted_accuracy > 0.9);
        assert_eq!(record.qualities.len(), record.sequence.len());
    }

    #[test]
    fn test_majority_overrules_minority() {
        let chunk = chunk_of(&[b"ACGTACGT", b"ACGTACGT", b"AGGTACGT"], 950.0);
        let batch = draft_consensus(chunk, &settings());
        assert_eq!(batch.records[0].sequence, b"ACGTACGT");
        // the disputed position scores lower than the unanimous ones
        let qualities = &batch.records[0].qualities;
        assert!(qualities[1] < qualities[0]);
    }

    #[test]
    fn test_consensus_length_is_median_pass_length() {
        let chunk = chunk_of(&[b"ACGTA", b"ACGTAC", b"ACGTACG"], 950.0);
        let batch = draft_consensus(chunk, &settings());
        assert_eq!(batch.records[0].sequence.len(), 6);
    }

    #[test]
    fn test_short_insert_rejected() {
        let chunk = chunk_of(&[b"AC", b"ACG", b"ACG"], 950.0);
        let batch = draft_consensus(chunk, &settings());
        assert_eq!(batch.counts.too_short, 1);
        assert!(batch.records.is_empty());
    }

    #[test]
    fn test_empty_chunk_has_no_subreads() {
        let chunk = chunk_of(&[], 950.0);
        let batch = draft_consensus(chunk, &settings());
        assert_eq!(batch.counts.no_subreads, 1);
    }

    #[test]
    fn test_too_many_unusable_subreads() {
        // two fragments far below the insert estimate out of five passes
        let chunk = chunk_of(
            &[b"ACGTACGTACGT", b"ACGTACGTACGT", b"ACGTACGTACGT", b"ACGT", b"ACGT"],
            950.0,
        );
        let mut config = settings();
        config.max_unusable_fraction = 0.25;
        let batch = draft_consensus(chunk, &config);
        assert_eq!(batch.counts.too_many_unusable, 1);
    }

    #[test]
    fn test_low_predicted_accuracy_rejected() {
        let chunk = chunk_of(&[b"ACGTACGT", b"ACGTACGT", b"ACGTACGT"], 700.0);
        let batch = draft_consensus(chunk, &settings());
        assert_eq!(batch.counts.poor_quality, 1);
        assert!(batch.records.is_empty());
    }

    #[test]
    fn test_unusable_passes_do_not_count_toward_np() {
        let chunk = chunk_of(
            &[b"ACGTACGTACGT", b"ACGTACGTACGT", b"ACGTACGTACGT", b"ACGT"],
            950.0,
        );
        let batch = draft_consensus(chunk, &settings());
        assert_eq!(batch.counts.success, 1);
        assert_eq!(batch.records[0].num_passes, 3);
    }
}
