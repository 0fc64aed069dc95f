//! Streaming assembly of contiguous subreads into per-ZMW chunks.
//!
//! The input stream groups every ZMW's subreads contiguously (standard
//! subread BAM ordering). The assembler watches for the (movie, hole)
//! boundary, applies the admission filters, and hands each completed chunk to
//! a caller-supplied submit callback. It holds at most one chunk in memory at
//! any time.
//!
//! Filtering happens at three levels:
//!
//! * ZMW admission, decided on the first record of a molecule: whitelist
//!   exclusion (silent), unsupported chemistry (logged, no counter), and the
//!   molecule SNR threshold (counted as a poor-SNR failure).
//! * Per-read: subreads below the minimum read accuracy are dropped without
//!   affecting the molecule's admission.
//! * At the boundary: a chunk with fewer passes than `min_passes` is counted
//!   as a too-few-passes failure instead of being submitted.
//!
//! The admission counters accumulate locally and are merged into the run
//! totals after the pipeline drains; see [`crate::pipeline`].

use anyhow::Result;
use log::{debug, info};

use crate::model::{Chunk, MovieRegistry, Subread, SubreadRecord, ZmwId};
use crate::settings::ConsensusSettings;

/// Tracks the molecule currently being accumulated.
///
/// `chunk` is `None` when the molecule was rejected at admission; subsequent
/// records of the same ZMW are then discarded without re-evaluating the
/// filters.
struct CurrentZmw {
    id: ZmwId,
    chunk: Option<Chunk>,
}

/// Stateful chunk builder over a stream of contiguous subread records.
pub struct ChunkAssembler<'a> {
    settings: &'a ConsensusSettings,
    movies: MovieRegistry,
    current: Option<CurrentZmw>,
    poor_snr: u64,
    too_few_passes: u64,
}

impl<'a> ChunkAssembler<'a> {
    #[must_use]
    pub fn new(settings: &'a ConsensusSettings) -> Self {
        Self {
            settings,
            movies: MovieRegistry::new(),
            current: None,
            poor_snr: 0,
            too_few_passes: 0,
        }
    }

    /// Feeds one record through the state machine.
    ///
    /// Calls `submit` with a completed chunk whenever this record opens a new
    /// ZMW and the previous chunk passes the minimum-passes gate. `submit` is
    /// the backpressure point: it may block until the work queue has room.
    pub fn process<F>(&mut self, record: SubreadRecord, submit: &mut F) -> Result<()>
    where
        F: FnMut(Chunk) -> Result<()>,
    {
        let boundary = match &self.current {
            Some(current) => {
                current.id.hole != record.hole || *current.id.movie != record.movie
            }
            None => false,
        };
        if boundary {
            self.flush(submit)?;
        }

        if self.current.is_none() {
            self.current = Some(self.admit(&record));
        }

        let current = self.current.as_mut().expect("current ZMW exists");
        if let Some(chunk) = current.chunk.as_mut() {
            if record.read_accuracy < self.settings.min_read_score {
                debug!(
                    "dropping subread {}/{}/{}: read accuracy {} below {}",
                    record.movie,
                    record.hole,
                    record.interval,
                    record.read_accuracy,
                    self.settings.min_read_score
                );
            } else {
                chunk.reads.push(Subread {
                    id: ZmwId::with_interval(
                        chunk.id.movie.clone(),
                        record.hole,
                        record.interval,
                    ),
                    seq: record.seq,
                    local_context_flags: record.local_context_flags,
                    read_accuracy: record.read_accuracy,
                });
            }
        }
        Ok(())
    }

    /// Flushes the final chunk once the input stream is exhausted.
    pub fn finish<F>(&mut self, submit: &mut F) -> Result<()>
    where
        F: FnMut(Chunk) -> Result<()>,
    {
        self.flush(submit)
    }

    /// ZMWs rejected by the molecule SNR filter so far.
    #[must_use]
    pub fn poor_snr(&self) -> u64 {
        self.poor_snr
    }

    /// Chunks rejected by the minimum-passes gate so far.
    #[must_use]
    pub fn too_few_passes(&self) -> u64 {
        self.too_few_passes
    }

    /// Decides admission for a new ZMW based on its first record.
    fn admit(&mut self, record: &SubreadRecord) -> CurrentZmw {
        let movie = self.movies.intern(&record.movie);
        let id = ZmwId::new(movie, record.hole);

        if let Some(whitelist) = &self.settings.whitelist {
            if !whitelist.contains(&record.movie, record.hole) {
                return CurrentZmw { id, chunk: None };
            }
        }

        if !record.chemistry.is_supported() {
            info!(
                "skipping {id}: unsupported chemistry (binding kit {:?}, sequencing kit {:?}, basecaller {:?})",
                record.chemistry.binding_kit,
                record.chemistry.sequencing_kit,
                record.chemistry.basecaller_version
            );
            return CurrentZmw { id, chunk: None };
        }

        if record.snr.minimum() < self.settings.min_snr {
            debug!(
                "skipping {id}: SNR {} below {}",
                record.snr.minimum(),
                self.settings.min_snr
            );
            self.poor_snr += 1;
            return CurrentZmw { id, chunk: None };
        }

        let chunk = Chunk::new(id.clone(), record.snr);
        CurrentZmw { id, chunk: Some(chunk) }
    }

    fn flush<F>(&mut self, submit: &mut F) -> Result<()>
    where
        F: FnMut(Chunk) -> Result<()>,
    {
        let Some(current) = self.current.take() else {
            return Ok(());
        };
        let Some(chunk) = current.chunk else {
            return Ok(());
        };
        if chunk.num_passes() < self.settings.min_passes {
            debug!(
                "skipping {}: {} passes below {}",
                chunk.id,
                chunk.num_passes(),
                self.settings.min_passes
            );
            self.too_few_passes += 1;
            return Ok(());
        }
        submit(chunk)
    }
}
