//! Core data model: ZMW identifiers, subreads, chunks, and the movie-name
//! registry.
//!
//! A *chunk* is the unit of work handed to the consensus engine: all admitted
//! subreads of one ZMW together with the molecule's per-channel SNR. Chunks
//! are owned values; submitting one to the work queue transfers it to a worker
//! by move, so the producer can never touch it again.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHashMap;

use crate::chemistry::ReadGroupChemistry;

/// Interns movie names so every [`ZmwId`] for a movie shares one allocation.
///
/// Populated only by the producer thread; entries are never mutated after
/// insertion, so the shared `Arc<str>` values are safe to hand across thread
/// boundaries inside chunks.
#[derive(Debug, Default)]
pub struct MovieRegistry {
    names: AHashMap<String, Arc<str>>,
}

impl MovieRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared copy of `name`, inserting it on first sight.
    pub fn intern(&mut self, name: &str) -> Arc<str> {
        if let Some(movie) = self.names.get(name) {
            return Arc::clone(movie);
        }
        let movie: Arc<str> = Arc::from(name);
        self.names.insert(name.to_string(), Arc::clone(&movie));
        movie
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Half-open query interval of a subread within its polymerase read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.start, self.end)
    }
}

/// Identifies a ZMW, optionally narrowed to one subread's query interval.
///
/// Identity is by (movie, hole number) only; the interval merely records
/// which piece of the polymerase read a subread came from.
#[derive(Debug, Clone)]
pub struct ZmwId {
    /// Shared movie name from the [`MovieRegistry`].
    pub movie: Arc<str>,
    /// Hole number of the ZMW within the movie.
    pub hole: i32,
    /// Query interval for subread-level ids; `None` at molecule level.
    pub interval: Option<Interval>,
}

impl ZmwId {
    #[must_use]
    pub fn new(movie: Arc<str>, hole: i32) -> Self {
        Self { movie, hole, interval: None }
    }

    #[must_use]
    pub fn with_interval(movie: Arc<str>, hole: i32, interval: Interval) -> Self {
        Self { movie, hole, interval: Some(interval) }
    }
}

impl PartialEq for ZmwId {
    fn eq(&self, other: &Self) -> bool {
        self.hole == other.hole && *self.movie == *other.movie
    }
}

impl Eq for ZmwId {}

impl Hash for ZmwId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.movie.hash(state);
        self.hole.hash(state);
    }
}

impl fmt::Display for ZmwId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interval {
            Some(interval) => write!(f, "{}/{}/{}", self.movie, self.hole, interval),
            None => write!(f, "{}/{}", self.movie, self.hole),
        }
    }
}

/// Per-channel (A, C, G, T) signal-to-noise ratios for one ZMW.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnrVector {
    pub a: f32,
    pub c: f32,
    pub g: f32,
    pub t: f32,
}

impl SnrVector {
    #[must_use]
    pub fn new(a: f32, c: f32, g: f32, t: f32) -> Self {
        Self { a, c, g, t }
    }

    /// The minimum across the four channels, used by the SNR filter.
    #[must_use]
    pub fn minimum(&self) -> f32 {
        self.a.min(self.c).min(self.g).min(self.t)
    }
}

impl From<[f32; 4]> for SnrVector {
    fn from(values: [f32; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }
}

/// One admitted subread, owned by the chunk it was appended to.
#[derive(Debug, Clone)]
pub struct Subread {
    pub id: ZmwId,
    pub seq: Vec<u8>,
    pub local_context_flags: u8,
    /// Read accuracy on the 0-1000 scale used by the per-read filter.
    pub read_accuracy: f32,
}

/// The accumulated, filtered subreads of one ZMW: a unit of consensus work.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ZmwId,
    pub reads: Vec<Subread>,
    pub snr: SnrVector,
}

impl Chunk {
    #[must_use]
    pub fn new(id: ZmwId, snr: SnrVector) -> Self {
        Self { id, reads: Vec::new(), snr }
    }

    #[must_use]
    pub fn num_passes(&self) -> usize {
        self.reads.len()
    }
}

/// One subread as produced by a read source, before any filtering.
///
/// This is the contract the assembler requires of its input stream: all
/// records of a ZMW arrive contiguously, each carrying the molecule-level
/// SNR and read-group chemistry alongside the read-level fields.
#[derive(Debug, Clone)]
pub struct SubreadRecord {
    pub movie: String,
    pub hole: i32,
    pub interval: Interval,
    pub seq: Vec<u8>,
    pub local_context_flags: u8,
    /// Read accuracy on the 0-1000 scale.
    pub read_accuracy: f32,
    pub snr: SnrVector,
    pub chemistry: ReadGroupChemistry,
}
