#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

//! # ccs - Circular Consensus Sequencing pipeline
//!
//! This library implements the streaming pipeline behind the `ccs` command line
//! tool: subreads are grouped by originating ZMW, filtered, and dispatched as
//! per-molecule chunks to a pool of worker threads running a consensus engine,
//! while a single writer thread drains results in strict submission order.
//!
//! ## Overview
//!
//! - **[`work_queue`]** - Bounded, order-preserving work queue (the concurrency core)
//! - **[`assembler`]** - Streaming state machine turning subreads into chunks
//! - **[`pipeline`]** - Producer/worker/writer wiring and the result drain loop
//! - **[`model`]** - ZMW identifiers, subreads, chunks, the movie-name registry
//! - **[`counts`]** - Per-ZMW outcome classification and aggregate counters
//! - **[`consensus`]** - A simple draft consensus engine
//! - **[`settings`]** - Pipeline parameters and thread-count selection
//! - **[`bam`]** - Subread BAM input shim built on noodles
//! - **[`sink`]** - Record sink and index builder collaborators
//! - **[`report`]** - The final results report
//!
//! ## Quick start
//!
//! ```no_run
//! use ccs_lib::bam::BamSubreadReader;
//! use ccs_lib::consensus::draft_consensus;
//! use ccs_lib::pipeline::run_pipeline;
//! use ccs_lib::settings::ConsensusSettings;
//! use ccs_lib::sink::FastqRecordSink;
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = ConsensusSettings::default();
//! let reads = BamSubreadReader::new(vec!["subreads.bam".into()]);
//! let mut sink = FastqRecordSink::new(std::fs::File::create("out.fastq")?);
//! let counts = run_pipeline(reads, draft_consensus, &settings, &mut sink, None)?;
//! println!("{} ZMWs succeeded", counts.success);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod bam;
pub mod chemistry;
pub mod consensus;
pub mod counts;
pub mod errors;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod settings;
pub mod sink;
pub mod whitelist;
pub mod work_queue;

pub use counts::{ConsensusCounts, ZmwOutcome};
pub use errors::CcsError;
pub use settings::ConsensusSettings;
