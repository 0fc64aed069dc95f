//! Pipeline driver: producer, worker pool, and the ordered writer loop.
//!
//! Three roles run concurrently:
//!
//! * the producer (the calling thread) pulls records from the read source,
//!   assembles chunks, and submits them to the work queue;
//! * the worker pool runs the consensus engine on each chunk;
//! * one writer thread consumes results in submission order, forwarding
//!   records to the sink and accumulating outcome counts.
//!
//! The first error from any role fails the run. The writer keeps draining
//! result handles after an error (without applying them) so the producer is
//! never left blocked on backpressure during an error unwind.

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use log::debug;

use crate::assembler::ChunkAssembler;
use crate::counts::{ConsensusCounts, ResultBatch};
use crate::model::{Chunk, SubreadRecord};
use crate::settings::ConsensusSettings;
use crate::sink::{IndexBuilder, RecordSink};
use crate::work_queue::{ResultStream, WorkQueue};

/// Runs the full consensus pipeline over a stream of subread records.
///
/// `engine` is invoked once per chunk on the worker pool. Records reach
/// `sink` (and `index`, when present) in ZMW input order regardless of which
/// worker finished first. Returns the aggregate outcome counts, including
/// the assembler's pre-submission rejections.
pub fn run_pipeline<I, E>(
    reads: I,
    engine: E,
    settings: &ConsensusSettings,
    sink: &mut (dyn RecordSink + Send),
    index: Option<&mut (dyn IndexBuilder + Send)>,
) -> Result<ConsensusCounts>
where
    I: Iterator<Item = Result<SubreadRecord>>,
    E: Fn(Chunk, &ConsensusSettings) -> ResultBatch + Send + Sync + 'static,
{
    let threads = settings.num_threads.max(1);
    let (queue, results) = WorkQueue::with_capacity(threads, threads * 2);

    // Workers outlive this stack frame, so they get their own settings.
    let engine = Arc::new(engine);
    let worker_settings = Arc::new(settings.clone());

    let mut assembler = ChunkAssembler::new(settings);

    let (mut counts, producer_result, writer_error) = thread::scope(|scope| {
        let writer = scope.spawn(move || drain_results(results, sink, index));

        let mut submit = |chunk: Chunk| {
            let engine = Arc::clone(&engine);
            let settings = Arc::clone(&worker_settings);
            queue.submit(move || Ok(engine(chunk, &settings)))
        };

        let producer_result = (|| {
            for read in reads {
                assembler.process(read?, &mut submit)?;
            }
            assembler.finish(&mut submit)
        })();

        drop(submit);
        queue.finalize();
        let (counts, writer_error) = writer
            .join()
            .map_err(|_| anyhow!("writer thread panicked"))?;
        Ok::<_, anyhow::Error>((counts, producer_result, writer_error))
    })?;

    producer_result?;
    if let Some(error) = writer_error {
        return Err(error);
    }

    debug!(
        "merging pre-submission rejections: {} poor SNR, {} too few passes",
        assembler.poor_snr(),
        assembler.too_few_passes()
    );
    counts.poor_snr += assembler.poor_snr();
    counts.too_few_passes += assembler.too_few_passes();
    Ok(counts)
}

/// The writer loop: consumes batches in submission order until end-of-stream.
///
/// Returns the accumulated counts together with the first error observed, if
/// any. After an error the remaining handles are still consumed, discarded,
/// so the queue drains cleanly.
fn drain_results(
    results: ResultStream<ResultBatch>,
    sink: &mut (dyn RecordSink + Send),
    mut index: Option<&mut (dyn IndexBuilder + Send)>,
) -> (ConsensusCounts, Option<anyhow::Error>) {
    let mut counts = ConsensusCounts::new();
    let mut first_error: Option<anyhow::Error> = None;

    loop {
        let more = if first_error.is_none() {
            results.consume(|batch| {
                counts += batch.counts;
                for record in &batch.records {
                    let offset = sink
                        .write(record)
                        .with_context(|| format!("failed to write {}", record.id))?;
                    if let Some(index) = index.as_deref_mut() {
                        index.add_record(record, offset)?;
                    }
                }
                Ok(())
            })
        } else {
            results.consume(|_| Ok(()))
        };

        match more {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }

    if first_error.is_none() {
        if let Err(error) = sink.flush() {
            first_error = Some(error);
        }
    }
    (counts, first_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::ReadGroupChemistry;
    use crate::consensus::draft_consensus;
    use crate::counts::ConsensusRecord;
    use crate::model::{Interval, SnrVector};
    use crate::sink::{FastqRecordSink, TsvIndexBuilder};
    use anyhow::bail;
    use rand::Rng;
    use std::time::Duration;

    fn record(movie: &str, hole: i32, start: u32, seq: &[u8]) -> SubreadRecord {
        SubreadRecord {
            movie: movie.to_string(),
            hole,
            interval: Interval::new(start, start + seq.len() as u32),
            seq: seq.to_vec(),
            local_context_flags: 0,
            read_accuracy: 950.0,
            snr: SnrVector::new(8.0, 8.0, 8.0, 8.0),
            chemistry: ReadGroupChemistry::new("100356300", "100356200", "2.3.0"),
        }
    }

    fn zmw(movie: &str, hole: i32, passes: usize) -> Vec<SubreadRecord> {
        (0..passes)
            .map(|i| record(movie, hole, i as u32 * 20, b"ACGTACGTACGTACGT"))
            .collect()
    }

    fn settings(threads: usize) -> ConsensusSettings {
        ConsensusSettings { num_threads: threads, ..ConsensusSettings::default() }
    }

    #[test]
    fn test_end_to_end_counts_and_output() {
        let mut reads = Vec::new();
        reads.extend(zmw("movie1", 1, 5));
        reads.extend(zmw("movie1", 2, 2)); // below min_passes
        let mut poor: Vec<_> = zmw("movie1", 3, 5);
        for read in &mut poor {
            read.snr = SnrVector::new(8.0, 2.0, 8.0, 8.0);
        }
        reads.extend(poor);
        reads.extend(zmw("movie1", 4, 4));

        let mut sink = FastqRecordSink::new(Vec::new());
        let counts = run_pipeline(
            reads.into_iter().map(Ok),
            draft_consensus,
            &settings(2),
            &mut sink,
            None,
        )
        .unwrap();

        assert_eq!(counts.success, 2);
        assert_eq!(counts.too_few_passes, 1);
        assert_eq!(counts.poor_snr, 1);
        assert_eq!(counts.total(), 4);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let names: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with('@'))
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("@movie1/1/ccs"));
        assert!(names[1].starts_with("@movie1/4/ccs"));
    }

    #[test]
    fn test_output_order_is_input_order_under_contention() {
        let mut reads = Vec::new();
        for hole in 0..24 {
            reads.extend(zmw("movie1", hole, 3));
        }

        // random per-chunk latency so completion order differs from input
        let engine = |chunk: Chunk, settings: &ConsensusSettings| {
            let millis = rand::thread_rng().gen_range(0..10);
            thread::sleep(Duration::from_millis(millis));
            draft_consensus(chunk, settings)
        };

        let mut sink = FastqRecordSink::new(Vec::new());
        let counts =
            run_pipeline(reads.into_iter().map(Ok), engine, &settings(4), &mut sink, None)
                .unwrap();
        assert_eq!(counts.success, 24);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let holes: Vec<String> = text
            .lines()
            .filter(|line| line.starts_with('@'))
            .map(|line| line.split('/').nth(1).unwrap().to_string())
            .collect();
        let expected: Vec<String> = (0..24).map(|hole| hole.to_string()).collect();
        assert_eq!(holes, expected);
    }

    #[test]
    fn test_index_entries_match_sink_offsets() {
        let mut reads = Vec::new();
        reads.extend(zmw("movie1", 1, 4));
        reads.extend(zmw("movie1", 2, 4));

        let mut sink = FastqRecordSink::new(Vec::new());
        let mut index = TsvIndexBuilder::new(Vec::new());
        run_pipeline(
            reads.into_iter().map(Ok),
            draft_consensus,
            &settings(2),
            &mut sink,
            Some(&mut index),
        )
        .unwrap();

        let fastq = sink.into_inner();
        let index_text = String::from_utf8(index.into_inner()).unwrap();
        assert_eq!(index_text.lines().count(), 2);
        for line in index_text.lines() {
            let offset: usize = line.split('\t').nth(1).unwrap().parse().unwrap();
            assert_eq!(fastq[offset], b'@');
        }
    }

    #[test]
    fn test_read_source_error_fails_the_run() {
        let reads: Vec<Result<SubreadRecord>> = vec![
            Ok(record("movie1", 1, 0, b"ACGTACGTACGTACGT")),
            Err(anyhow!("truncated input")),
        ];

        let mut sink = FastqRecordSink::new(Vec::new());
        let err = run_pipeline(reads.into_iter(), draft_consensus, &settings(2), &mut sink, None)
            .unwrap_err();
        assert!(err.to_string().contains("truncated input"));
    }

    #[test]
    fn test_engine_error_fails_without_wedging() {
        let mut reads = Vec::new();
        for hole in 0..16 {
            reads.extend(zmw("movie1", hole, 3));
        }

        let engine = |chunk: Chunk, settings: &ConsensusSettings| {
            if chunk.id.hole == 3 {
                panic!("engine fault");
            }
            draft_consensus(chunk, settings)
        };

        let mut sink = FastqRecordSink::new(Vec::new());
        let err =
            run_pipeline(reads.into_iter().map(Ok), engine, &settings(2), &mut sink, None)
                .unwrap_err();
        assert!(err.to_string().contains("engine fault"));
    }

    #[test]
    fn test_sink_error_fails_the_run() {
        struct FailingSink;
        impl RecordSink for FailingSink {
            fn write(&mut self, _record: &ConsensusRecord) -> Result<u64> {
                bail!("disk full")
            }
            fn flush(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let mut reads = Vec::new();
        for hole in 0..8 {
            reads.extend(zmw("movie1", hole, 3));
        }

        let mut sink = FailingSink;
        let err = run_pipeline(
            reads.into_iter().map(Ok),
            draft_consensus,
            &settings(2),
            &mut sink,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_empty_input() {
        let mut sink = FastqRecordSink::new(Vec::new());
        let counts = run_pipeline(
            std::iter::empty(),
            draft_consensus,
            &settings(1),
            &mut sink,
            None,
        )
        .unwrap();
        assert_eq!(counts.total(), 0);
        assert!(sink.into_inner().is_empty());
    }
}
