//! Output seams: the record sink and the optional index builder.
//!
//! Both are trait objects from the pipeline's point of view, so the writer
//! thread stays ignorant of the concrete encoding. The shipped
//! implementations write FASTQ records and a tab-separated offset index; a
//! richer encoder plugs in behind the same traits.

use std::io::Write;

use anyhow::{Context, Result};

use crate::counts::ConsensusRecord;

const PHRED_OFFSET: u8 = 33;

/// Destination for finished consensus records.
///
/// `write` returns the byte offset at which the record begins in the
/// underlying stream, which is what index builders record.
pub trait RecordSink {
    fn write(&mut self, record: &ConsensusRecord) -> Result<u64>;
    fn flush(&mut self) -> Result<()>;
}

/// Builds a lookup structure alongside the record stream.
pub trait IndexBuilder {
    fn add_record(&mut self, record: &ConsensusRecord, offset: u64) -> Result<()>;
}

/// Writes consensus records as FASTQ.
///
/// The read name is `movie/hole/ccs`; the description carries the pass count
/// and predicted accuracy as `np=N rq=0.NNNN`. Qualities are Phred+33.
pub struct FastqRecordSink<W: Write> {
    inner: W,
    offset: u64,
}

impl<W: Write> FastqRecordSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    /// Consumes the sink, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> RecordSink for FastqRecordSink<W> {
    fn write(&mut self, record: &ConsensusRecord) -> Result<u64> {
        let start = self.offset;

        let header = format!(
            "@{}/{}/ccs np={} rq={:.4}\n",
            record.id.movie, record.id.hole, record.num_passes, record.predicted_accuracy
        );
        let quals: Vec<u8> =
            record.qualities.iter().map(|q| q.saturating_add(PHRED_OFFSET)).collect();

        self.inner.write_all(header.as_bytes())?;
        self.inner.write_all(&record.sequence)?;
        self.inner.write_all(b"\n+\n")?;
        self.inner.write_all(&quals)?;
        self.inner.write_all(b"\n")?;

        self.offset = start
            + header.len() as u64
            + record.sequence.len() as u64
            + 3
            + quals.len() as u64
            + 1;
        Ok(start)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().context("failed to flush output")
    }
}

/// Tab-separated offset index: `name  offset  length  np  rq` per record.
pub struct TsvIndexBuilder<W: Write> {
    inner: W,
}

impl<W: Write> TsvIndexBuilder<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> IndexBuilder for TsvIndexBuilder<W> {
    fn add_record(&mut self, record: &ConsensusRecord, offset: u64) -> Result<()> {
        writeln!(
            self.inner,
            "{}/{}/ccs\t{}\t{}\t{}\t{:.4}",
            record.id.movie,
            record.id.hole,
            offset,
            record.sequence.len(),
            record.num_passes,
            record.predicted_accuracy
        )
        .context("failed to write index entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SnrVector, ZmwId};
    use std::sync::Arc;

    fn record(hole: i32, seq: &[u8]) -> ConsensusRecord {
        ConsensusRecord {
            id: ZmwId::new(Arc::from("movie1"), hole),
            sequence: seq.to_vec(),
            qualities: vec![40; seq.len()],
            num_passes: 7,
            predicted_accuracy: 0.987_6,
            snr: SnrVector::new(8.0, 8.0, 8.0, 8.0),
        }
    }

    #[test]
    fn test_fastq_layout() {
        let mut sink = FastqRecordSink::new(Vec::new());
        let offset = sink.write(&record(42, b"ACGT")).unwrap();
        assert_eq!(offset, 0);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "@movie1/42/ccs np=7 rq=0.9876\nACGT\n+\nIIII\n");
    }

    #[test]
    fn test_offsets_advance_by_record_size() {
        let mut sink = FastqRecordSink::new(Vec::new());
        let first = sink.write(&record(1, b"ACGT")).unwrap();
        let second = sink.write(&record(2, b"ACGTACGT")).unwrap();
        let third = sink.write(&record(3, b"AC")).unwrap();

        let bytes = sink.into_inner();
        assert_eq!(first, 0);
        // each offset points at the '@' of its own record
        assert_eq!(bytes[second as usize], b'@');
        assert_eq!(bytes[third as usize], b'@');
        assert_eq!(bytes.len() as u64, third + 37);
    }

    #[test]
    fn test_index_rows() {
        let mut index = TsvIndexBuilder::new(Vec::new());
        index.add_record(&record(42, b"ACGT"), 128).unwrap();

        let text = String::from_utf8(index.into_inner()).unwrap();
        assert_eq!(text, "movie1/42/ccs\t128\t4\t7\t0.9876\n");
    }
}
