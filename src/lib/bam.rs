//! BAM read source.
//!
//! Reads one or more subread BAMs in order and yields [`SubreadRecord`]s.
//! Subread BAMs are unaligned and ZMW-contiguous, which is exactly the input
//! contract of [`crate::assembler::ChunkAssembler`]. Per-record metadata
//! comes from the PacBio conventions: the read name encodes
//! `movie/hole/qStart_qEnd`, and the `rq` (read quality), `sn` (per-channel
//! SNR), `cx` (local context flags), and `RG` tags carry the rest.

use std::fs::File;
use std::path::PathBuf;

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use bstr::ByteSlice;
use log::info;
use noodles::bam;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::value::Array;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::header::record::value::map::read_group::tag as rg_tag;
use noodles::sam::Header;

use crate::chemistry::ReadGroupChemistry;
use crate::model::{Interval, SnrVector, SubreadRecord};

const READ_QUALITY: Tag = Tag::new(b'r', b'q');
const SNR: Tag = Tag::new(b's', b'n');
const LOCAL_CONTEXT: Tag = Tag::new(b'c', b'x');
const READ_GROUP: Tag = Tag::new(b'R', b'G');

/// Iterator over the subread records of one or more BAM files.
///
/// Files are read sequentially in the order given; each yields its records
/// in file order.
pub struct BamSubreadReader {
    paths: std::vec::IntoIter<PathBuf>,
    open: Option<OpenBam>,
}

struct OpenBam {
    path: PathBuf,
    reader: bam::io::Reader<noodles::bgzf::Reader<File>>,
    header: Header,
    chemistries: AHashMap<String, ReadGroupChemistry>,
}

impl BamSubreadReader {
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths: paths.into_iter(), open: None }
    }
}

impl Iterator for BamSubreadReader {
    type Item = Result<SubreadRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.open.is_none() {
                let path = self.paths.next()?;
                match OpenBam::open(path) {
                    Ok(open) => self.open = Some(open),
                    Err(error) => return Some(Err(error)),
                }
            }

            let open = self.open.as_mut().expect("a file is open");
            match open.read_one() {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => self.open = None,
                Err(error) => {
                    self.open = None;
                    return Some(Err(error));
                }
            }
        }
    }
}

impl OpenBam {
    fn open(path: PathBuf) -> Result<Self> {
        let mut reader = bam::io::reader::Builder
            .build_from_path(&path)
            .with_context(|| format!("failed to open input BAM: {}", path.display()))?;
        let header = reader
            .read_header()
            .with_context(|| format!("failed to read header from: {}", path.display()))?;
        let chemistries = chemistries_from_header(&header);
        info!("reading {} ({} read groups)", path.display(), chemistries.len());
        Ok(Self { path, reader, header, chemistries })
    }

    fn read_one(&mut self) -> Result<Option<SubreadRecord>> {
        let mut record = RecordBuf::default();
        let bytes = self
            .reader
            .read_record_buf(&self.header, &mut record)
            .with_context(|| format!("failed to read record from: {}", self.path.display()))?;
        if bytes == 0 {
            return Ok(None);
        }
        self.parse(&record).map(Some)
    }

    fn parse(&self, record: &RecordBuf) -> Result<SubreadRecord> {
        let name = record
            .name()
            .and_then(|name| name.to_str().ok())
            .with_context(|| format!("record without a valid name in {}", self.path.display()))?;
        let (movie, hole, interval) = parse_name(name)
            .with_context(|| format!("malformed subread name: {name}"))?;

        let read_accuracy = match record.data().get(&READ_QUALITY) {
            Some(value) => {
                let rq = tag_f32(value)
                    .with_context(|| format!("non-numeric rq tag on {name}"))?;
                // Some basecallers emit read quality as a 0-1 fraction.
                if rq <= 1.0 { rq * 1000.0 } else { rq }
            }
            None => bail!("missing rq tag on {name}"),
        };

        let snr = match record.data().get(&SNR) {
            Some(Value::Array(Array::Float(values))) if values.len() == 4 => {
                SnrVector::new(values[0], values[1], values[2], values[3])
            }
            Some(_) => bail!("malformed sn tag on {name}"),
            None => bail!("missing sn tag on {name}"),
        };

        let local_context_flags = match record.data().get(&LOCAL_CONTEXT) {
            Some(value) => tag_f32(value)
                .with_context(|| format!("non-numeric cx tag on {name}"))?
                as u8,
            None => 0,
        };

        let chemistry = match record.data().get(&READ_GROUP) {
            Some(Value::String(id)) => {
                let id = id.to_str().with_context(|| format!("invalid RG tag on {name}"))?;
                self.chemistries
                    .get(id)
                    .cloned()
                    .with_context(|| format!("unknown read group {id:?} on {name}"))?
            }
            Some(_) => bail!("malformed RG tag on {name}"),
            // No read group: the empty chemistry never passes the filter.
            None => ReadGroupChemistry::default(),
        };

        Ok(SubreadRecord {
            movie,
            hole,
            interval,
            seq: record.sequence().as_ref().to_vec(),
            local_context_flags,
            read_accuracy,
            snr,
            chemistry,
        })
    }
}

/// Chemistry per read group id, parsed from the `DS` header fields.
fn chemistries_from_header(header: &Header) -> AHashMap<String, ReadGroupChemistry> {
    header
        .read_groups()
        .iter()
        .map(|(id, group)| {
            let chemistry = group
                .other_fields()
                .get(&rg_tag::DESCRIPTION)
                .map(|description| {
                    ReadGroupChemistry::parse_description(&description.to_string())
                })
                .unwrap_or_default();
            (id.to_string(), chemistry)
        })
        .collect()
}

/// Parses a PacBio subread name, `movie/hole/qStart_qEnd`.
fn parse_name(name: &str) -> Result<(String, i32, Interval)> {
    let mut parts = name.split('/');
    let (Some(movie), Some(hole), Some(span), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("expected movie/hole/qStart_qEnd");
    };
    if movie.is_empty() {
        bail!("empty movie name");
    }
    let hole: i32 = hole.parse().context("invalid hole number")?;
    let (start, end) = span.split_once('_').context("invalid query interval")?;
    let start: u32 = start.parse().context("invalid query start")?;
    let end: u32 = end.parse().context("invalid query end")?;
    if end < start {
        bail!("inverted query interval");
    }
    Ok((movie.to_string(), hole, Interval::new(start, end)))
}

fn tag_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Float(v) => Some(*v),
        Value::Int8(v) => Some(f32::from(*v)),
        Value::UInt8(v) => Some(f32::from(*v)),
        Value::Int16(v) => Some(f32::from(*v)),
        Value::UInt16(v) => Some(f32::from(*v)),
        Value::Int32(v) => Some(*v as f32),
        Value::UInt32(v) => Some(*v as f32),
        _ => None,
    }
}
