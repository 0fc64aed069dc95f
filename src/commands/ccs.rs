//! Generate circular consensus sequences from subread BAMs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info};

use ccs_lib::bam::BamSubreadReader;
use ccs_lib::consensus::draft_consensus;
use ccs_lib::errors::CcsError;
use ccs_lib::logging::OperationTimer;
use ccs_lib::pipeline::run_pipeline;
use ccs_lib::report::write_report;
use ccs_lib::settings::{thread_count, ConsensusSettings};
use ccs_lib::sink::{FastqRecordSink, IndexBuilder, TsvIndexBuilder};
use ccs_lib::whitelist::Whitelist;

use crate::commands::command::Command;

/// Generate circular consensus sequences from subread BAMs.
///
/// Reads one or more ZMW-contiguous subread BAMs, calls one consensus per
/// molecule on a worker pool, and writes the results in input order together
/// with a per-outcome report.
#[derive(Debug, Parser)]
#[command(
    name = "ccs",
    about = "Generate circular consensus sequences from subreads",
    long_about = r#"
Generate circular consensus sequences (CCS) from subread BAMs.

Input BAMs must be ZMW-contiguous: all subreads of a molecule adjacent, in
polymerase read order (the native subread BAM layout). Molecules are filtered
by chemistry, signal-to-noise ratio, and pass count before consensus calling;
individual subreads are filtered by read accuracy. Consensus records are
written in input order regardless of the number of worker threads.

Example usage:
  ccs out.fastq movie1.subreads.bam
  ccs --index --num-threads 8 out.fastq movie1.subreads.bam movie2.subreads.bam
  ccs --zmws 0-54,109 --report-file - out.fastq movie1.subreads.bam
"#
)]
pub struct Ccs {
    /// Output consensus FASTQ file
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Input subread BAM files
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Overwrite the output file if it exists
    #[arg(long = "force")]
    pub force: bool,

    /// Write an offset index next to the output (OUTPUT.idx)
    #[arg(long = "index")]
    pub index: bool,

    /// Restrict processing to these hole numbers, e.g. 55 or 0-54,109,200-400
    #[arg(long = "zmws", value_name = "SPEC")]
    pub zmws: Option<String>,

    /// Minimum per-channel SNR required of a molecule
    #[arg(long = "min-snr", default_value = "4.0")]
    pub min_snr: f32,

    /// Minimum read accuracy of a subread, as a fraction
    #[arg(long = "min-read-score", default_value = "0.75")]
    pub min_read_score: f32,

    /// Minimum number of full passes required for consensus calling
    #[arg(long = "min-passes", default_value = "3")]
    pub min_passes: usize,

    /// Minimum usable subread and insert length
    #[arg(long = "min-length", default_value = "10")]
    pub min_length: usize,

    /// Maximum usable subread length
    #[arg(long = "max-length", default_value = "7000")]
    pub max_length: usize,

    /// Minimum predicted accuracy of an emitted consensus
    #[arg(long = "min-predicted-accuracy", default_value = "0.9")]
    pub min_predicted_accuracy: f32,

    /// Results report destination; use - for stdout
    #[arg(long = "report-file", default_value = "ccs_report.csv", value_name = "FILE")]
    pub report_file: String,

    /// Worker threads; 0 uses all cores, negative leaves cores free
    #[arg(long = "num-threads", default_value = "0", allow_hyphen_values = true)]
    pub num_threads: i32,
}

impl Command for Ccs {
    fn execute(&self, command_line: &str) -> Result<()> {
        debug!("invocation: {command_line}");

        for file in &self.files {
            if !file.exists() {
                bail!("input BAM does not exist: {}", file.display());
            }
        }
        if self.output.exists() && !self.force {
            return Err(CcsError::OutputExists { path: self.output.display().to_string() }.into());
        }
        if !(0.0..=1.0).contains(&self.min_read_score) {
            return Err(CcsError::InvalidParameter {
                parameter: "min-read-score".to_string(),
                reason: "must be between 0 and 1".to_string(),
            }
            .into());
        }

        let whitelist = self.zmws.as_deref().map(Whitelist::from_spec).transpose()?;

        let settings = ConsensusSettings {
            min_passes: self.min_passes,
            min_snr: self.min_snr,
            min_read_score: self.min_read_score * 1000.0,
            min_length: self.min_length,
            max_length: self.max_length,
            min_predicted_accuracy: self.min_predicted_accuracy,
            whitelist,
            num_threads: thread_count(self.num_threads),
            ..ConsensusSettings::default()
        };
        settings.validate()?;

        info!("Output: {}", self.output.display());
        info!("Worker threads: {}", settings.num_threads);
        if let Some(zmws) = &self.zmws {
            info!("ZMW whitelist: {zmws}");
        }

        let output = File::create(&self.output)
            .with_context(|| format!("failed to create output: {}", self.output.display()))?;
        let mut sink = FastqRecordSink::new(BufWriter::new(output));

        let mut index = if self.index {
            let path = index_path(&self.output);
            let file = File::create(&path)
                .with_context(|| format!("failed to create index: {}", path.display()))?;
            Some(TsvIndexBuilder::new(BufWriter::new(file)))
        } else {
            None
        };

        let reader = BamSubreadReader::new(self.files.clone());

        let timer = OperationTimer::new("Calling consensus");
        let counts = run_pipeline(
            reader,
            draft_consensus,
            &settings,
            &mut sink,
            index.as_mut().map(|index| index as &mut (dyn IndexBuilder + Send)),
        )?;
        timer.log_completion(counts.total());

        if let Some(index) = index {
            index
                .into_inner()
                .flush()
                .context("failed to flush index")?;
        }

        if self.report_file == "-" {
            write_report(&mut std::io::stdout().lock(), &counts)?;
        } else {
            let mut report = File::create(&self.report_file)
                .with_context(|| format!("failed to create report: {}", self.report_file))?;
            write_report(&mut report, &counts)?;
            info!("Report written to {}", self.report_file);
        }

        Ok(())
    }
}

fn index_path(output: &std::path::Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(".idx");
    PathBuf::from(path)
}
