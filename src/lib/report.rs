//! End-of-run results report.

use std::io::Write;

use anyhow::{Context, Result};

use crate::counts::{ConsensusCounts, ZmwOutcome};

/// Writes the per-outcome CSV report.
///
/// One row per outcome in fixed order: `label,count,percentage%` with two
/// decimal places. Percentages are of all molecules accounted for; an empty
/// run reports 0.00% everywhere.
pub fn write_report<W: Write>(writer: &mut W, counts: &ConsensusCounts) -> Result<()> {
    let total = counts.total();
    for outcome in ZmwOutcome::ALL {
        let count = counts.get(outcome);
        let percentage = if total == 0 {
            0.0
        } else {
            100.0 * count as f64 / total as f64
        };
        writeln!(writer, "{},{},{:.2}%", outcome.label(), count, percentage)
            .context("failed to write report")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_rows_and_percentages() {
        let mut counts = ConsensusCounts::new();
        counts.success = 3;
        counts.poor_snr = 1;

        let mut buffer = Vec::new();
        write_report(&mut buffer, &counts).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0], "Success -- CCS generated,3,75.00%");
        assert_eq!(rows[1], "Failed -- Below SNR threshold,1,25.00%");
        assert_eq!(rows[2], "Failed -- No usable subreads,0,0.00%");
        assert_eq!(rows[3], "Failed -- Insert size too small,0,0.00%");
        assert_eq!(rows[4], "Failed -- Not enough full passes,0,0.00%");
        assert_eq!(rows[5], "Failed -- Too many unusable subreads,0,0.00%");
        assert_eq!(rows[6], "Failed -- CCS did not converge,0,0.00%");
        assert_eq!(rows[7], "Failed -- CCS below minimum predicted accuracy,0,0.00%");
    }

    #[test]
    fn test_empty_run_reports_zero_percent() {
        let mut buffer = Vec::new();
        write_report(&mut buffer, &ConsensusCounts::new()).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        for row in text.lines() {
            assert!(row.ends_with(",0,0.00%"), "{row}");
        }
    }
}
