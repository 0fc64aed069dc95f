//! Explicit ZMW selection via hole-number ranges.

use crate::errors::CcsError;

/// A whitelist of hole numbers parsed from a `--zmws` specification.
///
/// The specification is a comma-separated list of hole numbers and inclusive
/// ranges, e.g. `"55"`, `"0-54"`, or `"0-54,109,200-400"`. The whitelist
/// applies to every input movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist {
    ranges: Vec<(i32, i32)>,
}

impl Whitelist {
    /// Parses a whitelist specification.
    pub fn from_spec(spec: &str) -> Result<Self, CcsError> {
        let invalid = || CcsError::InvalidWhitelist { spec: spec.to_string() };

        let mut ranges = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid());
            }
            let (start, end) = match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo: i32 = lo.trim().parse().map_err(|_| invalid())?;
                    let hi: i32 = hi.trim().parse().map_err(|_| invalid())?;
                    (lo, hi)
                }
                None => {
                    let hole: i32 = part.parse().map_err(|_| invalid())?;
                    (hole, hole)
                }
            };
            if start < 0 || end < start {
                return Err(invalid());
            }
            ranges.push((start, end));
        }
        if ranges.is_empty() {
            return Err(invalid());
        }
        ranges.sort_unstable();
        Ok(Self { ranges })
    }

    /// Returns true if the given ZMW is selected.
    ///
    /// The movie name participates in the signature for parity with the
    /// read-source contract; selections are currently by hole number across
    /// all movies.
    #[must_use]
    pub fn contains(&self, _movie: &str, hole: i32) -> bool {
        self.ranges.iter().any(|&(start, end)| start <= hole && hole <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hole() {
        let whitelist = Whitelist::from_spec("55").unwrap();
        assert!(whitelist.contains("movie", 55));
        assert!(!whitelist.contains("movie", 54));
    }

    #[test]
    fn test_ranges_and_singles() {
        let whitelist = Whitelist::from_spec("0-54,109,200-400").unwrap();
        assert!(whitelist.contains("movie", 0));
        assert!(whitelist.contains("movie", 54));
        assert!(whitelist.contains("movie", 109));
        assert!(whitelist.contains("movie", 300));
        assert!(whitelist.contains("movie", 400));
        assert!(!whitelist.contains("movie", 55));
        assert!(!whitelist.contains("movie", 110));
        assert!(!whitelist.contains("movie", 401));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let whitelist = Whitelist::from_spec(" 1 - 3 , 7 ").unwrap();
        assert!(whitelist.contains("movie", 2));
        assert!(whitelist.contains("movie", 7));
    }

    #[test]
    fn test_malformed_specs_rejected() {
        for spec in ["", ",", "abc", "5-", "-5-10", "10-5", "1,,2", "1-2-3"] {
            assert!(Whitelist::from_spec(spec).is_err(), "spec {spec:?} should fail");
        }
    }
}
