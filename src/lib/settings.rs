//! Pipeline parameters and thread-count selection.

use crate::errors::CcsError;
use crate::whitelist::Whitelist;

/// Parameters that shape the consensus pipeline.
///
/// Read scores and `min_read_score` share the 0-1000 scale carried on
/// subread records; the CLI exposes the threshold as a 0-1 fraction and
/// scales it on the way in.
#[derive(Debug, Clone)]
pub struct ConsensusSettings {
    /// Minimum number of full passes required to attempt a consensus.
    pub min_passes: usize,
    /// Minimum per-channel SNR of input subreads.
    pub min_snr: f32,
    /// Minimum read accuracy of input subreads (0-1000 scale).
    pub min_read_score: f32,
    /// Minimum length of a subread (and of the consensus) to be usable.
    pub min_length: usize,
    /// Maximum length of a usable subread.
    pub max_length: usize,
    /// Minimum predicted accuracy of an emitted consensus (0-1 scale).
    pub min_predicted_accuracy: f32,
    /// Maximum fraction of a ZMW's subreads that may be dropped as unusable.
    pub max_unusable_fraction: f32,
    /// Explicit ZMW selection, if any.
    pub whitelist: Option<Whitelist>,
    /// Worker thread count for the consensus pool.
    pub num_threads: usize,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            min_passes: 3,
            min_snr: 4.0,
            min_read_score: 750.0,
            min_length: 10,
            max_length: 7000,
            min_predicted_accuracy: 0.9,
            max_unusable_fraction: 0.5,
            whitelist: None,
            num_threads: 1,
        }
    }
}

impl ConsensusSettings {
    /// Validates threshold values. Called before any pipeline work begins.
    pub fn validate(&self) -> Result<(), CcsError> {
        if self.min_passes < 1 {
            return Err(CcsError::InvalidParameter {
                parameter: "min-passes".to_string(),
                reason: "must be >= 1".to_string(),
            });
        }
        if !(0.0..=1000.0).contains(&self.min_read_score) {
            return Err(CcsError::InvalidParameter {
                parameter: "min-read-score".to_string(),
                reason: "must be between 0 and 1000".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.min_predicted_accuracy) {
            return Err(CcsError::InvalidParameter {
                parameter: "min-predicted-accuracy".to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }
        if self.max_length < self.min_length {
            return Err(CcsError::InvalidParameter {
                parameter: "max-length".to_string(),
                reason: "must be >= min-length".to_string(),
            });
        }
        Ok(())
    }
}

/// Resolves a user-supplied thread count against hardware concurrency.
///
/// `n >= 1` is capped at the number of available cores. `n < 1` means "all
/// cores minus |n|", floored at one, so `0` auto-detects and `-2` leaves two
/// cores free.
#[must_use]
pub fn thread_count(n: i32) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |cores| cores.get()) as i64;

    if n < 1 {
        (cores + i64::from(n)).max(1) as usize
    } else {
        i64::from(n).min(cores) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ConsensusSettings::default().validate().is_ok());
    }

    #[test]
    fn test_min_passes_below_one_rejected() {
        let settings = ConsensusSettings { min_passes: 0, ..ConsensusSettings::default() };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("min-passes"));
    }

    #[test]
    fn test_length_window_rejected_when_inverted() {
        let settings = ConsensusSettings {
            min_length: 100,
            max_length: 50,
            ..ConsensusSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_thread_count_positive_capped() {
        let cores = std::thread::available_parallelism().unwrap().get();
        assert_eq!(thread_count(1), 1);
        assert_eq!(thread_count(i32::MAX), cores);
    }

    #[test]
    fn test_thread_count_negative_bias() {
        let cores = std::thread::available_parallelism().unwrap().get() as i32;
        assert_eq!(thread_count(0), cores.max(1) as usize);
        assert_eq!(thread_count(-1), (cores - 1).max(1) as usize);
        // a huge bias still floors at one thread
        assert_eq!(thread_count(i32::MIN + 1), 1);
    }
}
