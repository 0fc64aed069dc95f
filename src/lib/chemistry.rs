//! Read-group chemistry validation.
//!
//! Consensus calling is only supported for a fixed set of sequencing
//! chemistries. A molecule's read group carries the binding kit, sequencing
//! kit, and basecaller version; anything outside the supported table is
//! excluded from processing (advisory exclusion, not a quality failure).

/// (binding kit, sequencing kit, basecaller version prefix) tuples accepted
/// for consensus calling. P6/C4 chemistry only for now.
const SUPPORTED_CHEMISTRIES: &[(&str, &str, &str)] = &[
    ("100356300", "100356200", "2.1"),
    ("100356300", "100356200", "2.3"),
    ("100372700", "100356200", "2.1"),
    ("100372700", "100356200", "2.3"),
];

/// Chemistry metadata attached to a BAM read group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadGroupChemistry {
    pub binding_kit: String,
    pub sequencing_kit: String,
    pub basecaller_version: String,
}

impl ReadGroupChemistry {
    #[must_use]
    pub fn new(binding_kit: &str, sequencing_kit: &str, basecaller_version: &str) -> Self {
        Self {
            binding_kit: binding_kit.to_string(),
            sequencing_kit: sequencing_kit.to_string(),
            basecaller_version: basecaller_version.to_string(),
        }
    }

    /// Parses the `DS` description field of a PacBio read group, e.g.
    /// `READTYPE=SUBREAD;BINDINGKIT=100356300;SEQUENCINGKIT=100356200;BASECALLERVERSION=2.3.0`.
    ///
    /// Unknown keys are ignored; missing keys leave empty fields, which never
    /// match the supported table.
    #[must_use]
    pub fn parse_description(description: &str) -> Self {
        let mut chemistry = Self::default();
        for field in description.split(';') {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            match key.trim() {
                "BINDINGKIT" => chemistry.binding_kit = value.trim().to_string(),
                "SEQUENCINGKIT" => chemistry.sequencing_kit = value.trim().to_string(),
                "BASECALLERVERSION" => chemistry.basecaller_version = value.trim().to_string(),
                _ => {}
            }
        }
        chemistry
    }

    /// Returns true if this chemistry is in the supported table.
    ///
    /// Basecaller versions match on their `major.minor` prefix, so `2.3.0.1`
    /// is accepted wherever `2.3` is.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        let prefix: String = self.basecaller_version.chars().take(3).collect();
        SUPPORTED_CHEMISTRIES.iter().any(|(binding, sequencing, version)| {
            self.binding_kit == *binding && self.sequencing_kit == *sequencing && prefix == *version
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_chemistries() {
        assert!(ReadGroupChemistry::new("100356300", "100356200", "2.1").is_supported());
        assert!(ReadGroupChemistry::new("100356300", "100356200", "2.3.0.1").is_supported());
        assert!(ReadGroupChemistry::new("100372700", "100356200", "2.1.0").is_supported());
    }

    #[test]
    fn test_unsupported_chemistries() {
        // wrong binding kit
        assert!(!ReadGroupChemistry::new("100000000", "100356200", "2.3").is_supported());
        // wrong sequencing kit
        assert!(!ReadGroupChemistry::new("100356300", "100000000", "2.3").is_supported());
        // unsupported basecaller version
        assert!(!ReadGroupChemistry::new("100356300", "100356200", "2.2").is_supported());
        assert!(!ReadGroupChemistry::new("100356300", "100356200", "1.3").is_supported());
        // empty metadata
        assert!(!ReadGroupChemistry::default().is_supported());
    }

    #[test]
    fn test_parse_description() {
        let chemistry = ReadGroupChemistry::parse_description(
            "READTYPE=SUBREAD;BINDINGKIT=100356300;SEQUENCINGKIT=100356200;BASECALLERVERSION=2.3.0",
        );
        assert_eq!(chemistry.binding_kit, "100356300");
        assert_eq!(chemistry.sequencing_kit, "100356200");
        assert_eq!(chemistry.basecaller_version, "2.3.0");
        assert!(chemistry.is_supported());
    }

    #[test]
    fn test_parse_description_partial() {
        let chemistry = ReadGroupChemistry::parse_description("READTYPE=SUBREAD");
        assert!(chemistry.binding_kit.is_empty());
        assert!(!chemistry.is_supported());
    }
}
