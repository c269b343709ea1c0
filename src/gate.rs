use regex::Regex;

/// Why a generated candidate was turned down.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Candidate is identical to the original (no-op generation)
    NoOp,
    /// Original fragment is empty, ratio is meaningless
    EmptyOriginal,
    /// candidate/original length ratio fell outside the accepted band
    RatioOutOfBand(f64),
    /// Candidate reintroduced a pattern the pipeline exists to remove
    BadPattern(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum QualityVerdict {
    Accepted(String),
    Rejected(RejectReason),
}

/// Decides whether a generated candidate is trustworthy enough to use.
///
/// Pure and thread-safe; every call operates on local data only.
pub struct QualityGate {
    ratio_min: f64,
    ratio_max: f64,
    bad_patterns: Vec<Regex>,
}

impl QualityGate {
    pub fn new(ratio_min: f64, ratio_max: f64, bad_patterns: &[String]) -> anyhow::Result<Self> {
        let bad_patterns = bad_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            ratio_min,
            ratio_max,
            bad_patterns,
        })
    }

    /// Both ratio bounds are inclusive: a candidate sitting exactly on a
    /// bound is accepted.
    pub fn evaluate(&self, original: &str, candidate: &str) -> QualityVerdict {
        if candidate == original {
            return QualityVerdict::Rejected(RejectReason::NoOp);
        }
        if original.is_empty() {
            return QualityVerdict::Rejected(RejectReason::EmptyOriginal);
        }

        let ratio = candidate.chars().count() as f64 / original.chars().count() as f64;
        if ratio < self.ratio_min || ratio > self.ratio_max {
            return QualityVerdict::Rejected(RejectReason::RatioOutOfBand(ratio));
        }

        for pattern in &self.bad_patterns {
            if pattern.is_match(candidate) {
                return QualityVerdict::Rejected(RejectReason::BadPattern(
                    pattern.as_str().to_string(),
                ));
            }
        }

        QualityVerdict::Accepted(candidate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> QualityGate {
        QualityGate::new(0.5, 2.0, &[r#"role=["']button["']"#.to_string()]).unwrap()
    }

    #[test]
    fn noop_rejected() {
        let g = gate();
        assert_eq!(
            g.evaluate("<img>", "<img>"),
            QualityVerdict::Rejected(RejectReason::NoOp)
        );
    }

    #[test]
    fn empty_original_rejected() {
        let g = gate();
        assert!(matches!(
            g.evaluate("", "<img>"),
            QualityVerdict::Rejected(RejectReason::EmptyOriginal)
        ));
    }

    #[test]
    fn ratio_bounds_are_inclusive() {
        let g = gate();
        // original is 10 chars; 5 chars is exactly ratio 0.5, 20 exactly 2.0
        let original = "0123456789";
        assert!(matches!(
            g.evaluate(original, "01234"),
            QualityVerdict::Accepted(_)
        ));
        let doubled = "x".repeat(20);
        assert!(matches!(
            g.evaluate(original, &doubled),
            QualityVerdict::Accepted(_)
        ));
    }

    #[test]
    fn just_outside_band_rejected() {
        let g = gate();
        let original = "0123456789";
        assert!(matches!(
            g.evaluate(original, "0123"),
            QualityVerdict::Rejected(RejectReason::RatioOutOfBand(_))
        ));
        let runaway = "x".repeat(21);
        assert!(matches!(
            g.evaluate(original, &runaway),
            QualityVerdict::Rejected(RejectReason::RatioOutOfBand(_))
        ));
    }

    #[test]
    fn bad_pattern_rejected_even_with_good_ratio() {
        let g = gate();
        let original = "<button role=\"button\">Go</button>";
        let candidate = "<button role='button'>Go</button>";
        assert!(matches!(
            g.evaluate(original, candidate),
            QualityVerdict::Rejected(RejectReason::BadPattern(_))
        ));
    }
}
