use std::fmt;

/// Dissimilarity score returned by compare. Zero means identical templates; larger is
/// less similar.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Score(pub u32);

impl Score {
    /// Score corresponding to a false match rate of one.
    pub const MAX: Score = Score(dpfp_sys::DPFJ_PROBABILITY_ONE);

    pub fn value(self) -> u32 {
        self.0
    }

    /// Probability that a template of a different finger scores this low.
    pub fn false_match_rate(self) -> f64 {
        f64::from(self.0) / f64::from(Score::MAX.0)
    }

    pub fn is_below(self, threshold: Threshold) -> bool {
        self.0 < threshold.0
    }

    /// Coarse band for diagnostics.
    pub fn band(self) -> ScoreBand {
        match self.0 {
            0 => ScoreBand::Identical,
            s if s < Threshold::from_false_match_rate(1e-5).0 => ScoreBand::VeryStrong,
            s if s < Threshold::from_false_match_rate(1e-4).0 => ScoreBand::Strong,
            s if s < Threshold::from_false_match_rate(1e-3).0 => ScoreBand::Weak,
            _ => ScoreBand::NoMatch,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{} (FMR {:.2e})", self.0, self.false_match_rate())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScoreBand {
    Identical,
    /// FMR below 1/100000.
    VeryStrong,
    /// FMR below 1/10000.
    Strong,
    /// FMR below 1/1000.
    Weak,
    NoMatch,
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let string = match self {
            ScoreBand::Identical => "identical",
            ScoreBand::VeryStrong => "very strong match",
            ScoreBand::Strong => "strong match",
            ScoreBand::Weak => "weak match",
            ScoreBand::NoMatch => "no match",
        };

        write!(f, "{}", string)
    }
}

/// Upper bound a score must stay below to count as a match.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Threshold(pub u32);

impl Threshold {
    pub fn from_false_match_rate(rate: f64) -> Threshold {
        let rate = rate.max(0.0).min(1.0);
        Threshold((f64::from(Score::MAX.0) * rate) as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold(100)
    }
}

impl From<u32> for Threshold {
    fn from(value: u32) -> Self {
        Threshold(value)
    }
}

/// Gallery entry reported by identify.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Candidate {
    /// Index into the gallery passed to identify.
    pub fmd_index: usize,
    pub view_index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_from_false_match_rate() {
        assert_eq!(Threshold::from_false_match_rate(1.0).value(), 0x7FFFFFFF);
        assert_eq!(Threshold::from_false_match_rate(0.0).value(), 0);
        assert_eq!(Threshold::from_false_match_rate(1e-5).value(), 21474);
    }

    #[test]
    fn bands() {
        assert_eq!(Score(0).band(), ScoreBand::Identical);
        assert_eq!(Score(100).band(), ScoreBand::VeryStrong);
        assert_eq!(Score(100_000).band(), ScoreBand::Strong);
        assert_eq!(Score(1_000_000).band(), ScoreBand::Weak);
        assert_eq!(Score::MAX.band(), ScoreBand::NoMatch);
    }

    #[test]
    fn default_threshold_is_strict() {
        assert!(Score(99).is_below(Threshold::default()));
        assert!(!Score(100).is_below(Threshold::default()));
    }
}
