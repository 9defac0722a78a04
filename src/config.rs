//! Analysis parameters (`--thresholdDuration`, `--minDuration`,
//! `--minPercentage`), bundled into one value instead of threaded through
//! the builder as separate positional parameters.

/// Tuning knobs for the span-tree builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    /// Absolute duration (microseconds) above which a span is always
    /// promoted, regardless of how it compares to its parent.
    pub threshold_duration: i64,
    /// Minimum duration (microseconds) a span must reach to be retained by
    /// the ingester at all.
    pub min_duration: i64,
    /// Fraction of the parent's duration a span must reach to be promoted
    /// on dominance grounds.
    pub min_percentage: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold_duration: 500_000,
            min_duration: 100_000,
            min_percentage: 0.6,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_percentage > 0.0 && self.min_percentage <= 1.0) {
            return Err(format!(
                "minPercentage must be in (0,1], got {}",
                self.min_percentage
            ));
        }
        if self.threshold_duration < 0 || self.min_duration < 0 {
            return Err("thresholdDuration and minDuration must be non-negative".to_string());
        }
        Ok(())
    }
}
