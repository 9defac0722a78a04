//! CLI argument surface: the core analysis is a library, with this module
//! as a thin `clap` front end over it wiring a runnable binary entry point.

use crate::config::AnalysisConfig;
use clap::Parser;
use std::path::PathBuf;

/// Distills a Chrome-Trace-Event-Format compiler trace into a tree of
/// compilation hot spots.
#[derive(Debug, Parser)]
#[command(name = "trace-hotspots", version, about)]
pub struct Cli {
    /// Path to the trace JSON file.
    pub trace_path: PathBuf,

    /// Path to the optional types JSON file.
    pub types_path: Option<PathBuf>,

    /// Write the final printable tree as JSON to this path instead of
    /// printing a summary to stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Absolute duration (microseconds) above which a span is always
    /// promoted into the output tree.
    #[arg(long = "thresholdDuration", default_value_t = 500_000)]
    pub threshold_duration: i64,

    /// Minimum duration (microseconds) a span must reach to be retained by
    /// the ingester at all.
    #[arg(long = "minDuration", default_value_t = 100_000)]
    pub min_duration: i64,

    /// Fraction of the parent's duration a span must reach to be promoted
    /// on dominance grounds.
    #[arg(long = "minPercentage", default_value_t = 0.6)]
    pub min_percentage: f64,
}

impl Cli {
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            threshold_duration: self.threshold_duration,
            min_duration: self.min_duration,
            min_percentage: self.min_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_documented_interface() {
        let cli = Cli::parse_from(["trace-hotspots", "trace.json"]);
        assert_eq!(cli.threshold_duration, 500_000);
        assert_eq!(cli.min_duration, 100_000);
        assert_eq!(cli.min_percentage, 0.6);
        assert!(cli.types_path.is_none());
        assert!(cli.json.is_none());
    }

    #[test]
    fn test_camel_case_flags_are_accepted() {
        let cli = Cli::parse_from([
            "trace-hotspots",
            "trace.json",
            "types.json",
            "--thresholdDuration",
            "1000",
            "--minDuration",
            "10",
            "--minPercentage",
            "0.5",
            "--json",
            "out.json",
        ]);
        assert_eq!(cli.threshold_duration, 1000);
        assert_eq!(cli.min_duration, 10);
        assert_eq!(cli.min_percentage, 0.5);
        assert_eq!(cli.types_path, Some(PathBuf::from("types.json")));
        assert_eq!(cli.json, Some(PathBuf::from("out.json")));
    }
}
