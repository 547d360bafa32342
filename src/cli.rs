//! CLI argument parsing for marginfx

use crate::config::RegionStrategy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Format of the summary printed on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV model-comparison table
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "marginfx")]
#[command(version)]
#[command(
    about = "Before/after margin analysis of a sales bonus program with mediation by product mix",
    long_about = None
)]
pub struct Cli {
    /// Delimited transaction file with a header row
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Write every exported table and report into this directory
    #[arg(short = 'o', long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Summary format on stdout
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the HTML dashboard to FILE
    #[arg(long = "html", value_name = "FILE")]
    pub html: Option<PathBuf>,

    /// Region mapping strategy (overrides the config file)
    #[arg(long = "region-mapping", value_enum, value_name = "STRATEGY")]
    pub region_mapping: Option<RegionStrategy>,

    /// Field delimiter of the input file
    #[arg(long = "delimiter", value_name = "CHAR", default_value = ",")]
    pub delimiter: char,

    /// Enable debug tracing on stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Delimiter as a single byte; only ASCII delimiters are supported
    pub fn delimiter_byte(&self) -> Result<u8, String> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_input() {
        let cli = Cli::parse_from(["marginfx", "sales.csv"]);
        assert_eq!(cli.input, PathBuf::from("sales.csv"));
        assert!(cli.out_dir.is_none());
        assert!(cli.config.is_none());
        assert!(cli.html.is_none());
        assert!(cli.region_mapping.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_requires_input() {
        assert!(Cli::try_parse_from(["marginfx"]).is_err());
    }

    #[test]
    fn test_cli_format_default_text() {
        let cli = Cli::parse_from(["marginfx", "sales.csv"]);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_cli_format_json() {
        let cli = Cli::parse_from(["marginfx", "--format", "json", "sales.csv"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_out_dir_and_config() {
        let cli = Cli::parse_from([
            "marginfx",
            "-o",
            "results",
            "-c",
            "marginfx.toml",
            "sales.csv",
        ]);
        assert_eq!(cli.out_dir, Some(PathBuf::from("results")));
        assert_eq!(cli.config, Some(PathBuf::from("marginfx.toml")));
    }

    #[test]
    fn test_cli_region_mapping() {
        let cli = Cli::parse_from(["marginfx", "--region-mapping", "region-label", "sales.csv"]);
        assert_eq!(cli.region_mapping, Some(RegionStrategy::RegionLabel));

        let cli = Cli::parse_from(["marginfx", "--region-mapping", "store-range", "sales.csv"]);
        assert_eq!(cli.region_mapping, Some(RegionStrategy::StoreRange));
    }

    #[test]
    fn test_cli_rejects_unknown_region_mapping() {
        assert!(Cli::try_parse_from(["marginfx", "--region-mapping", "zip", "sales.csv"]).is_err());
    }

    #[test]
    fn test_cli_delimiter() {
        let cli = Cli::parse_from(["marginfx", "sales.csv"]);
        assert_eq!(cli.delimiter_byte(), Ok(b','));

        let cli = Cli::parse_from(["marginfx", "--delimiter", ";", "sales.csv"]);
        assert_eq!(cli.delimiter_byte(), Ok(b';'));

        let cli = Cli::parse_from(["marginfx", "--delimiter", "§", "sales.csv"]);
        assert!(cli.delimiter_byte().is_err());
    }

    #[test]
    fn test_cli_html_and_debug() {
        let cli = Cli::parse_from(["marginfx", "--html", "report.html", "--debug", "sales.csv"]);
        assert_eq!(cli.html, Some(PathBuf::from("report.html")));
        assert!(cli.debug);
    }
}
