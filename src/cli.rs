use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only the verdict and errors
    Quiet,
    #[default]
    Normal,
    /// Every report entry
    Verbose,
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Entries grouped by file, coloured on a terminal
    #[default]
    Human,
    /// The full report as JSON
    Json,
    /// Counts per rule and severity
    Summary,
}

/// Cross-file validation of NeTEx datasets
#[derive(Parser, Debug, Clone)]
#[command(name = "netex-validator")]
#[command(about = "Validate NeTEx datasets: rule catalog, id uniqueness and cross-file references")]
#[command(version)]
pub struct Cli {
    /// Dataset directory or single file
    #[arg(required_unless_present = "list_rules")]
    pub path: Option<PathBuf>,

    /// Codespace of the dataset (e.g. 'TST')
    #[arg(
        short = 'c',
        long = "codespace",
        required_unless_present = "list_rules"
    )]
    pub codespace: Option<String>,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Number of line files validated concurrently
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    #[arg(short = 'f', long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Only print the verdict and errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// File extensions to process (comma-separated)
    #[arg(short = 'e', long = "extensions")]
    pub extensions: Option<String>,

    /// Include file patterns (glob syntax, relative to the dataset root)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax, relative to the dataset root)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// File name prefix of common files
    #[arg(long = "common-prefix")]
    pub common_file_prefix: Option<String>,

    /// Skip schema gates
    #[arg(long = "skip-schema")]
    pub skip_schema: bool,

    /// Stop after the schema gates
    #[arg(long = "skip-validators")]
    pub skip_validators: bool,

    /// XSD used as a schema gate (requires the `xsd` feature)
    #[arg(long = "xsd")]
    pub xsd: Option<PathBuf>,

    /// Additional rules (TOML catalog)
    #[arg(long = "rules")]
    pub rule_catalog: Option<PathBuf>,

    /// Rule codes to disable
    #[arg(long = "disable", action = clap::ArgAction::Append)]
    pub disabled_rules: Vec<String>,

    /// Codespaces whose references are resolved outside the dataset
    #[arg(long = "ignore-codespace", action = clap::ArgAction::Append)]
    pub ignored_codespaces: Vec<String>,

    /// Emit logs as JSON lines
    #[arg(long = "log-json")]
    pub log_json: bool,

    /// Print the rule catalog and exit
    #[arg(long = "list-rules")]
    pub list_rules: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.path
            && !path.exists()
        {
            return Err(format!("Path does not exist: {}", path.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        if self
            .codespace
            .as_ref()
            .is_some_and(|codespace| codespace.trim().is_empty())
        {
            return Err("Codespace must not be empty".to_string());
        }
        Ok(())
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cli_parsing() {
        let cli = Cli::try_parse_from(["netex-validator", "/tmp", "--codespace", "TST"]).unwrap();
        assert_eq!(cli.path, Some(PathBuf::from("/tmp")));
        assert_eq!(cli.codespace.as_deref(), Some("TST"));
        assert_eq!(cli.output_format, None);
        assert_eq!(cli.get_extensions(), None);
        assert_eq!(cli.verbosity(), VerbosityLevel::Normal);
    }

    #[test]
    fn test_codespace_required_unless_listing_rules() {
        assert!(Cli::try_parse_from(["netex-validator", "/tmp"]).is_err());
        let cli = Cli::try_parse_from(["netex-validator", "--list-rules"]).unwrap();
        assert!(cli.list_rules);
        assert!(cli.path.is_none());
    }

    #[test]
    fn test_repeated_flags() {
        let cli = Cli::try_parse_from([
            "netex-validator",
            "/tmp",
            "-c",
            "TST",
            "--disable",
            "LINE_2",
            "--disable",
            "LINE_3",
            "--ignore-codespace",
            "NSR",
            "-e",
            "xml, netex",
            "-f",
            "json",
            "-q",
        ])
        .unwrap();
        assert_eq!(cli.disabled_rules, vec!["LINE_2", "LINE_3"]);
        assert_eq!(cli.ignored_codespaces, vec!["NSR"]);
        assert_eq!(
            cli.get_extensions(),
            Some(vec!["xml".to_string(), "netex".to_string()])
        );
        assert_eq!(cli.output_format, Some(OutputFormat::Json));
        assert_eq!(cli.verbosity(), VerbosityLevel::Quiet);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["netex-validator", "/tmp", "-c", "TST", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_validate() {
        let cli = Cli::try_parse_from(["netex-validator", "/nonexistent/dataset", "-c", "TST"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["netex-validator", "/tmp", "-c", "TST", "-t", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
