//! CLI definitions for the demo binary.

use clap::{Parser, ValueEnum};

use crate::config::{parse_destinations, Config};

/// Drives a destination-tagged cache against a randomly changing dataset.
#[derive(Debug, Parser)]
#[command(name = "subcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Number of steps to run before stopping the consumers.
    #[arg(long, default_value_t = 10)]
    pub ticks: u64,

    /// Milliseconds between steps. Overrides SUBCACHE_TICK_MS.
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Comma-separated destination keys. Overrides SUBCACHE_DESTINATIONS.
    #[arg(long)]
    pub destinations: Option<String>,

    /// Search every destination by default. Overrides SUBCACHE_SEARCH_IN_ALL.
    #[arg(long)]
    pub search_in_all: bool,

    /// Upper bound on parent documents. Overrides SUBCACHE_MAX_DOCUMENTS.
    #[arg(long)]
    pub max_documents: Option<usize>,

    /// Seed for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,
}

impl Cli {
    /// Applies the flags that were given on top of `config`.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        if let Some(destinations) = &self.destinations {
            let keys = parse_destinations(destinations);
            if !keys.is_empty() {
                config.destinations = keys;
            }
        }
        if self.search_in_all {
            config.search_in_all = true;
        }
        if let Some(max_documents) = self.max_documents {
            config.max_documents = max_documents;
        }
        config
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable tables.
    #[default]
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            search_in_all: false,
            destinations: parse_destinations("s1,s2"),
            tick_ms: 500,
            max_documents: 20,
        }
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["subcache"]);

        assert_eq!(cli.ticks, 10);
        assert_eq!(cli.format, OutputFormat::Pretty);
        assert_eq!(cli.apply(base()), base());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "subcache",
            "--tick-ms",
            "5",
            "--destinations",
            "a,b,c",
            "--search-in-all",
            "--max-documents",
            "2",
            "--format",
            "json",
        ]);
        let config = cli.apply(base());

        assert_eq!(config.tick_ms, 5);
        assert_eq!(config.destinations, parse_destinations("a,b,c"));
        assert!(config.search_in_all);
        assert_eq!(config.max_documents, 2);
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
