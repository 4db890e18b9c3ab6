//! Command-line interface definitions.
//!
//! Everything except the config file location lives in the config file.

use clap::Parser;
use std::path::PathBuf;

/// Pick one fresh news item and publish it.
///
/// # Examples
///
/// ```sh
/// fresh_news --config /etc/fresh_news/config.yaml
///
/// # Select and log the item without touching the state file
/// fresh_news --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "FRESH_NEWS_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Read the last published record but never overwrite it
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::parse_from(["fresh_news"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["fresh_news", "-c", "/etc/fresh_news.yaml", "--dry-run"]);
        assert_eq!(cli.config, PathBuf::from("/etc/fresh_news.yaml"));
        assert!(cli.dry_run);
    }
}
