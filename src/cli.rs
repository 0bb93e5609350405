use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "license-notices",
    about = "Resolve license texts of NuGet dependencies and write a third-party notices file",
    version
)]
pub struct Cli {
    /// Package directory or NuGet packages folder to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// JSON file with dependency records to resolve instead of scanning PATH
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Notices file to write [default: from config, else third-party-notices.txt]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Config file [default: ./.license-notices/config.toml, fallback ~/.config/license-notices/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// GitHub token for the licenses and repository APIs
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Do not follow HTTP redirects when fetching license URLs
    #[arg(long)]
    pub no_follow_redirects: bool,

    /// Number of dependencies resolved concurrently
    #[arg(short, long, default_value_t = 8)]
    pub jobs: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain-text notices file
    Text,
    /// JSON array on stdout
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["license-notices"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("."));
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.jobs, 8);
        assert!(!cli.no_follow_redirects);
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["license-notices", "-vv", "--format", "json", "pkgs"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.path, PathBuf::from("pkgs"));
    }
}
