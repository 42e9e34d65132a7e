use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "scorehub-worker", version, about = "Runs the ScoreHub job queue and scheduler")]
pub struct CliArgs {
    /// Path to configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long = "config-path", env = "SCOREHUB_CONFIG_PATH")]
    pub config_path: Option<String>,

    /// Load and validate the configuration, print it, then exit
    #[arg(long)]
    pub check_config: bool,
}
