use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    #[arg(short, long, default_value = "/etc/fleet/config.yaml")]
    pub config: PathBuf,
    /// Overrides `init_concurrency` from the configuration file.
    #[arg(short = 'n', long, value_parser=clap::value_parser!(u32).range(1..))]
    pub init_concurrency: Option<u32>,
    /// Overrides `agent_timeout_secs` from the configuration file.
    #[arg(short = 't', long, value_parser=clap::value_parser!(u64).range(1..))]
    pub agent_timeout_secs: Option<u64>,
}
