use super::Parser;

/// Session lifecycle API server.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// TOML settings file; defaults to settings/dev.toml in debug builds.
    #[arg(long)]
    pub settings: Option<String>,
}
