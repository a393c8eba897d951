use clap::Parser;

use crate::catalog::CatalogMode;

/// jamtune - stream Jamendo tracks from your terminal
#[derive(Parser, Debug)]
#[command(name = "jamtune", version, about)]
pub struct Args {
    /// Use a silent simulated output instead of the sound card
    #[arg(long)]
    pub dry_run: bool,

    /// Also write logs to stderr
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Generate default config.toml to stdout
    #[arg(long)]
    pub generate_config: bool,

    /// Catalog access: direct Jamendo API or the backend proxy
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<CatalogMode>,

    /// Jamendo API client id (direct mode)
    #[arg(long, env = "JAMENDO_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Backend origin (proxy mode)
    #[arg(long)]
    pub api_base: Option<String>,
}

fn parse_mode(s: &str) -> Result<CatalogMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "direct" => Ok(CatalogMode::Direct),
        "proxy" => Ok(CatalogMode::Proxy),
        other => Err(format!("unknown mode `{}` (expected direct or proxy)", other)),
    }
}

impl Args {
    /// Command-line values win over the config file.
    pub fn apply(&self, config: &mut crate::app::config::UserConfig) {
        if let Some(mode) = self.mode {
            config.catalog = mode;
        }
        if let Some(id) = &self.client_id {
            config.client_id = id.clone();
        }
        if let Some(base) = &self.api_base {
            config.api_base = base.clone();
        }
    }
}
