use crate::app::{AppConfig, DEFAULT_PAGE_SIZE};
use clap::Parser;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_NUMBER"));

#[derive(Parser, Debug)]
#[command(name = "appruns", version = VERSION, about = "Application run history TUI")]
pub struct Cli {
    /// Application name (fully qualified) whose runs are shown
    pub app: String,

    /// Catalog server URL
    #[arg(short, long, env = "APPRUNS_SERVER", default_value = "http://localhost:8585")]
    pub server: String,

    /// Bearer token used to authenticate against the server
    #[arg(short, long, env = "APPRUNS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Runs per page
    #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Fixed number of runs to request, regardless of page size
    #[arg(short, long)]
    pub max_records: Option<usize>,

    /// Hide pagination controls
    #[arg(long)]
    pub no_pagination: bool,

    /// Show the authorization card before the run history
    #[arg(long)]
    pub authorize: bool,

    /// Disable desktop notifications for errors
    #[arg(long)]
    pub no_notify: bool,

    /// Write debug logs to $XDG_STATE_HOME/appruns/debug.log
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn app_config(&self, server_host: String) -> AppConfig {
        AppConfig {
            server: server_host,
            app: self.app.clone(),
            page_size: self.page_size.max(1),
            max_records: self.max_records.filter(|&n| n > 0),
            show_pagination: !self.no_pagination,
        }
    }
}
