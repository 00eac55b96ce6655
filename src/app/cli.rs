//! Command-line argument definitions (clap).

use std::path::PathBuf;

use clap::Parser;

use crate::config::persistence::load_params;
use crate::config::types::{default_user, InvocationParameters};
use crate::config::DEFAULT_PORT;
use crate::error::FactsError;

#[derive(Parser, Debug)]
#[command(name = "junos-facts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Retrieve Junos device facts over NETCONF or a console bootstrap", long_about = None)]
pub struct Args {
    // === Arguments file ===
    /// Module arguments file (JSON, wrapped JSON, or key=value pairs)
    #[arg(
        value_name = "ARGS_FILE",
        conflicts_with_all = ["host", "user", "passwd", "console", "savedir", "logfile", "port"],
        help_heading = "Arguments File"
    )]
    pub args_file: Option<PathBuf>,

    // === Device ===
    /// Target device address or name
    #[arg(long, help_heading = "Device")]
    pub host: Option<String>,

    /// Login user (defaults to the current OS user)
    #[arg(short = 'u', long, help_heading = "Device")]
    pub user: Option<String>,

    /// Login password (omit for key-based authentication)
    #[arg(short = 'p', long, help_heading = "Device")]
    pub passwd: Option<String>,

    /// NETCONF port
    #[arg(long, help_heading = "Device")]
    pub port: Option<u16>,

    // === Console ===
    /// Console target passed to the bootstrap utility (e.g. --telnet=ts,7000)
    #[arg(long, allow_hyphen_values = true, help_heading = "Console")]
    pub console: Option<String>,

    /// Console event log file
    #[arg(long, help_heading = "Console")]
    pub logfile: Option<PathBuf>,

    /// Bootstrap utility program (default: netconify on PATH)
    #[arg(long, value_name = "PATH", help_heading = "Console")]
    pub netconify: Option<PathBuf>,

    // === Output ===
    /// Save facts to <SAVEDIR>/<hostname>-facts.json
    #[arg(long, help_heading = "Output")]
    pub savedir: Option<PathBuf>,

    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long = "log-level", help_heading = "Output")]
    pub log_level: Option<String>,
}

impl Args {
    /// Bind invocation parameters from the arguments file or the flags.
    pub fn params(&self) -> Result<InvocationParameters, FactsError> {
        let params = match &self.args_file {
            Some(path) => load_params(path).map_err(|e| FactsError::Params(format!("{:#}", e)))?,
            None => InvocationParameters {
                user: self.user.clone().unwrap_or_else(default_user),
                passwd: self.passwd.clone(),
                console: self.console.clone(),
                savedir: self.savedir.clone(),
                logfile: self.logfile.clone(),
                port: self.port.unwrap_or(DEFAULT_PORT),
                ..InvocationParameters::for_host(self.host.clone().unwrap_or_default())
            },
        };
        params.normalized()
    }
}
