//! junos-facts entry point: argument parsing, logging, single-shot fact retrieval.

mod app;
mod config;
mod error;
mod facts;
mod module;
mod transport;

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use app::cli::Args;
use app::logging::{init_tracing, resolve_filter};
use module::{execute, StdioModule};
use transport::console::NetconifyCommand;
use transport::netconf::NetconfClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = resolve_filter(args.log_level.as_deref());
    init_tracing(&filter);
    debug!("Log filter: {}", filter);

    let utility = NetconifyCommand::resolve(args.netconify.as_deref());
    debug!("Bootstrap utility: {:?}", utility.program());

    let mut io = StdioModule::new(args, std::io::stdout().lock());
    if execute(&mut io, &NetconfClient, &utility).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
