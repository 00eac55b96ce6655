//! Module entry: bind parameters, retrieve facts over the selected transport,
//! persist them, and report the outcome through an injected [`ModuleIo`].

use std::io::Write;

use anyhow::{anyhow, Result};
use tracing::{error, info};

use crate::app::cli::Args;
use crate::config::types::{InvocationParameters, Transport};
use crate::error::FactsError;
use crate::facts::types::FailureResult;
use crate::facts::{normalize, save_facts, ExecutionResult};
use crate::transport::{retrieve_console, retrieve_managed, BootstrapUtility, SessionClient};

/// Parameter binding and result reporting for one invocation.
pub trait ModuleIo {
    fn params(&self) -> Result<InvocationParameters, FactsError>;

    fn exit_json(&mut self, result: &ExecutionResult) -> Result<()>;

    fn fail_json(&mut self, msg: &str) -> Result<()>;
}

/// Parameters from the command line, result documents on a writer (stdout in
/// the binary).
pub struct StdioModule<W: Write> {
    args: Args,
    out: W,
}

impl<W: Write> StdioModule<W> {
    pub fn new(args: Args, out: W) -> Self {
        Self { args, out }
    }

    fn emit<T: serde::Serialize>(&mut self, document: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, document)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> ModuleIo for StdioModule<W> {
    fn params(&self) -> Result<InvocationParameters, FactsError> {
        self.args.params()
    }

    fn exit_json(&mut self, result: &ExecutionResult) -> Result<()> {
        self.emit(result)
    }

    fn fail_json(&mut self, msg: &str) -> Result<()> {
        self.emit(&FailureResult::new(msg))
    }
}

/// Retrieve facts for one invocation. Every error is fatal; nothing is retried.
pub async fn run(
    params: &InvocationParameters,
    client: &dyn SessionClient,
    utility: &dyn BootstrapUtility,
) -> Result<ExecutionResult, FactsError> {
    let transport = Transport::select(params);
    info!("Retrieving facts from {} via {}", params.host, transport.name());

    let (result, from_console) = match transport {
        Transport::ManagedSession(target) => {
            let mut facts = retrieve_managed(client, &target).await?;
            normalize(&mut facts);
            (ExecutionResult::new(facts), false)
        }
        // Console facts are passed through with their original key names.
        Transport::ConsoleBootstrap(target) => {
            let (facts, args) = retrieve_console(utility, &target).await?;
            (ExecutionResult::new(facts).with_args(args), true)
        }
    };

    if let Some(savedir) = &params.savedir {
        if from_console && !result.facts.contains_key("hostname") {
            return Err(FactsError::Persistence(anyhow!(
                "bootstrap utility returned facts without a hostname"
            )));
        }
        save_facts(savedir, &result.facts)
            .await
            .map_err(FactsError::Persistence)?;
    }

    Ok(result)
}

/// Bind, run, and report. Returns true when a success document was emitted.
pub async fn execute(
    io: &mut dyn ModuleIo,
    client: &dyn SessionClient,
    utility: &dyn BootstrapUtility,
) -> bool {
    let outcome = match io.params() {
        Ok(params) => run(&params, client, utility).await,
        Err(e) => Err(e),
    };

    let reported = match &outcome {
        Ok(result) => io.exit_json(result),
        Err(e) => {
            if e.is_dependency_missing() {
                error!("Pre-flight check failed: {}", e);
            } else {
                error!("{}", e);
            }
            io.fail_json(&e.to_string())
        }
    };

    if let Err(e) = reported {
        error!("Failed to write result: {:#}", e);
        return false;
    }
    outcome.is_ok()
}
