//! netconify subprocess executor.
//! Runs the bootstrap utility, forwards its progress to the notifier and
//! parses the JSON result it prints on stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, trace};

use super::notifier::Notifier;
use crate::transport::{
    masked_args, require_version, Availability, BootstrapUtility, MIN_BOOTSTRAP_UTILITY,
};

pub const UTILITY_NAME: &str = "netconify";
/// Environment variable overriding the utility program path.
pub const PROGRAM_ENV: &str = "JUNOS_FACTS_NETCONIFY";

#[derive(Debug, Clone)]
pub struct NetconifyCommand {
    program: PathBuf,
}

impl NetconifyCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program from `--netconify`, then the environment, then `netconify` on PATH.
    pub fn resolve(program: Option<&Path>) -> Self {
        let program = program
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(PROGRAM_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(UTILITY_NAME));
        Self::new(program)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl BootstrapUtility for NetconifyCommand {
    async fn probe(&self) -> Availability {
        let output = tokio::process::Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                debug!("Cannot run {:?}: {}", self.program, e);
                return require_version(UTILITY_NAME, None, MIN_BOOTSTRAP_UTILITY);
            }
        };

        // Some builds print the version on stderr.
        let text = format!(
            "{} {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        match extract_version(&text) {
            Some(version) => require_version(UTILITY_NAME, Some(&version), MIN_BOOTSTRAP_UTILITY),
            None => Availability::Unavailable {
                requirement: format!("{} >= {}", UTILITY_NAME, MIN_BOOTSTRAP_UTILITY),
                reason: format!("unrecognised --version output: {:?}", text.trim()),
            },
        }
    }

    async fn run(&self, args: &[String], notifier: &Notifier) -> Result<serde_json::Value> {
        trace!("Executing: {:?} {:?}", self.program, masked_args(args));
        if let Notifier::Logging(log) = notifier {
            debug!("Console events logged to {:?}", log.path());
        }

        let mut child = tokio::process::Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to execute {:?}", self.program))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("{} stdout not captured", UTILITY_NAME))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("{} stderr not captured", UTILITY_NAME))?;

        let read_stdout = async {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        };
        let forward_stderr = async {
            let mut lines = BufReader::new(stderr).lines();
            let mut last = None;
            while let Some(line) = lines.next_line().await? {
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                let (event, message) = split_event(&line);
                notifier.notify(event, message);
                last = Some(line);
            }
            Ok::<_, std::io::Error>(last)
        };

        let (stdout_bytes, last_stderr) = tokio::try_join!(read_stdout, forward_stderr)
            .with_context(|| format!("Failed reading {} output", UTILITY_NAME))?;
        let status = child.wait().await?;

        if !status.success() {
            return Err(anyhow!(
                "{}",
                last_stderr.unwrap_or_else(|| format!("{} exited with {}", UTILITY_NAME, status))
            ));
        }

        parse_result(&String::from_utf8_lossy(&stdout_bytes))
    }
}

/// First token that parses as a semantic version (`v` prefix tolerated,
/// two-part versions padded with `.0`).
pub fn extract_version(text: &str) -> Option<String> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .map(|t| t.trim_start_matches('v').trim_end_matches('.'))
        .find_map(|token| {
            if semver::Version::parse(token).is_ok() {
                return Some(token.to_string());
            }
            let padded = format!("{}.0", token);
            let parts = token.split('.').count();
            (parts == 2 && semver::Version::parse(&padded).is_ok()).then_some(padded)
        })
}

/// `event:message` when the prefix is a bare word, otherwise an `info` event.
fn split_event(line: &str) -> (&str, &str) {
    match line.split_once(':') {
        Some((event, message))
            if !event.is_empty()
                && event
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
        {
            (event, message.trim_start())
        }
        _ => ("info", line),
    }
}

/// The result document is the JSON object on stdout; any chatter before it
/// is skipped.
fn parse_result(stdout: &str) -> Result<serde_json::Value> {
    let trimmed = stdout.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Ok(value);
        }
    }

    let start = trimmed
        .find("\n{")
        .map(|i| i + 1)
        .ok_or_else(|| anyhow!("{} did not print a JSON result", UTILITY_NAME))?;
    let value: serde_json::Value = serde_json::from_str(&trimmed[start..])
        .with_context(|| format!("{} printed an invalid JSON result", UTILITY_NAME))?;
    if !value.is_object() {
        return Err(anyhow!("{} result is not a JSON object", UTILITY_NAME));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_versions_from_banners() {
        assert_eq!(extract_version("netconify 1.0.3").as_deref(), Some("1.0.3"));
        assert_eq!(extract_version("v1.2.0\n").as_deref(), Some("1.2.0"));
        assert_eq!(extract_version("netconify (1.1)").as_deref(), Some("1.1.0"));
        assert_eq!(extract_version("usage: netconify [-h]"), None);
    }

    #[test]
    fn splits_event_lines() {
        assert_eq!(split_event("login: connected"), ("login", "connected"));
        assert_eq!(split_event("TTY_LOGIN:ok"), ("TTY_LOGIN", "ok"));
        assert_eq!(split_event("no event here"), ("info", "no event here"));
        assert_eq!(
            split_event("connecting to ts 10.0.0.1:7000"),
            ("info", "connecting to ts 10.0.0.1:7000")
        );
    }

    #[test]
    fn parses_result_after_chatter() {
        let out = "logging in\n{\"facts\": {\"hostname\": \"r2\"}}\n";
        assert_eq!(parse_result(out).unwrap()["facts"], json!({"hostname": "r2"}));
        assert!(parse_result("no json at all").is_err());
        assert!(parse_result("[1, 2]").is_err());
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("netconify");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probes_installed_version() {
        let dir = tempfile::tempdir().unwrap();
        let ok = NetconifyCommand::new(script(dir.path(), "echo 'netconify 1.0.3'"));
        assert!(matches!(ok.probe().await, Availability::Available { .. }));

        let missing = NetconifyCommand::new(dir.path().join("absent"));
        match missing.probe().await {
            Availability::Unavailable { requirement, .. } => {
                assert_eq!(requirement, "netconify >= 1.0.1")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_utility_and_forwards_events() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            dir.path(),
            r#"echo "login:console ready" >&2
echo "{\"facts\": {\"hostname\": \"$#\"}}""#,
        );
        let log = dir.path().join("events.log");
        let notifier = Notifier::logging(&log, "r2").unwrap();

        let args: Vec<String> = ["--telnet=ts,7000", "--facts", "r2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let result = NetconifyCommand::new(program)
            .run(&args, &notifier)
            .await
            .unwrap();

        assert_eq!(result["facts"]["hostname"], json!("3"));
        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.trim_end().ends_with(":netconify.r2:login:console ready"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_reports_last_stderr_line() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo 'error: console port busy' >&2\nexit 2");
        let err = NetconifyCommand::new(program)
            .run(&[], &Notifier::Silent)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "error: console port busy");
    }
}
