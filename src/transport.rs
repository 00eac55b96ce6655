//! Fact retrieval transports: pre-flight capability checks and the two
//! retrieval strategies (managed NETCONF session, console bootstrap).

use anyhow::Result;
use async_trait::async_trait;
use semver::Version;
use tracing::{debug, info, warn};

pub mod console;
pub mod netconf;

use crate::config::types::{ConsoleTarget, SessionTarget};
use crate::error::FactsError;
use crate::facts::FactsRecord;
use console::Notifier;

/// Minimum NETCONF client version for the managed session path.
pub const MIN_NETCONF_CLIENT: &str = "1.2.2";
/// Minimum bootstrap utility version for the console path.
pub const MIN_BOOTSTRAP_UTILITY: &str = "1.0.1";

/// Outcome of a pre-flight capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available { version: Version },
    Unavailable { requirement: String, reason: String },
}

impl Availability {
    pub fn into_result(self) -> Result<Version, FactsError> {
        match self {
            Self::Available { version } => Ok(version),
            Self::Unavailable {
                requirement,
                reason,
            } => Err(FactsError::DependencyMissing {
                requirement,
                reason,
            }),
        }
    }
}

/// Check a reported version (if any) against a minimum.
pub fn require_version(name: &str, found: Option<&str>, minimum: &str) -> Availability {
    let requirement = format!("{} >= {}", name, minimum);
    let Some(found) = found.map(str::trim).filter(|v| !v.is_empty()) else {
        return Availability::Unavailable {
            requirement,
            reason: format!("{} is not installed", name),
        };
    };

    let (Ok(found_version), Ok(min_version)) = (Version::parse(found), Version::parse(minimum))
    else {
        return Availability::Unavailable {
            requirement,
            reason: format!("cannot parse {} version {:?}", name, found),
        };
    };

    if found_version < min_version {
        Availability::Unavailable {
            requirement,
            reason: format!("found version {}", found_version),
        }
    } else {
        Availability::Available {
            version: found_version,
        }
    }
}

/// An open management session. Facts are gathered while it is established.
#[async_trait]
pub trait DeviceSession: Send {
    fn facts(&self) -> FactsRecord;

    async fn close(&mut self) -> Result<()>;
}

/// Management-protocol client that can open sessions to a device.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn probe(&self) -> Availability;

    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn DeviceSession>>;
}

/// Utility that brings a device up over its console and reports facts.
#[async_trait]
pub trait BootstrapUtility: Send + Sync {
    async fn probe(&self) -> Availability;

    /// Run with the given argument list. Returns the utility's result
    /// document, whose `facts` member holds the facts.
    async fn run(&self, args: &[String], notifier: &Notifier) -> Result<serde_json::Value>;
}

/// Open a session, close it, and return the facts gathered while it was open.
pub async fn retrieve_managed(
    client: &dyn SessionClient,
    target: &SessionTarget,
) -> Result<FactsRecord, FactsError> {
    let version = client.probe().await.into_result()?;
    debug!("NETCONF client version {}", version);

    info!("Opening session to {}:{} as {}", target.host, target.port, target.user);
    let mut session = client
        .open(target)
        .await
        .map_err(|e| FactsError::Connect {
            host: target.host.clone(),
            cause: format!("{:#}", e),
        })?;

    if let Err(e) = session.close().await {
        warn!("Failed to close session to {}: {:#}", target.host, e);
    }

    Ok(session.facts())
}

/// Argument list for the bootstrap utility, in the order its CLI expects.
pub fn bootstrap_args(target: &ConsoleTarget) -> Vec<String> {
    let mut args = vec![target.console.clone(), "--facts".to_string()];
    if let Some(savedir) = &target.savedir {
        args.push(format!("--savedir={}", savedir.display()));
    }
    args.push(format!("--user={}", target.user));
    if let Some(passwd) = &target.passwd {
        args.push(format!("--passwd={}", passwd));
    }
    args.push(target.host.clone());
    args
}

/// Copy of `args` safe for logs.
pub fn masked_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|a| match a.strip_prefix("--passwd=") {
            Some(_) => "--passwd=********".to_string(),
            None => a.clone(),
        })
        .collect()
}

/// Run the bootstrap utility. Returns the facts and the argument list used.
pub async fn retrieve_console(
    utility: &dyn BootstrapUtility,
    target: &ConsoleTarget,
) -> Result<(FactsRecord, Vec<String>), FactsError> {
    let version = utility.probe().await.into_result()?;
    debug!("Bootstrap utility version {}", version);

    let args = bootstrap_args(target);
    let notifier = match &target.logfile {
        Some(path) => Notifier::logging(path, &target.host)
            .map_err(|e| FactsError::Invocation(format!("{:#}", e)))?,
        None => Notifier::Silent,
    };

    info!("Running console bootstrap: {:?}", masked_args(&args));
    let result = utility
        .run(&args, &notifier)
        .await
        .map_err(|e| FactsError::Invocation(format!("{:#}", e)))?;

    let facts = match result.get("facts") {
        Some(serde_json::Value::Object(facts)) => facts.clone(),
        Some(serde_json::Value::Null) | None => {
            warn!("Bootstrap utility returned no facts");
            FactsRecord::new()
        }
        Some(other) => {
            return Err(FactsError::Invocation(format!(
                "unexpected facts in bootstrap result: {}",
                other
            )))
        }
    };

    Ok((facts, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use serde_json::json;

    struct FakeSession {
        facts: FactsRecord,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DeviceSession for FakeSession {
        fn facts(&self) -> FactsRecord {
            self.facts.clone()
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeClient {
        version: Option<&'static str>,
        fail_with: Option<&'static str>,
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    impl FakeClient {
        fn new(version: Option<&'static str>, fail_with: Option<&'static str>) -> Self {
            Self {
                version,
                fail_with,
                opened: AtomicUsize::new(0),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl SessionClient for FakeClient {
        async fn probe(&self) -> Availability {
            require_version("junos-netconf", self.version, MIN_NETCONF_CLIENT)
        }

        async fn open(&self, _target: &SessionTarget) -> Result<Box<dyn DeviceSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = self.fail_with {
                return Err(anyhow!(msg));
            }
            Ok(Box::new(FakeSession {
                facts: json!({"hostname": "r1", "2RE": true}).as_object().cloned().unwrap(),
                closed: self.closed.clone(),
            }))
        }
    }

    fn session_target() -> SessionTarget {
        SessionTarget {
            host: "r1.lab".to_string(),
            user: "root".to_string(),
            passwd: None,
            port: 830,
        }
    }

    fn console_target() -> ConsoleTarget {
        ConsoleTarget {
            host: "r2".to_string(),
            user: "root".to_string(),
            passwd: None,
            console: "--telnet=ts,7000".to_string(),
            savedir: Some(PathBuf::from("/d")),
            logfile: None,
        }
    }

    #[test]
    fn version_gate() {
        assert!(matches!(
            require_version("x", Some("1.2.2"), "1.2.2"),
            Availability::Available { .. }
        ));
        assert!(matches!(
            require_version("x", Some("2.0.0"), "1.2.2"),
            Availability::Available { .. }
        ));
        match require_version("x", Some("1.2.1"), "1.2.2") {
            Availability::Unavailable { requirement, reason } => {
                assert_eq!(requirement, "x >= 1.2.2");
                assert!(reason.contains("1.2.1"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            require_version("x", None, "1.2.2"),
            Availability::Unavailable { .. }
        ));
        assert!(matches!(
            require_version("x", Some("garbage"), "1.2.2"),
            Availability::Unavailable { .. }
        ));
    }

    #[tokio::test]
    async fn managed_session_is_closed_before_facts_are_returned() {
        let client = FakeClient::new(Some("1.3.0"), None);
        let facts = retrieve_managed(&client, &session_target()).await.unwrap();
        assert_eq!(client.opened.load(Ordering::SeqCst), 1);
        assert_eq!(client.closed.load(Ordering::SeqCst), 1);
        assert_eq!(facts.get("2RE"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn missing_client_fails_before_connecting() {
        for version in [None, Some("1.0.0")] {
            let client = FakeClient::new(version, None);
            let err = retrieve_managed(&client, &session_target()).await.unwrap_err();
            assert!(err.is_dependency_missing());
            assert!(err.to_string().contains("1.2.2"));
            assert_eq!(client.opened.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn connect_failure_names_host_and_cause() {
        let client = FakeClient::new(Some("1.3.0"), Some("Authentication failed"));
        let err = retrieve_managed(&client, &session_target()).await.unwrap_err();
        assert!(!err.is_dependency_missing());
        let msg = err.to_string();
        assert!(msg.contains("r1.lab"));
        assert!(msg.contains("Authentication failed"));
        assert_eq!(client.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn console_args_follow_fixed_order() {
        assert_eq!(
            bootstrap_args(&console_target()),
            vec!["--telnet=ts,7000", "--facts", "--savedir=/d", "--user=root", "r2"]
        );

        let target = ConsoleTarget {
            passwd: Some("pw".to_string()),
            savedir: None,
            ..console_target()
        };
        assert_eq!(
            bootstrap_args(&target),
            vec!["--telnet=ts,7000", "--facts", "--user=root", "--passwd=pw", "r2"]
        );
    }

    #[test]
    fn masks_password_argument() {
        let args = vec!["--user=root".to_string(), "--passwd=pw".to_string()];
        assert_eq!(masked_args(&args), vec!["--user=root", "--passwd=********"]);
    }

    struct FakeUtility {
        version: Option<&'static str>,
        outcome: Result<serde_json::Value, &'static str>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl BootstrapUtility for FakeUtility {
        async fn probe(&self) -> Availability {
            require_version("netconify", self.version, MIN_BOOTSTRAP_UTILITY)
        }

        async fn run(&self, args: &[String], notifier: &Notifier) -> Result<serde_json::Value> {
            self.seen.lock().unwrap().push(args.to_vec());
            notifier.notify("facts", "gathering");
            self.outcome.clone().map_err(|e| anyhow!(e))
        }
    }

    fn utility(
        version: Option<&'static str>,
        outcome: Result<serde_json::Value, &'static str>,
    ) -> FakeUtility {
        FakeUtility {
            version,
            outcome,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn console_returns_facts_and_args() {
        let u = utility(
            Some("1.0.1"),
            Ok(json!({"facts": {"hostname": "r2", "2RE": false}, "inventory": []})),
        );
        let (facts, args) = retrieve_console(&u, &console_target()).await.unwrap();
        assert_eq!(facts.get("2RE"), Some(&json!(false)));
        assert_eq!(args, bootstrap_args(&console_target()));
        assert_eq!(u.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn console_failure_carries_cause_verbatim() {
        let u = utility(Some("1.0.1"), Err("console port busy"));
        let err = retrieve_console(&u, &console_target()).await.unwrap_err();
        assert_eq!(err.to_string(), "console port busy");
    }

    #[tokio::test]
    async fn old_bootstrap_utility_is_never_run() {
        let u = utility(Some("1.0.0"), Ok(json!({"facts": {}})));
        let err = retrieve_console(&u, &console_target()).await.unwrap_err();
        assert!(err.is_dependency_missing());
        assert!(err.to_string().contains("1.0.1"));
        assert!(u.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn console_events_are_written_to_logfile() {
        let dir = tempfile::tempdir().unwrap();
        let logfile = dir.path().join("console.log");
        let target = ConsoleTarget {
            logfile: Some(logfile.clone()),
            ..console_target()
        };
        let u = utility(Some("1.1.0"), Ok(json!({"facts": {"hostname": "r2"}})));
        retrieve_console(&u, &target).await.unwrap();

        let log = std::fs::read_to_string(&logfile).unwrap();
        assert!(log.trim_end().ends_with(":netconify.r2:facts:gathering"));
    }
}
