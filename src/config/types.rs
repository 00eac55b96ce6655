//! Invocation parameters and the transport each invocation resolves to.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::config::DEFAULT_PORT;
use crate::error::FactsError;

/// Parameters supplied by the caller. Immutable once bound.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvocationParameters {
    pub host: String,
    #[serde(default = "default_user")]
    pub user: String,
    /// Absent means key-based (agent or key file) authentication.
    #[serde(default)]
    pub passwd: Option<String>,
    /// Presence selects the console bootstrap transport.
    #[serde(default)]
    pub console: Option<String>,
    #[serde(default)]
    pub savedir: Option<PathBuf>,
    #[serde(default)]
    pub logfile: Option<PathBuf>,
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,
}

/// Login identity of the current OS user, or empty when it cannot be determined.
pub fn default_user() -> String {
    ["USER", "LOGNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_default()
}

pub fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => n,
        PortValue::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| D::Error::custom(format!("invalid port: {:?}", s)))?,
    };
    u16::try_from(raw)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| D::Error::custom(format!("port out of range: {}", raw)))
}

impl InvocationParameters {
    /// Minimal parameter set for `host`, everything else defaulted.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: default_user(),
            passwd: None,
            console: None,
            savedir: None,
            logfile: None,
            port: DEFAULT_PORT,
        }
    }

    /// Treat empty optional values as absent and check the required ones.
    pub fn normalized(mut self) -> Result<Self, FactsError> {
        self.host = self.host.trim().to_string();
        if self.host.is_empty() {
            return Err(FactsError::Params("host is required".to_string()));
        }

        if self.user.trim().is_empty() {
            self.user = default_user();
        }
        if self.user.is_empty() {
            return Err(FactsError::Params(
                "user not given and the current OS user cannot be determined".to_string(),
            ));
        }

        self.passwd = self.passwd.filter(|p| !p.is_empty());
        self.console = self.console.filter(|c| !c.trim().is_empty());
        self.savedir = self.savedir.filter(|p| !p.as_os_str().is_empty());
        self.logfile = self.logfile.filter(|p| !p.as_os_str().is_empty());
        Ok(self)
    }
}

impl fmt::Debug for InvocationParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationParameters")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("passwd", &self.passwd.as_ref().map(|_| "********"))
            .field("console", &self.console)
            .field("savedir", &self.savedir)
            .field("logfile", &self.logfile)
            .field("port", &self.port)
            .finish()
    }
}

/// Connection details for the managed NETCONF session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub host: String,
    pub user: String,
    pub passwd: Option<String>,
    pub port: u16,
}

impl fmt::Debug for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("passwd", &self.passwd.as_ref().map(|_| "********"))
            .field("port", &self.port)
            .finish()
    }
}

/// Inputs to the console bootstrap utility.
#[derive(Clone, PartialEq, Eq)]
pub struct ConsoleTarget {
    pub host: String,
    pub user: String,
    pub passwd: Option<String>,
    pub console: String,
    pub savedir: Option<PathBuf>,
    pub logfile: Option<PathBuf>,
}

impl fmt::Debug for ConsoleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("passwd", &self.passwd.as_ref().map(|_| "********"))
            .field("console", &self.console)
            .field("savedir", &self.savedir)
            .field("logfile", &self.logfile)
            .finish()
    }
}

/// The single retrieval strategy an invocation uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    ManagedSession(SessionTarget),
    ConsoleBootstrap(ConsoleTarget),
}

impl Transport {
    /// Console bootstrap when a console target is given, managed session otherwise.
    pub fn select(params: &InvocationParameters) -> Self {
        match params.console.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(console) => Self::ConsoleBootstrap(ConsoleTarget {
                host: params.host.clone(),
                user: params.user.clone(),
                passwd: params.passwd.clone(),
                console: console.to_string(),
                savedir: params.savedir.clone(),
                logfile: params.logfile.clone(),
            }),
            None => Self::ManagedSession(SessionTarget {
                host: params.host.clone(),
                user: params.user.clone(),
                passwd: params.passwd.clone(),
                port: params.port,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ManagedSession(_) => "managed-session",
            Self::ConsoleBootstrap(_) => "console-bootstrap",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(console: Option<&str>) -> InvocationParameters {
        InvocationParameters {
            user: "root".to_string(),
            console: console.map(str::to_string),
            ..InvocationParameters::for_host("r1")
        }
    }

    #[test]
    fn selects_managed_session_without_console() {
        match Transport::select(&params(None)) {
            Transport::ManagedSession(target) => {
                assert_eq!(target.host, "r1");
                assert_eq!(target.port, 830);
            }
            other => panic!("unexpected transport: {:?}", other),
        }
    }

    #[test]
    fn selects_console_bootstrap_with_console() {
        match Transport::select(&params(Some("--telnet=ts,7000"))) {
            Transport::ConsoleBootstrap(target) => {
                assert_eq!(target.console, "--telnet=ts,7000");
                assert_eq!(target.host, "r1");
            }
            other => panic!("unexpected transport: {:?}", other),
        }
    }

    #[test]
    fn empty_console_selects_managed_session() {
        assert_eq!(Transport::select(&params(Some(""))).name(), "managed-session");
        assert_eq!(Transport::select(&params(Some("   "))).name(), "managed-session");
    }

    #[test]
    fn normalized_drops_empty_optionals() {
        let p = InvocationParameters {
            passwd: Some(String::new()),
            console: Some(String::new()),
            savedir: Some(PathBuf::new()),
            ..params(None)
        }
        .normalized()
        .unwrap();
        assert_eq!(p.passwd, None);
        assert_eq!(p.console, None);
        assert_eq!(p.savedir, None);
    }

    #[test]
    fn normalized_rejects_missing_host() {
        let err = InvocationParameters {
            host: "  ".to_string(),
            ..params(None)
        }
        .normalized()
        .unwrap_err();
        assert!(err.to_string().contains("host is required"));
    }

    #[test]
    fn port_accepts_number_or_string() {
        let p: InvocationParameters =
            serde_json::from_str(r#"{"host": "r1", "user": "u", "port": "2222"}"#).unwrap();
        assert_eq!(p.port, 2222);
        let p: InvocationParameters =
            serde_json::from_str(r#"{"host": "r1", "user": "u", "port": 22}"#).unwrap();
        assert_eq!(p.port, 22);
        assert!(serde_json::from_str::<InvocationParameters>(
            r#"{"host": "r1", "user": "u", "port": 70000}"#
        )
        .is_err());
    }

    #[test]
    fn debug_masks_password() {
        let p = InvocationParameters {
            passwd: Some("s3cret".to_string()),
            ..params(None)
        };
        let rendered = format!("{:?}", p);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("********"));
    }
}
