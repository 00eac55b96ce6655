//! Built-in NETCONF client: implements [`SessionClient`] over SSH.

pub mod facts;
pub mod parser;
pub mod session;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{require_version, Availability, DeviceSession, SessionClient, MIN_NETCONF_CLIENT};
use crate::config::types::SessionTarget;
use crate::facts::FactsRecord;
use session::NetconfChannel;

pub const CLIENT_NAME: &str = "junos-netconf";
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, Clone, Copy)]
pub struct NetconfClient;

#[async_trait]
impl SessionClient for NetconfClient {
    async fn probe(&self) -> Availability {
        require_version(CLIENT_NAME, Some(CLIENT_VERSION), MIN_NETCONF_CLIENT)
    }

    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn DeviceSession>> {
        let target = target.clone();
        let (channel, facts) = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut channel = NetconfChannel::connect(&target)?;
            let facts = facts::gather_facts(&mut channel)?;
            Ok((channel, facts))
        })
        .await
        .map_err(|e| anyhow!("NETCONF worker failed: {}", e))??;

        debug!("Gathered {} facts", facts.len());
        Ok(Box::new(NetconfSession {
            channel: Some(channel),
            facts,
        }))
    }
}

/// Open session holding the facts read during establishment.
pub struct NetconfSession {
    channel: Option<NetconfChannel>,
    facts: FactsRecord,
}

#[async_trait]
impl DeviceSession for NetconfSession {
    fn facts(&self) -> FactsRecord {
        self.facts.clone()
    }

    async fn close(&mut self) -> Result<()> {
        let Some(channel) = self.channel.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || channel.close())
            .await
            .map_err(|e| anyhow!("NETCONF worker failed: {}", e))?
    }
}
