//! NETCONF 1.0 over SSH: connection, hello exchange, framed RPCs.
//! Blocking; callers run it on tokio's blocking pool.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use ssh2::{Channel, Session};
use tracing::{debug, trace};

use super::parser;
use crate::config::types::SessionTarget;

/// End-of-message marker for base:1.0 framing.
pub const DELIMITER: &str = "]]>]]>";

const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";

const CLIENT_HELLO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.0</capability>
  </capabilities>
</hello>"#;

/// Something that answers NETCONF RPCs with the raw reply document.
pub trait RpcChannel {
    fn rpc(&mut self, request: &str) -> Result<String>;
}

pub struct NetconfChannel {
    session: Session,
    channel: Channel,
    buffer: Vec<u8>,
    message_id: u64,
}

impl NetconfChannel {
    /// Connect, authenticate, start the `netconf` subsystem and exchange hellos.
    pub fn connect(target: &SessionTarget) -> Result<Self> {
        let tcp = TcpStream::connect((target.host.as_str(), target.port))
            .with_context(|| format!("TCP connect to {}:{} failed", target.host, target.port))?;

        let mut session = Session::new().context("Failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        session.handshake().context("SSH handshake failed")?;

        authenticate(&session, target)?;

        let mut channel = session
            .channel_session()
            .context("Failed to open SSH channel")?;
        channel
            .subsystem("netconf")
            .context("Failed to start netconf subsystem")?;

        let mut nc = Self {
            session,
            channel,
            buffer: Vec::new(),
            message_id: 0,
        };

        let server_hello = nc.read_message().context("No NETCONF hello from server")?;
        if !parser::all_text(&server_hello, "capability")
            .iter()
            .any(|c| c == BASE_CAPABILITY)
        {
            bail!("server does not advertise {}", BASE_CAPABILITY);
        }
        nc.write_message(CLIENT_HELLO)?;
        debug!("NETCONF session established with {}", target.host);

        Ok(nc)
    }

    fn write_message(&mut self, body: &str) -> Result<()> {
        trace!("NETCONF >> {}", body);
        self.channel.write_all(body.as_bytes())?;
        self.channel.write_all(DELIMITER.as_bytes())?;
        self.channel.flush()?;
        Ok(())
    }

    fn read_message(&mut self) -> Result<String> {
        let mut chunk = [0u8; 8192];
        loop {
            if let Some(end) = find_delimiter(&self.buffer) {
                let message: Vec<u8> = self.buffer.drain(..end + DELIMITER.len()).collect();
                let text = String::from_utf8_lossy(&message[..end]).into_owned();
                trace!("NETCONF << {}", text);
                return Ok(text);
            }

            let n = self.channel.read(&mut chunk)?;
            if n == 0 {
                bail!("NETCONF session closed by peer");
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// End the session politely. Errors from the peer going away are reported.
    pub fn close(mut self) -> Result<()> {
        let goodbye = self.rpc("<close-session/>");
        self.channel.send_eof().ok();
        self.channel.wait_close().ok();
        self.session
            .disconnect(None, "closing NETCONF session", None)
            .context("SSH disconnect failed")?;
        goodbye.map(|_| ())
    }
}

impl RpcChannel for NetconfChannel {
    fn rpc(&mut self, request: &str) -> Result<String> {
        self.message_id += 1;
        let body = format!(
            r#"<rpc message-id="{}" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">{}</rpc>"#,
            self.message_id, request
        );
        self.write_message(&body)?;
        let reply = self.read_message()?;
        match parser::rpc_error(&reply) {
            Some(message) => Err(anyhow!("RPC error: {}", message)),
            None => Ok(reply),
        }
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(DELIMITER.len())
        .position(|w| w == DELIMITER.as_bytes())
}

/// Password when given, otherwise ssh-agent, then the default key files.
fn authenticate(session: &Session, target: &SessionTarget) -> Result<()> {
    if let Some(passwd) = &target.passwd {
        session
            .userauth_password(&target.user, passwd)
            .context("Authentication failed")?;
    } else {
        let mut last_error = None;
        match session.userauth_agent(&target.user) {
            Ok(()) => {}
            Err(e) => {
                debug!("ssh-agent authentication failed: {}", e);
                last_error = Some(e);
            }
        }

        if !session.authenticated() {
            for key in default_key_files() {
                if !key.exists() {
                    continue;
                }
                debug!("Trying key file {:?}", key);
                match session.userauth_pubkey_file(&target.user, None, &key, None) {
                    Ok(()) => break,
                    Err(e) => last_error = Some(e),
                }
            }
        }

        if !session.authenticated() {
            return Err(match last_error {
                Some(e) => anyhow!(e).context("Authentication failed"),
                None => anyhow!("Authentication failed: no password, agent identity or key file"),
            });
        }
    }

    if !session.authenticated() {
        bail!("Authentication failed");
    }
    Ok(())
}

fn default_key_files() -> Vec<PathBuf> {
    let Some(home) = std::env::var_os("HOME") else {
        return Vec::new();
    };
    let ssh_dir = PathBuf::from(home).join(".ssh");
    ["id_ed25519", "id_ecdsa", "id_rsa"]
        .iter()
        .map(|name| ssh_dir.join(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_end_of_message_marker() {
        assert_eq!(find_delimiter(b"<ok/>]]>]]><next"), Some(5));
        assert_eq!(find_delimiter(b"<ok/>]]>]]"), None);
        assert_eq!(find_delimiter(b""), None);
    }
}
