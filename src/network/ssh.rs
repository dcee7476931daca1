// file: src/network/ssh.rs
// version: 2.0.0
// guid: t0u1v2w3-x4y5-6789-0123-456789tuvwxy

//! Authenticated SSH session to one node
//!
//! All calls here block; async callers run them on the blocking pool.

use super::credentials::Credential;
use crate::config::ProviderConfig;
use crate::error::{FleetError, Result};
use ssh2::{CheckResult, KnownHostFileKind, Session};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Raw result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Both streams, stdout first; `vmadm` reports progress on stderr
    pub fn combined_text(&self) -> String {
        let mut text = self.stdout_lossy();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr_lossy());
        }
        text
    }

    /// Turn a non-zero exit status into a `RemoteCommand` error
    pub fn into_result(self, node: &str, command: &str) -> Result<Self> {
        if self.exit_status == 0 {
            return Ok(self);
        }

        let stdout = self.stdout_lossy();
        let stderr = self.stderr_lossy();
        error!("Command failed with exit code {}", self.exit_status);
        if !stdout.trim().is_empty() {
            error!("STDOUT: {}", stdout);
        }
        if !stderr.trim().is_empty() {
            error!("STDERR: {}", stderr);
        }

        Err(FleetError::RemoteCommand {
            node: node.to_string(),
            command: command.to_string(),
            exit_code: self.exit_status,
            stderr: if stderr.is_empty() { stdout } else { stderr },
        })
    }
}

/// One connected, authenticated session to a node
pub struct NodeSession {
    node: String,
    session: Session,
}

impl NodeSession {
    /// Dial, handshake and authenticate against `node`
    pub fn connect(
        node: &str,
        config: &ProviderConfig,
        credentials: &[Credential],
    ) -> Result<Self> {
        let addr = config.socket_addr(node)?;
        info!("Connecting to {} at {} as {}", node, addr, config.user);

        let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout()).map_err(|e| {
            FleetError::connection(node, format!("Failed to connect to {}: {}", addr, e))
        })?;

        let mut session = Session::new()
            .map_err(|e| FleetError::connection(node, format!("Failed to create SSH session: {}", e)))?;

        session.set_tcp_stream(tcp);
        session.set_timeout(config.connect_timeout_secs.saturating_mul(1000) as u32);
        session
            .handshake()
            .map_err(|e| FleetError::connection(node, format!("SSH handshake failed: {}", e)))?;

        if config.strict_host_key_checking {
            verify_host_key(node, &session, &addr.ip().to_string(), addr.port(), config)?;
        }

        let mut failures = Vec::new();
        for credential in credentials {
            let attempt = match credential {
                Credential::Agent { .. } => session.userauth_agent(&config.user),
                Credential::PrivateKey { path, passphrase } => {
                    session.userauth_pubkey_file(&config.user, None, path, passphrase.as_deref())
                }
            };

            match attempt {
                Ok(()) if session.authenticated() => {
                    debug!("Authenticated to {} with {}", node, credential.describe());
                    break;
                }
                Ok(()) => failures.push(format!("{}: rejected", credential.describe())),
                Err(e) => {
                    warn!("Authentication with {} failed: {}", credential.describe(), e);
                    failures.push(format!("{}: {}", credential.describe(), e));
                }
            }
        }

        if !session.authenticated() {
            return Err(FleetError::connection(
                node,
                format!("SSH authentication failed ({})", failures.join("; ")),
            ));
        }

        // Commands get their own deadline; 0 disables it
        let command_timeout = config
            .command_timeout()
            .map(|d| d.as_millis().min(u32::MAX as u128) as u32)
            .unwrap_or(0);
        session.set_timeout(command_timeout);

        info!("SSH connection established to {}", node);
        Ok(Self {
            node: node.to_string(),
            session,
        })
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Run one command on a fresh channel, writing `input` to its stdin first
    pub fn run(&self, command: &str, input: &[u8]) -> Result<CommandOutput> {
        debug!("Executing command on {}: {}", self.node, command);

        let transport = |what: &str, e: &dyn std::fmt::Display| {
            FleetError::connection(&self.node, format!("{} for '{}': {}", what, command, e))
        };
        let io_error = |what: &str, e: std::io::Error| {
            if e.kind() == ErrorKind::TimedOut {
                FleetError::Timeout {
                    node: self.node.clone(),
                    command: command.to_string(),
                }
            } else {
                transport(what, &e)
            }
        };

        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| transport("Failed to create SSH channel", &e))?;

        channel
            .exec(command)
            .map_err(|e| transport("Failed to execute command", &e))?;

        if !input.is_empty() {
            channel
                .write_all(input)
                .map_err(|e| io_error("Failed to write stdin", e))?;
        }
        channel
            .send_eof()
            .map_err(|e| transport("Failed to send EOF", &e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // Read stdout and stderr
        channel
            .read_to_end(&mut stdout)
            .map_err(|e| io_error("Failed to read stdout", e))?;
        channel
            .stderr()
            .read_to_end(&mut stderr)
            .map_err(|e| io_error("Failed to read stderr", e))?;

        channel
            .wait_close()
            .map_err(|e| transport("Failed to close SSH channel", &e))?;

        let exit_status = channel
            .exit_status()
            .map_err(|e| transport("Failed to get exit status", &e))?;

        debug!(
            "Command finished on {} with status {} ({} bytes stdout, {} bytes stderr)",
            self.node,
            exit_status,
            stdout.len(),
            stderr.len()
        );

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        })
    }

    /// Disconnect SSH session
    pub fn disconnect(&self) {
        let _ = self.session.disconnect(None, "closing", None);
        info!("SSH session to {} disconnected", self.node);
    }
}

fn verify_host_key(
    node: &str,
    session: &Session,
    host: &str,
    port: u16,
    config: &ProviderConfig,
) -> Result<()> {
    let path = config
        .known_hosts
        .clone()
        .or_else(|| dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts")))
        .unwrap_or_else(|| PathBuf::from("known_hosts"));

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| FleetError::connection(node, format!("Cannot initialise known hosts: {}", e)))?;
    known_hosts
        .read_file(&path, KnownHostFileKind::OpenSSH)
        .map_err(|e| {
            FleetError::connection(node, format!("Cannot read {}: {}", path.display(), e))
        })?;

    let (key, _) = session
        .host_key()
        .ok_or_else(|| FleetError::connection(node, "Node presented no host key"))?;

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(FleetError::connection(
            node,
            format!("Host key for {} not found in {}", host, path.display()),
        )),
        CheckResult::Mismatch => Err(FleetError::connection(
            node,
            format!("Host key for {} does not match {}", host, path.display()),
        )),
        CheckResult::Failure => Err(FleetError::connection(node, "Host key check failed")),
    }
}
