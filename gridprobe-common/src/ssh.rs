//! SSH client for probing a node's control channel.
//!
//! Every probe invocation owns one scoped connection: connect, run, and
//! disconnect on every exit path, including timeout and error paths.

use crate::config::SshSettings;
use crate::types::{NodeConfig, NodeId};
use anyhow::{Context, Result};
use openssh::{KnownHosts, Session, SessionBuilder, Stdio};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Default SSH connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default command execution timeout.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a remote command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit code of the command.
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Execution duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandResult {
    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH connection options.
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// SSH username.
    pub user: String,
    /// Path to SSH private key (tilde-expanded).
    pub identity_file: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Command execution timeout.
    pub command_timeout: Duration,
    /// Known hosts policy.
    pub known_hosts: KnownHostsPolicy,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            identity_file: "~/.ssh/id_rsa".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            known_hosts: KnownHostsPolicy::Add,
        }
    }
}

impl SshOptions {
    /// Build options from configuration settings.
    pub fn from_settings(ssh: &SshSettings, connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            user: ssh.user.clone(),
            identity_file: ssh.identity_file.clone(),
            connect_timeout,
            command_timeout,
            known_hosts: KnownHostsPolicy::Add,
        }
    }
}

/// Known hosts policy for SSH connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownHostsPolicy {
    /// Strictly verify known hosts (recommended for production).
    Strict,
    /// Add unknown hosts automatically (for development).
    Add,
    /// Accept all hosts without verification (INSECURE - testing only).
    AcceptAll,
}

/// SSH client for a single node's control channel.
pub struct SshClient {
    /// Node this client talks to.
    node_id: NodeId,
    /// Control host to connect to.
    host: String,
    /// Control port.
    port: u16,
    /// SSH options.
    options: SshOptions,
    /// Active SSH session (if connected).
    session: Option<Session>,
}

impl SshClient {
    /// Create a client for a node's control channel.
    ///
    /// Returns `None` when the node has no control host; callers degrade the
    /// probe to a failure sample in that case.
    pub fn for_node(node: &NodeConfig, options: SshOptions) -> Option<Self> {
        let host = node.control_host.clone()?;
        Some(Self {
            node_id: node.id.clone(),
            host,
            port: node.control_port.unwrap_or(22),
            options,
            session: None,
        })
    }

    /// Get the node ID.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Connect to the node's control channel.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to {}", self.node_id);
            return Ok(());
        }

        debug!(
            "Connecting to {} ({}@{}:{})",
            self.node_id, self.options.user, self.host, self.port
        );

        let known_hosts = match self.options.known_hosts {
            KnownHostsPolicy::Strict => KnownHosts::Strict,
            KnownHostsPolicy::Add => KnownHosts::Add,
            KnownHostsPolicy::AcceptAll => KnownHosts::Accept,
        };

        let mut builder = SessionBuilder::default();
        builder
            .known_hosts_check(known_hosts)
            .connect_timeout(self.options.connect_timeout)
            .user(self.options.user.clone())
            .port(self.port);

        let identity_path = shellexpand::tilde(&self.options.identity_file);
        if Path::new(identity_path.as_ref()).exists() {
            builder.keyfile(identity_path.as_ref());
        }

        let session = builder
            .connect(&self.host)
            .await
            .with_context(|| format!("Failed to connect to {}", self.host))?;

        info!("Connected to {} ({})", self.node_id, self.host);
        self.session = Some(session);
        Ok(())
    }

    /// Disconnect from the node.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            debug!("Disconnecting from {}", self.node_id);
            session.close().await?;
        }
        Ok(())
    }

    /// Execute a command on the node.
    pub async fn execute(&self, command: &str) -> Result<CommandResult> {
        let session = self.session.as_ref().context("Not connected to node")?;

        let start = std::time::Instant::now();
        debug!("Executing on {}: {}", self.node_id, command);

        let mut child = session
            .command("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .await
            .with_context(|| format!("Failed to spawn command on {}", self.node_id))?;

        let execution_future = async {
            // Read stdout and stderr concurrently to avoid deadlock if one pipe fills.
            let stdout_handle = child.stdout().take();
            let stderr_handle = child.stderr().take();

            let stdout_fut = async {
                if let Some(out) = stdout_handle {
                    let mut reader = BufReader::new(out);
                    let mut buf = String::new();
                    reader.read_to_string(&mut buf).await?;
                    Ok::<String, anyhow::Error>(buf)
                } else {
                    Ok(String::new())
                }
            };

            let stderr_fut = async {
                if let Some(err) = stderr_handle {
                    let mut reader = BufReader::new(err);
                    let mut buf = String::new();
                    reader.read_to_string(&mut buf).await?;
                    Ok::<String, anyhow::Error>(buf)
                } else {
                    Ok(String::new())
                }
            };

            let (stdout, stderr) = tokio::try_join!(stdout_fut, stderr_fut)?;

            let status = child
                .wait()
                .await
                .with_context(|| "Failed to wait for command completion")?;

            Ok::<_, anyhow::Error>((status, stdout, stderr))
        };

        match tokio::time::timeout(self.options.command_timeout, execution_future).await {
            Ok(result) => {
                let (status, stdout, stderr) = result?;
                let duration = start.elapsed();
                let exit_code = status.code().unwrap_or(-1);

                debug!(
                    "Command completed on {} (exit={}, duration={}ms)",
                    self.node_id,
                    exit_code,
                    duration.as_millis()
                );

                Ok(CommandResult {
                    exit_code,
                    stdout,
                    stderr,
                    duration_ms: duration.as_millis() as u64,
                })
            }
            Err(_) => {
                // Dropping the child terminates the remote process.
                warn!(
                    "Command timed out on {} after {:?}",
                    self.node_id, self.options.command_timeout
                );
                anyhow::bail!("Command timed out after {:?}", self.options.command_timeout);
            }
        }
    }

    /// Write a byte payload to a remote path via piped stdin.
    pub async fn write_remote_file(&self, remote_path: &str, payload: &[u8]) -> Result<()> {
        let session = self.session.as_ref().context("Not connected to node")?;

        debug!(
            "Writing {} bytes to {}:{}",
            payload.len(),
            self.node_id,
            remote_path
        );

        let mut child = session
            .command("sh")
            .arg("-c")
            .arg(format!("cat > {}", remote_path))
            .stdin(Stdio::piped())
            .spawn()
            .await
            .with_context(|| format!("Failed to spawn writer on {}", self.node_id))?;

        let write_future = async {
            let mut stdin = child
                .stdin()
                .take()
                .context("No stdin handle for remote writer")?;
            stdin.write_all(payload).await?;
            stdin.shutdown().await?;
            drop(stdin);

            let status = child.wait().await?;
            anyhow::ensure!(
                status.success(),
                "Remote write exited with {:?}",
                status.code()
            );
            Ok::<_, anyhow::Error>(())
        };

        match tokio::time::timeout(self.options.command_timeout, write_future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Remote write timed out on {} after {:?}",
                    self.node_id, self.options.command_timeout
                );
                anyhow::bail!(
                    "Remote write timed out after {:?}",
                    self.options.command_timeout
                );
            }
        }
    }

    /// Read a remote file back via piped stdout.
    pub async fn read_remote_file(&self, remote_path: &str) -> Result<Vec<u8>> {
        let session = self.session.as_ref().context("Not connected to node")?;

        debug!("Reading {}:{}", self.node_id, remote_path);

        let mut child = session
            .command("sh")
            .arg("-c")
            .arg(format!("cat {}", remote_path))
            .stdout(Stdio::piped())
            .spawn()
            .await
            .with_context(|| format!("Failed to spawn reader on {}", self.node_id))?;

        let read_future = async {
            let mut buf = Vec::new();
            if let Some(mut out) = child.stdout().take() {
                out.read_to_end(&mut buf).await?;
            }
            let status = child.wait().await?;
            anyhow::ensure!(
                status.success(),
                "Remote read exited with {:?}",
                status.code()
            );
            Ok::<_, anyhow::Error>(buf)
        };

        match tokio::time::timeout(self.options.command_timeout, read_future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Remote read timed out on {} after {:?}",
                    self.node_id, self.options.command_timeout
                );
                anyhow::bail!(
                    "Remote read timed out after {:?}",
                    self.options.command_timeout
                );
            }
        }
    }
}
