//! Optional local Tor daemon.

use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::control::CancelToken;

/// A `tor` child process listening on a SOCKS port. Killed on drop.
#[derive(Debug)]
pub struct TorProcess {
    child: Child,
    socks_port: u16,
}

impl TorProcess {
    /// Start `tor_path --SocksPort <port>` and wait until the port accepts
    /// connections. Fails if the process exits, `timeout` elapses or `cancel`
    /// fires first; the child is killed in each case.
    pub fn spawn(
        tor_path: &Path,
        socks_port: u16,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let child = Command::new(tor_path)
            .arg("--SocksPort")
            .arg(socks_port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {}", tor_path.display()))?;
        tracing::info!(pid = child.id(), socks_port, "tor launched");

        let mut proc = Self { child, socks_port };
        proc.wait_ready(timeout, cancel)?;
        Ok(proc)
    }

    pub fn socks_port(&self) -> u16 {
        self.socks_port
    }

    fn wait_ready(&mut self, timeout: Duration, cancel: &CancelToken) -> Result<()> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.socks_port));
        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                bail!("interrupted while waiting for tor to start");
            }
            if let Some(status) = self.child.try_wait().context("polling tor process")? {
                bail!("tor exited before opening its SOCKS port ({})", status);
            }
            if TcpStream::connect_timeout(&addr, Duration::from_millis(500)).is_ok() {
                tracing::info!(socks_port = self.socks_port, "tor SOCKS port ready");
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!(
                    "tor did not open SOCKS port {} within {:?}",
                    self.socks_port,
                    timeout
                );
            }
            cancel.sleep(Duration::from_millis(250));
        }
    }
}

impl Drop for TorProcess {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::debug!("killing tor: {}", e);
        }
        let _ = self.child.wait();
        tracing::info!("tor stopped");
    }
}
