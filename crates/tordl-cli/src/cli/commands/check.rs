//! `tordl check` – confirm that traffic leaves through Tor.

use anyhow::{bail, Result};
use std::time::Duration;
use tordl_core::config::TordlConfig;
use tordl_core::control::CancelToken;
use tordl_core::session::{check_tor, SessionProvider, TorProcess, TorSessionProvider};
use tordl_core::EngineConfig;

use super::install_interrupt_handler;

const TOR_START_TIMEOUT: Duration = Duration::from_secs(120);
const CHECK_PAUSE: Duration = Duration::from_secs(5);

/// Launch `tor` when the config names a binary. The process stops when the value drops.
pub(crate) fn start_tor(cfg: &TordlConfig, cancel: &CancelToken) -> Result<Option<TorProcess>> {
    match &cfg.tor_path {
        Some(path) => {
            println!("starting tor on SOCKS port {} ...", cfg.socks_port);
            Ok(Some(TorProcess::spawn(
                path,
                cfg.socks_port,
                TOR_START_TIMEOUT,
                cancel,
            )?))
        }
        None => Ok(None),
    }
}

pub(crate) fn tor_provider(cfg: &TordlConfig) -> TorSessionProvider {
    TorSessionProvider::new(cfg.socks_host.clone(), cfg.socks_port)
}

/// Run the Tor check up to `max_tor_checks` times, each on a fresh circuit.
pub(crate) fn verify_tor(
    cfg: &TordlConfig,
    provider: &TorSessionProvider,
    cancel: &CancelToken,
) -> Result<()> {
    let opts = EngineConfig::from_config(cfg).transport;
    let tries = cfg.max_tor_checks.max(1);
    for attempt in 1..=tries {
        if cancel.is_cancelled() {
            bail!("interrupted during the Tor check");
        }
        let outcome = match provider.get_session() {
            Ok(session) => {
                let r = check_tor(&session, &opts).map_err(anyhow::Error::from);
                provider.release(session);
                r
            }
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(true) => {
                tracing::info!(attempt, "tor check passed");
                return Ok(());
            }
            Ok(false) => tracing::warn!(attempt, "tor check page says traffic is not using Tor"),
            Err(e) => tracing::warn!(attempt, "tor check failed: {:#}", e),
        }
        if attempt < tries && cancel.sleep(CHECK_PAUSE) {
            bail!("interrupted during the Tor check");
        }
    }
    bail!(
        "Tor is not working through {}:{} after {} check(s)",
        cfg.socks_host,
        cfg.socks_port,
        tries
    )
}

pub fn run_check(cfg: &TordlConfig) -> Result<()> {
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);
    let _tor = start_tor(cfg, &cancel)?;
    verify_tor(cfg, &tor_provider(cfg), &cancel)?;
    println!("Tor is working (SOCKS {}:{})", cfg.socks_host, cfg.socks_port);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    /// Config pointing at a local port with nothing listening.
    fn dead_proxy_config(max_tor_checks: u32) -> TordlConfig {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        TordlConfig {
            socks_host: "127.0.0.1".to_string(),
            socks_port: port,
            max_tor_checks,
            ..TordlConfig::default()
        }
    }

    #[test]
    fn interrupt_cuts_the_pause_between_checks() {
        let cfg = dead_proxy_config(5);
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = verify_tor(&cfg, &tor_provider(&cfg), &cancel).unwrap_err();
        assert!(err.to_string().contains("interrupted"), "{err:#}");
        assert!(started.elapsed() < CHECK_PAUSE);
    }

    #[test]
    fn failed_checks_report_the_proxy() {
        let cfg = dead_proxy_config(1);
        let err = verify_tor(&cfg, &tor_provider(&cfg), &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("after 1 check(s)"), "{err:#}");
    }
}
