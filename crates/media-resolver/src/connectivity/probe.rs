use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ConnectivityHub;
use crate::error::ConnectivityError;

/// Configuration for the periodic reachability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Endpoint probed with a HEAD request
    pub url: String,
    /// Time between probes
    pub interval: Duration,
    /// Timeout of a single probe
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: "http://connectivitycheck.gstatic.com/generate_204".to_string(),
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Feeds a [`ConnectivityHub`] from periodic HTTP probes.
///
/// Any HTTP response, whatever its status, means the network is reachable; a
/// transport error or timeout means it is not.
pub struct ConnectivityProbe;

impl ConnectivityProbe {
    pub fn spawn(
        hub: Arc<ConnectivityHub>,
        config: ProbeConfig,
    ) -> Result<ProbeHandle, ConnectivityError> {
        let runtime = Handle::try_current()
            .map_err(|_| ConnectivityError::Probe("no tokio runtime".to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConnectivityError::Probe(e.to_string()))?;

        let token = CancellationToken::new();
        let task = runtime.spawn(run_probe_loop(client, hub, config, token.clone()));
        Ok(ProbeHandle {
            token,
            task: Some(task),
        })
    }
}

async fn run_probe_loop(
    client: Client,
    hub: Arc<ConnectivityHub>,
    config: ProbeConfig,
    token: CancellationToken,
) {
    info!(url = %config.url, interval = ?config.interval, "Connectivity probe started");
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let connected = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            connected = probe_once(&client, &config.url) => connected,
        };
        hub.set_connected(connected);
    }

    debug!(url = %config.url, "Connectivity probe stopped");
}

async fn probe_once(client: &Client, url: &str) -> bool {
    match client.head(url).send().await {
        Ok(response) => {
            debug!(url, status = %response.status(), "Connectivity probe answered");
            true
        }
        Err(e) => {
            debug!(url, error = %e, "Connectivity probe failed");
            false
        }
    }
}

/// Running probe. Dropping the handle stops the probe.
pub struct ProbeHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Stop the probe and wait for its task to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
