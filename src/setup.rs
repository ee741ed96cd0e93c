use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::constants;
use crate::error::Error;
use crate::http::{HttpPollClient, PollClient};
use crate::logger::init_logger;
use crate::network::local_interfaces;
use crate::provider::gcp::GcpProvider;
use crate::provider::{ConfigMap, InterfaceConfig, Provider, RetrievalJob};

/// Runs one detect and get-config cycle and prints the resulting interface
/// configuration as JSON on stdout. The first argument, if any, is the
/// path of the configuration file.
pub fn run(args: &[String]) -> Result<()> {
    let config_path = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(constants::FILE_CONFIG));
    let config = Config::load(&config_path)?;

    init_logger(config.log_level).map_err(|e| anyhow!("unable to initialize logger: {}", e))?;
    debug!("Configuration: {:?}", config);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("unable to start tokio runtime")?;

    let cancel = CancellationToken::new();
    watch_signals(cancel.clone())?;

    let provider =
        GcpProvider::new(HttpPollClient::new()?)?.with_base_url(&config.metadata_url);
    if !config.enabled {
        info!(
            "{} provider is disabled, set {} to enable it",
            provider.name(),
            provider.env_enabled()
        );
        return Ok(());
    }

    let Some(result) = rt.block_on(retrieve(&provider, &config, cancel))? else {
        return Ok(());
    };
    let output = serde_json::to_string_pretty(&sorted(&result))
        .map_err(|e| anyhow!("unable to convert configuration to string: {}", e))?;
    println!("{}", output);
    Ok(())
}

/// Returns `None` when the provider's metadata service is not available.
async fn retrieve<C: PollClient>(
    provider: &GcpProvider<C>,
    config: &Config,
    cancel: CancellationToken,
) -> Result<Option<ConfigMap>> {
    match provider.detect(&cancel).await {
        Ok(()) => info!("{} provider detected", provider.name()),
        Err(Error::Cancelled) => return Err(anyhow!("detection of {} cancelled", provider.name())),
        Err(e) => {
            info!("{} provider not detected: {}", provider.name(), e);
            return Ok(None);
        }
    }

    let interfaces = local_interfaces(&config.hwaddrs)
        .await
        .context("unable to enumerate local interfaces")?;
    info!("Found {} candidate local interfaces", interfaces.len());

    let job = RetrievalJob::new(interfaces, cancel);
    let result = provider
        .get_config(job)
        .await
        .map_err(|e| anyhow!("unable to get {} configuration: {}", provider.name(), e))?;
    for iface in result.values() {
        for route in &iface.routes {
            info!("Interface {}: route {}", display_name(iface), route);
        }
    }
    Ok(Some(result))
}

fn display_name(iface: &InterfaceConfig) -> String {
    iface
        .ifname
        .clone()
        .unwrap_or_else(|| iface.hwaddr.to_string())
}

fn sorted(result: &ConfigMap) -> Vec<&InterfaceConfig> {
    let mut configs: Vec<&InterfaceConfig> = result.values().collect();
    configs.sort_by_key(|c| c.hwaddr);
    configs
}

// Cancel the running job on SIGINT or SIGTERM.
fn watch_signals(cancel: CancellationToken) -> Result<()> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("unable to register signal handlers")?;
    thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!("Received signal {}, cancelling", signal);
            cancel.cancel();
        }
    });
    Ok(())
}
