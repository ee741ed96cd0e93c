//! Google Compute Engine metadata provider.
//!
//! Forwarded IPs are discovered by walking
//! `network-interfaces/` -> `{idx}/mac` + `{idx}/forwarded-ips/` ->
//! `{idx}/forwarded-ips/{fip}`. Each level fans out one request per entry
//! and fans back in before its parent completes. Each forwarded IP that
//! validates becomes a local host route on the interface whose hardware
//! address matches.

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::constants::{
    GCP_METADATA_HEADER, GCP_METADATA_PATH_ID, GCP_METADATA_PATH_NET, GCP_METADATA_URL_BASE,
};
use crate::error::Error;
use crate::fanin::fan_out;
use crate::http::{PollClient, PollRequest};
use crate::parse::{parse_hwaddr, parse_index_list, parse_interface_list, parse_ipv4};
use crate::provider::{ConfigMap, HwAddr, Provider, RetrievalJob, RouteDescriptor};

#[derive(Debug)]
pub struct GcpProvider<C> {
    client: C,
    base_url: String,
}

/// Routes found for one metadata interface.
#[derive(Debug)]
struct InterfaceRoutes {
    hwaddr: HwAddr,
    iface_idx: u64,
    routes: Vec<RouteDescriptor>,
}

impl<C: PollClient> GcpProvider<C> {
    /// Wraps `client`, which from now on sends the metadata flavor header
    /// with every request.
    pub fn new(mut client: C) -> Result<Self, Error> {
        client.add_header(GCP_METADATA_HEADER).map_err(|e| match e {
            Error::Setup(_) => e,
            other => Error::Setup(other.to_string()),
        })?;
        Ok(Self {
            client,
            base_url: GCP_METADATA_URL_BASE.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').into();
        self
    }

    fn uri(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn interface_uri(&self, path: &str) -> String {
        format!("{}/{}{}", self.base_url, GCP_METADATA_PATH_NET, path)
    }

    async fn fetch(
        &self,
        url: &str,
        what: &'static str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, Error> {
        let response = self
            .client
            .poll_get(&PollRequest::config(url), cancel)
            .await?;
        if !response.success {
            return Err(Error::ServerResponse(what));
        }
        Ok(response.body)
    }

    async fn retrieve(
        &self,
        known: &ConfigMap,
        cancel: &CancellationToken,
    ) -> Result<Vec<InterfaceRoutes>, Error> {
        let body = self
            .fetch(&self.interface_uri(""), "interface list", cancel)
            .await?;
        let indices = parse_interface_list(&body);
        info!("Found GCP interfaces: {}", indices.len());
        if indices.is_empty() {
            return Err(Error::Empty("no GCP interfaces found"));
        }

        let gate = fan_out(indices, move |iface_idx| {
            self.interface(iface_idx, known, cancel)
        })
        .await;
        gate.finish(Error::Empty("no GCP interfaces found"))
    }

    async fn interface(
        &self,
        iface_idx: u64,
        known: &ConfigMap,
        cancel: &CancellationToken,
    ) -> Result<InterfaceRoutes, Error> {
        debug!("GCP interface[{}]: retrieving configuration", iface_idx);
        let body = self
            .fetch(
                &self.interface_uri(&format!("{}/mac", iface_idx)),
                "interface hwaddr",
                cancel,
            )
            .await?;
        let hwaddr = parse_hwaddr(&body)?;
        if !known.contains_key(&hwaddr) {
            info!("GCP interface[{}]: did not find a matching device", iface_idx);
            return Err(Error::NoMatch(iface_idx));
        }
        info!(
            "GCP interface[{}]: found a matching device with hwaddr {}",
            iface_idx, hwaddr
        );

        let body = self
            .fetch(
                &self.interface_uri(&format!("{}/forwarded-ips/", iface_idx)),
                "forwarded ips list",
                cancel,
            )
            .await?;
        let fips = parse_index_list(&body);
        info!(
            "GCP interface[{}]: found {} forwarded ips",
            iface_idx,
            fips.len()
        );
        if fips.is_empty() {
            return Err(Error::Empty("found no forwarded ip"));
        }

        let gate = fan_out(fips, move |fip_idx| {
            self.forwarded_ip(iface_idx, fip_idx, cancel)
        })
        .await;
        let routes = gate.finish(Error::Empty("found no forwarded ip"))?;
        Ok(InterfaceRoutes {
            hwaddr,
            iface_idx,
            routes,
        })
    }

    async fn forwarded_ip(
        &self,
        iface_idx: u64,
        fip_idx: u64,
        cancel: &CancellationToken,
    ) -> Result<RouteDescriptor, Error> {
        let body = self
            .fetch(
                &self.interface_uri(&format!("{}/forwarded-ips/{}", iface_idx, fip_idx)),
                "forwarded ip",
                cancel,
            )
            .await?;
        let address = parse_ipv4(&body)?;
        // A reply that lands after cancellation must not count as a success.
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        info!(
            "GCP interface[{}]: adding forwarded-ip {}",
            iface_idx, address
        );
        Ok(RouteDescriptor::forwarded_ip(address))
    }
}

impl<C: PollClient> Provider for GcpProvider<C> {
    fn name(&self) -> &'static str {
        "GCP"
    }

    fn env_enabled(&self) -> &'static str {
        crate::constants::ENV_GCP_ENABLED
    }

    async fn detect(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let url = self.uri(GCP_METADATA_PATH_ID);
        match self.client.poll_get(&PollRequest::detect(&url), cancel).await {
            Ok(response) if response.success => Ok(()),
            Ok(_) => Err(Error::Detect("unsuccessful server response".into())),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(Error::Transport(msg)) => Err(Error::Detect(msg)),
            Err(e) => Err(Error::Detect(e.to_string())),
        }
    }

    async fn get_config(&self, job: RetrievalJob) -> Result<ConfigMap, Error> {
        let RetrievalJob {
            cancel,
            mut interfaces,
        } = job;

        let found = self.retrieve(&interfaces, &cancel).await;
        let found = if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            found
        };

        match found {
            Ok(found) => {
                for iface in found {
                    if let Some(config) = interfaces.get_mut(&iface.hwaddr) {
                        config.iface_idx = Some(iface.iface_idx);
                        config.routes.extend(iface.routes);
                    }
                }
                debug!("get-config: success");
                Ok(interfaces)
            }
            Err(e) => {
                if e.is_cancelled() {
                    debug!("get-config: cancelled");
                } else {
                    debug!("get-config: failed: {}", e);
                }
                Err(e)
            }
        }
    }
}
