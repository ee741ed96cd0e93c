use std::collections::HashMap;
use std::future::Future;
use std::net::Ipv4Addr;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::constants::ROUTE_METRIC_FORWARDED_IP;
use crate::error::Error;
pub use crate::parse::HwAddr;

pub mod gcp;

/// Local interfaces keyed by hardware address.
pub type ConfigMap = HashMap<HwAddr, InterfaceConfig>;

/// A cloud metadata provider.
pub trait Provider {
    fn name(&self) -> &'static str;

    /// Environment variable that must be set to a true value for the
    /// provider to be considered.
    fn env_enabled(&self) -> &'static str;

    /// Checks that the provider's metadata service is reachable.
    fn detect(&self, cancel: &CancellationToken) -> impl Future<Output = Result<(), Error>> + Send;

    /// Resolves the job into the configuration of every local interface.
    fn get_config(
        &self,
        job: RetrievalJob,
    ) -> impl Future<Output = Result<ConfigMap, Error>> + Send;
}

/// One invocation of configuration retrieval.
#[derive(Debug)]
pub struct RetrievalJob {
    pub cancel: CancellationToken,
    pub interfaces: ConfigMap,
}

impl RetrievalJob {
    pub fn new(interfaces: ConfigMap, cancel: CancellationToken) -> Self {
        Self { cancel, interfaces }
    }
}

/// Desired configuration of one local interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfaceConfig {
    pub hwaddr: HwAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifname: Option<String>,
    /// Index of the matching interface in the provider's metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iface_idx: Option<u64>,
    pub routes: Vec<RouteDescriptor>,
}

impl InterfaceConfig {
    pub fn new(hwaddr: HwAddr, ifname: Option<String>) -> Self {
        Self {
            hwaddr,
            ifname,
            iface_idx: None,
            routes: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteType {
    Local,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteDescriptor {
    pub destination: Ipv4Addr,
    pub prefix_len: u8,
    #[serde(rename = "type")]
    pub route_type: RouteType,
    pub metric: u32,
}

impl RouteDescriptor {
    /// A host route of type local, as installed for a forwarded IP.
    pub fn forwarded_ip(destination: Ipv4Addr) -> Self {
        Self {
            destination,
            prefix_len: 32,
            route_type: RouteType::Local,
            metric: ROUTE_METRIC_FORWARDED_IP,
        }
    }
}

impl std::fmt::Display for RouteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} type local metric {}",
            self.destination, self.prefix_len, self.metric
        )
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_route_descriptor_forwarded_ip() {
        let route = RouteDescriptor::forwarded_ip(Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(32, route.prefix_len);
        assert_eq!(RouteType::Local, route.route_type);
        assert_eq!(100, route.metric);
        assert_eq!("10.0.0.5/32 type local metric 100", route.to_string());
    }

    #[test]
    fn test_interface_config_serialization() {
        let mut config = InterfaceConfig::new(
            HwAddr::new([0x42, 0x01, 0x0a, 0x80, 0x00, 0x02]),
            Some("eth0".into()),
        );
        assert_eq!(
            json!({"hwaddr": "42:01:0a:80:00:02", "ifname": "eth0", "routes": []}),
            serde_json::to_value(&config).unwrap()
        );

        config.iface_idx = Some(0);
        config
            .routes
            .push(RouteDescriptor::forwarded_ip(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(
            json!({
                "hwaddr": "42:01:0a:80:00:02",
                "ifname": "eth0",
                "iface-idx": 0,
                "routes": [
                    {"destination": "10.0.0.5", "prefix-len": 32, "type": "local", "metric": 100}
                ]
            }),
            serde_json::to_value(&config).unwrap()
        );
    }
}
