use anyhow::{Result, anyhow};
use futures::StreamExt;
use log::debug;
use netlink_packet_route::link::{InfoKind, LinkAttribute, LinkFlags, LinkInfo, LinkMessage};
use rtnetlink::{Handle as NlHandle, new_connection};
use tokio::runtime::Handle as RtHandle;

use crate::provider::{ConfigMap, HwAddr, InterfaceConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InterfaceInfo {
    name: String,
    mac: Option<[u8; 6]>,
    is_virtual: bool,
    is_loopback: bool,
}

pub(crate) struct NetlinkConnection {
    handle: NlHandle,
}

impl NetlinkConnection {
    pub(crate) fn new() -> Result<Self> {
        let rt = RtHandle::try_current().map_err(|_| anyhow!("tokio is not running"))?;
        let (connection, handle, _) =
            new_connection().map_err(|e| anyhow!("unable to create netlink socket: {}", e))?;
        rt.spawn(connection);
        Ok(Self { handle })
    }

    pub(crate) async fn get_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        let mut interfaces = Vec::new();
        let mut links = self.handle.link().get().execute();
        while let Some(link_res) = links.next().await {
            let link = link_res?;
            interfaces.push(extract_interface(&link));
        }
        Ok(interfaces)
    }
}

/// Builds the map of local interfaces that metadata interfaces are matched
/// against. When `allowed` is non-empty only those hardware addresses are
/// kept.
pub async fn local_interfaces(allowed: &[HwAddr]) -> Result<ConfigMap> {
    let nl = NetlinkConnection::new()?;
    let interfaces = nl.get_interfaces().await?;
    Ok(build_config_map(interfaces, allowed))
}

pub(crate) fn build_config_map(interfaces: Vec<InterfaceInfo>, allowed: &[HwAddr]) -> ConfigMap {
    let mut map = ConfigMap::new();
    for interface in interfaces {
        let Some(mac) = interface.mac else {
            debug!("Skipping interface {} without hwaddr", interface.name);
            continue;
        };
        if interface.is_loopback || interface.is_virtual {
            debug!("Skipping interface {}", interface.name);
            continue;
        }
        let hwaddr = HwAddr::new(mac);
        if !allowed.is_empty() && !allowed.contains(&hwaddr) {
            debug!("Skipping interface {} not in allowed hwaddrs", interface.name);
            continue;
        }
        map.entry(hwaddr)
            .or_insert_with(|| InterfaceConfig::new(hwaddr, Some(interface.name)));
    }
    map
}

fn extract_interface(link: &LinkMessage) -> InterfaceInfo {
    let mut name: String = "".into();
    let mut mac = None;
    let mut is_virtual = false;
    let is_loopback = link.header.flags.contains(LinkFlags::Loopback);

    for nla in &link.attributes {
        match nla {
            LinkAttribute::IfName(n) => name = n.clone(),
            LinkAttribute::Address(addr) if addr.len() == 6 => {
                let mut mac_arr = [0u8; 6];
                mac_arr.copy_from_slice(&addr[..6]);
                mac = Some(mac_arr);
            }
            LinkAttribute::LinkInfo(infos) => {
                if let Some(kind) = infos.iter().find_map(|link_info| {
                    if let LinkInfo::Kind(k) = link_info {
                        Some(k)
                    } else {
                        None
                    }
                }) {
                    is_virtual = is_virtual_kind(kind);
                }
            }
            _ => {}
        }
    }

    InterfaceInfo {
        name,
        mac,
        is_virtual,
        is_loopback,
    }
}

fn is_virtual_kind(kind: &InfoKind) -> bool {
    matches!(
        kind,
        InfoKind::Veth
            | InfoKind::Vlan
            | InfoKind::Bridge
            | InfoKind::Dummy
            | InfoKind::IpVlan
            | InfoKind::MacVlan
            | InfoKind::MacVtap
            | InfoKind::GreTap
            | InfoKind::Vxlan
            | InfoKind::Wireguard
            | InfoKind::Other(_)
    )
}
