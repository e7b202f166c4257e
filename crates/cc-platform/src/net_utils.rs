use anyhow::{Context, Result};
use cc_core::config::AUTO_ADDRESS;
use local_ip_address::list_afinet_netifas;
use std::net::{IpAddr, Ipv4Addr};
use tracing::{info, warn};

/// Detect the best physical LAN IPv4 address to announce and listen on.
///
/// 检测最佳的物理局域网 IPv4 地址。
///
/// # Filtering rules / 过滤规则
/// - Exclude loopback (127.*)
/// - Exclude link-local (169.254.*)
/// - Exclude tunnel interfaces (utun, tun, tap)
/// - Only keep private IPv4 addresses (10.*, 172.16-31.*, 192.168.*)
pub fn get_physical_lan_ip() -> Option<Ipv4Addr> {
    let interfaces = match list_afinet_netifas() {
        Ok(ifaces) => ifaces,
        Err(e) => {
            warn!(error = %e, "failed to enumerate network interfaces");
            return None;
        }
    };

    for (iface_name, ip) in interfaces {
        if let IpAddr::V4(v4) = ip {
            if v4.is_loopback() || v4.is_link_local() {
                continue;
            }

            if is_tunnel_interface(&iface_name) {
                continue;
            }

            if is_private_ipv4(v4) {
                info!(ip = %v4, interface = %iface_name, "detected physical LAN IP");
                return Some(v4);
            }
        }
    }

    warn!("no suitable physical LAN IP found");
    None
}

/// Turn the configured bind address into an IP.
///
/// `"auto"` picks the LAN address, falling back to whatever the OS reports
/// as the local IP, and finally to all interfaces.
pub fn resolve_bind_address(address: &str) -> Result<IpAddr> {
    if address.eq_ignore_ascii_case(AUTO_ADDRESS) {
        if let Some(v4) = get_physical_lan_ip() {
            return Ok(IpAddr::V4(v4));
        }
        return Ok(local_ip_address::local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
    }

    address
        .trim()
        .parse()
        .with_context(|| format!("invalid server address: {address}"))
}

fn is_tunnel_interface(name: &str) -> bool {
    name.contains("utun") || name.contains("tun") || name.contains("tap")
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    match octets[0] {
        10 => true,
        172 => (16..=31).contains(&octets[1]),
        192 => octets[1] == 168,
        _ => false,
    }
}
