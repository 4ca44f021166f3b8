//! Text rendering for addresses, protocols and whole sockets.

#[cfg(windows)]
use winapi::shared::ntdef::HANDLE;

#[cfg(windows)]
use crate::address::{query_address, Endpoint};
use crate::{
    address::SocketAddress,
    error::{AfdError, AfdResult},
    info::SharedInfo,
    sys,
};
#[cfg(windows)]
use crate::info::query_shared_info;

const AF_INET: i32 = sys::AF_INET as i32;
const AF_INET6: i32 = sys::AF_INET6 as i32;
const AF_BTH: i32 = sys::AF_BTH as i32;
const AF_HYPERV: i32 = sys::AF_HYPERV as i32;

/// Renders a normalized address as text.
///
/// IPv4/IPv6 come out in the canonical `a.b.c.d:port` / `[v6%scope]:port`
/// forms, Bluetooth as colon-separated hex byte pairs with the channel,
/// Hyper-V as a braced `{VmId}:{ServiceId}` GUID pair. Families outside the
/// supported set fail with [`AfdError::NotSupported`].
pub fn format_address(address: &SocketAddress) -> AfdResult<String> {
    if let Some(inet) = address.to_inet_addr() {
        return Ok(inet.to_string());
    }

    if let Some((device, port)) = address.to_bluetooth_addr() {
        // Six device address bytes, packed big-endian in the low 48 bits.
        return Ok(format!(
            "({:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}):{}",
            (device >> 40) as u8,
            (device >> 32) as u8,
            (device >> 24) as u8,
            (device >> 16) as u8,
            (device >> 8) as u8,
            device as u8,
            port,
        ));
    }

    if let Some((vm_id, service_id)) = address.to_hyperv_addr() {
        return Ok(format!("{{{vm_id}}}:{{{service_id}}}"));
    }

    Err(AfdError::NotSupported(address.family()))
}

/// Human-readable name for a known (family, protocol) pair.
///
/// Pure lookup; pairs outside the table come back as a fixed fallback
/// label, never an error. Protocol numbers are only meaningful within their
/// family, so there is no cross-family fallback either: Bluetooth's RFCOMM
/// number under AF_INET is just an unrecognized protocol.
pub fn protocol_name(address_family: i32, protocol: i32) -> &'static str {
    match (address_family, protocol) {
        (AF_INET, sys::IPPROTO_ICMP) => "ICMP",
        (AF_INET, sys::IPPROTO_TCP) => "TCP",
        (AF_INET, sys::IPPROTO_UDP) => "UDP",
        (AF_INET, sys::IPPROTO_RDP) => "RDP",
        (AF_INET, sys::IPPROTO_SCTP) => "SCTP",
        (AF_INET, sys::IPPROTO_RESERVED_IPSEC) => "IPSec",
        (AF_INET, sys::IPPROTO_RAW) => "RAW/IPv4",
        (AF_INET6, sys::IPPROTO_ICMPV6) => "ICMP6",
        (AF_INET6, sys::IPPROTO_TCP) => "TCP6",
        (AF_INET6, sys::IPPROTO_UDP) => "UDP6",
        (AF_INET6, sys::IPPROTO_RDP) => "RDP6",
        (AF_INET6, sys::IPPROTO_SCTP) => "SCTP6",
        (AF_INET6, sys::IPPROTO_RESERVED_IPSEC) => "IPSec6",
        (AF_INET6, sys::IPPROTO_RAW) => "RAW/IPv6",
        (AF_BTH, sys::BTHPROTO_RFCOMM) => "RFCOMM [Bluetooth]",
        (AF_BTH, sys::BTHPROTO_L2CAP) => "L2CAP [Bluetooth]",
        (AF_HYPERV, sys::HV_PROTOCOL_RAW) => "Hyper-V RAW",
        _ => "unrecognized protocol",
    }
}

/// Retrieves one of a socket's addresses and renders it as text.
#[cfg(windows)]
pub fn query_format_address(handle: HANDLE, endpoint: Endpoint) -> AfdResult<String> {
    let address = query_address(handle, endpoint)?;
    format_address(&address)
}

/// Builds the best available one-line description of a socket handle.
///
/// Best effort by design: shared information and the local address are
/// queried independently and whichever is available ends up in the text; a
/// failing remote address query is silently omitted. Only when neither
/// source yields anything is there no description at all.
#[cfg(windows)]
pub fn format_socket_name(handle: HANDLE) -> Option<String> {
    let shared_info = query_shared_info(handle)
        .inspect_err(|err| tracing::trace!(status = %err.as_status(), "no shared info for socket"))
        .ok();
    let local_address = query_format_address(handle, Endpoint::Local).ok();

    compose_description(shared_info.as_ref(), local_address.as_deref(), || {
        query_format_address(handle, Endpoint::Remote).ok()
    })
}

/// Pure composition behind [`format_socket_name`]: state and protocol from
/// the shared record, `on <local>`, ` --> <remote>`.
fn compose_description(
    shared_info: Option<&SharedInfo>,
    local_address: Option<&str>,
    remote_address: impl FnOnce() -> Option<String>,
) -> Option<String> {
    if shared_info.is_none() && local_address.is_none() {
        return None;
    }

    let mut description = String::with_capacity(0x100);
    description.push_str("AFD socket: ");

    if let Some(info) = shared_info {
        // Unrecognized state values contribute no label; they are not an
        // error.
        if let Some(state) = info.state() {
            description.push_str(state.label());
            description.push(' ');
        }

        description.push_str(protocol_name(info.address_family, info.protocol));
        description.push(' ');
    }

    if let Some(local) = local_address {
        description.push_str("on ");
        description.push_str(local);

        if let Some(remote) = remote_address() {
            description.push_str(" --> ");
            description.push_str(&remote);
        }
    }

    Some(description)
}
