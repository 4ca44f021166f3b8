//! Socket address retrieval and decoding.
//!
//! The driver answers address queries in one of two incompatible layouts
//! and never says which. Modern transports reply with a plain sockaddr
//! ("TLI"); a few legacy ones, Bluetooth among them, wrap the address in a
//! TDI transport-address record whose entries are length-prefixed. The
//! decoder tries both interpretations in order and trusts neither: every
//! embedded length is checked against the buffer capacity before a single
//! byte moves.

#[cfg(windows)]
use std::ptr;
use std::{
    mem,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
};

#[cfg(windows)]
use winapi::shared::ntdef::HANDLE;

#[cfg(windows)]
use crate::device_io::device_io_control;
use crate::{
    error::{AfdError, AfdResult},
    sys::{self, Guid},
};

/// Capacity of the driver's address reply and of the normalized storage,
/// both sized like `SOCKADDR_STORAGE`.
pub const ADDRESS_CAPACITY: usize = 128;

/// Raw reply to `IOCTL_AFD_GET_ADDRESS` / `IOCTL_AFD_GET_REMOTE_ADDRESS`.
pub type RawAddressBuffer = [u8; ADDRESS_CAPACITY];

/// Which end of the connection an address query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Local,
    Remote,
}

// TDI_ADDRESS_INFO layout: ActivityCount (u32), TAAddressCount (i32), then
// the first TA_ADDRESS { AddressLength: u16, AddressType: u16, payload }.
const TDI_ADDRESS_COUNT_OFFSET: usize = 4;
const TDI_ENTRY_LENGTH_OFFSET: usize = 8;
const TDI_ENTRY_TYPE_OFFSET: usize = 10;
// Fixed wrapper bytes preceding the entry payload: header through the type
// field. The declared entry length counts payload bytes only, so it must
// fit in what remains after these.
const TDI_HEADER_SIZE: usize = TDI_ENTRY_TYPE_OFFSET + mem::size_of::<u16>();

/// Normalized, family-tagged socket address.
///
/// Fixed-size storage holding any supported family's sockaddr at offset
/// zero. Produced only by [`SocketAddress::decode`], which guarantees the
/// family tag is one of the supported set.
#[derive(Clone, Copy, Debug)]
pub struct SocketAddress {
    storage: [u8; ADDRESS_CAPACITY],
}

impl SocketAddress {
    /// Decodes a raw driver reply, picking whichever of the two layouts
    /// validates. Ordered, first match wins, and the output is never
    /// partially populated: a buffer that fits neither interpretation is an
    /// [`AfdError::UnknownRevision`], not a guess.
    pub fn decode(raw: &RawAddressBuffer) -> AfdResult<Self> {
        // Most transports reply with the sockaddr itself; the family tag up
        // front is enough to recognize one.
        if is_supported_family(read_u16(raw, 0)) {
            return Ok(Self { storage: *raw });
        }

        // Legacy TDI wrapper. Validate the header and the first entry's
        // declared length before touching the payload; the length field is
        // driver-supplied and must not be able to push the copy out of
        // bounds.
        let activity_count = read_u32(raw, 0);
        let address_count = read_i32(raw, TDI_ADDRESS_COUNT_OFFSET);
        let entry_length = read_u16(raw, TDI_ENTRY_LENGTH_OFFSET) as usize;
        let entry_type = read_u16(raw, TDI_ENTRY_TYPE_OFFSET);

        if activity_count > 0
            && address_count >= 1
            && entry_length <= ADDRESS_CAPACITY - TDI_HEADER_SIZE
            && is_supported_family(entry_type)
        {
            // The declared length counts the bytes after the type field,
            // while the embedded sockaddr starts at the type field itself
            // (it doubles as the address family).
            let embedded_len = entry_length + mem::size_of::<u16>();

            let mut storage = [0u8; ADDRESS_CAPACITY];
            storage[..embedded_len].copy_from_slice(
                &raw[TDI_ENTRY_TYPE_OFFSET..TDI_ENTRY_TYPE_OFFSET + embedded_len],
            );
            return Ok(Self { storage });
        }

        Err(AfdError::UnknownRevision)
    }

    /// Address family tag (the leading 16 bits of any sockaddr).
    pub fn family(&self) -> u16 {
        read_u16(&self.storage, 0)
    }

    /// Raw normalized storage.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_CAPACITY] {
        &self.storage
    }

    /// View as a standard socket address, for the IPv4/IPv6 families.
    pub fn to_inet_addr(&self) -> Option<SocketAddr> {
        let bytes = &self.storage;
        match self.family() {
            // SOCKADDR_IN: family, port (network order), address.
            sys::AF_INET => {
                let port = u16::from_be_bytes([bytes[2], bytes[3]]);
                let ip = Ipv4Addr::new(bytes[4], bytes[5], bytes[6], bytes[7]);
                Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
            }
            // SOCKADDR_IN6: family, port, flow info, address, scope id.
            sys::AF_INET6 => {
                let port = u16::from_be_bytes([bytes[2], bytes[3]]);
                let flowinfo = read_u32(bytes, 4);
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&bytes[8..24]);
                let scope_id = read_u32(bytes, 24);
                Some(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(octets),
                    port,
                    flowinfo,
                    scope_id,
                )))
            }
            _ => None,
        }
    }

    /// Device address and port/channel, for the Bluetooth family. The
    /// device address occupies the low 48 bits, packed big-endian.
    pub fn to_bluetooth_addr(&self) -> Option<(u64, u32)> {
        if self.family() != sys::AF_BTH {
            return None;
        }
        // SOCKADDR_BTH: family, padding, device address at 8, service class
        // GUID at 16, port at 32.
        let device = u64::from_le_bytes([
            self.storage[8],
            self.storage[9],
            self.storage[10],
            self.storage[11],
            self.storage[12],
            self.storage[13],
            self.storage[14],
            self.storage[15],
        ]);
        let port = read_u32(&self.storage, 32);
        Some((device, port))
    }

    /// VM and service identifiers, for the Hyper-V socket family.
    pub fn to_hyperv_addr(&self) -> Option<(Guid, Guid)> {
        if self.family() != sys::AF_HYPERV {
            return None;
        }
        // SOCKADDR_HV: family, reserved, VmId at 4, ServiceId at 20.
        let mut vm_id = [0u8; 16];
        vm_id.copy_from_slice(&self.storage[4..20]);
        let mut service_id = [0u8; 16];
        service_id.copy_from_slice(&self.storage[20..36]);
        Some((Guid::from_bytes(&vm_id), Guid::from_bytes(&service_id)))
    }
}

/// Families the decoder accepts and the formatter can render.
pub(crate) fn is_supported_family(family: u16) -> bool {
    matches!(
        family,
        sys::AF_INET | sys::AF_INET6 | sys::AF_BTH | sys::AF_HYPERV
    )
}

fn read_u16(buffer: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buffer[offset], buffer[offset + 1]])
}

fn read_u32(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buffer[offset],
        buffer[offset + 1],
        buffer[offset + 2],
        buffer[offset + 3],
    ])
}

fn read_i32(buffer: &[u8], offset: usize) -> i32 {
    read_u32(buffer, offset) as i32
}

/// Retrieves and decodes one of the two addresses associated with a socket
/// handle.
#[cfg(windows)]
pub fn query_address(handle: HANDLE, endpoint: Endpoint) -> AfdResult<SocketAddress> {
    let control_code = match endpoint {
        Endpoint::Local => sys::IOCTL_AFD_GET_ADDRESS,
        Endpoint::Remote => sys::IOCTL_AFD_GET_REMOTE_ADDRESS,
    };

    let mut raw: RawAddressBuffer = [0; ADDRESS_CAPACITY];

    unsafe {
        device_io_control(
            handle,
            control_code,
            ptr::null_mut(),
            0,
            raw.as_mut_ptr().cast(),
            ADDRESS_CAPACITY as u32,
        )?;
    }

    SocketAddress::decode(&raw).inspect_err(|_| {
        tracing::debug!(?endpoint, "address buffer does not match a known layout");
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn inet4_raw(ip: [u8; 4], port: u16) -> RawAddressBuffer {
        let mut raw = [0u8; ADDRESS_CAPACITY];
        raw[..2].copy_from_slice(&sys::AF_INET.to_le_bytes());
        raw[2..4].copy_from_slice(&port.to_be_bytes());
        raw[4..8].copy_from_slice(&ip);
        raw
    }

    fn inet6_raw(ip: [u8; 16], port: u16, scope_id: u32) -> RawAddressBuffer {
        let mut raw = [0u8; ADDRESS_CAPACITY];
        raw[..2].copy_from_slice(&sys::AF_INET6.to_le_bytes());
        raw[2..4].copy_from_slice(&port.to_be_bytes());
        raw[8..24].copy_from_slice(&ip);
        raw[24..28].copy_from_slice(&scope_id.to_le_bytes());
        raw
    }

    /// Wraps a TDI reply around an entry with the given declared length,
    /// type and payload (payload = the bytes after the type field).
    fn tdi_raw(
        activity_count: u32,
        address_count: i32,
        entry_length: u16,
        entry_type: u16,
        payload: &[u8],
    ) -> RawAddressBuffer {
        let mut raw = [0u8; ADDRESS_CAPACITY];
        raw[..4].copy_from_slice(&activity_count.to_le_bytes());
        raw[4..8].copy_from_slice(&address_count.to_le_bytes());
        raw[8..10].copy_from_slice(&entry_length.to_le_bytes());
        raw[10..12].copy_from_slice(&entry_type.to_le_bytes());
        raw[12..12 + payload.len()].copy_from_slice(payload);
        raw
    }

    #[test]
    fn direct_ipv4_is_copied_as_is() {
        let raw = inet4_raw([192, 0, 2, 1], 443);
        let address = SocketAddress::decode(&raw).expect("direct layout");

        assert_eq!(address.family(), sys::AF_INET);
        assert_eq!(address.as_bytes(), &raw);
        assert_eq!(
            address.to_inet_addr(),
            Some("192.0.2.1:443".parse().unwrap())
        );
    }

    #[test]
    fn direct_ipv6_keeps_scope_id() {
        let mut ip = [0u8; 16];
        ip[0] = 0xfe;
        ip[1] = 0x80;
        ip[15] = 0x01;
        let raw = inet6_raw(ip, 8080, 3);

        let address = SocketAddress::decode(&raw).expect("direct layout");
        assert_eq!(
            address.to_inet_addr(),
            Some("[fe80::1%3]:8080".parse().unwrap())
        );
    }

    #[test]
    fn tdi_wrapped_bluetooth_lines_up_as_sockaddr() {
        // Payload mirrors SOCKADDR_BTH after its family field: 6 bytes of
        // padding, device address at (storage) offset 8, port at 32.
        let mut payload = [0u8; 34];
        payload[6..14].copy_from_slice(&0x0011_2233_4455_6677_u64.to_le_bytes());
        payload[30..34].copy_from_slice(&5u32.to_le_bytes());

        let raw = tdi_raw(1, 1, payload.len() as u16, sys::AF_BTH, &payload);
        let address = SocketAddress::decode(&raw).expect("legacy layout");

        assert_eq!(address.family(), sys::AF_BTH);
        assert_eq!(
            address.to_bluetooth_addr(),
            Some((0x0011_2233_4455_6677, 5))
        );
    }

    #[test]
    fn tdi_zero_tail_stays_zeroed() {
        // Bytes past the declared entry length must come out zero even when
        // the raw buffer carries junk there.
        let payload = [0xAAu8; 6];
        let mut raw = tdi_raw(1, 1, payload.len() as u16, sys::AF_INET, &payload);
        raw[64] = 0xEE;

        let address = SocketAddress::decode(&raw).expect("legacy layout");
        let bytes = address.as_bytes();
        assert_eq!(bytes[..2], sys::AF_INET.to_le_bytes());
        assert_eq!(bytes[2..8], payload);
        assert!(bytes[8..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn tdi_length_at_capacity_boundary_is_accepted() {
        // Largest declared length that still fits: capacity minus the fixed
        // wrapper bytes.
        let length = (ADDRESS_CAPACITY - TDI_HEADER_SIZE) as u16;
        let payload = vec![0x55u8; length as usize];
        let raw = tdi_raw(1, 1, length, sys::AF_INET, &payload);

        let address = SocketAddress::decode(&raw).expect("fits exactly");
        assert_eq!(address.as_bytes()[2..2 + payload.len()], payload[..]);
    }

    #[rstest]
    #[case((ADDRESS_CAPACITY - TDI_HEADER_SIZE + 1) as u16)]
    #[case(u16::MAX)]
    #[case(0x8000)]
    fn tdi_oversized_length_is_rejected(#[case] length: u16) {
        let mut raw = [0u8; ADDRESS_CAPACITY];
        raw[..4].copy_from_slice(&1u32.to_le_bytes());
        raw[4..8].copy_from_slice(&1i32.to_le_bytes());
        raw[8..10].copy_from_slice(&length.to_le_bytes());
        raw[10..12].copy_from_slice(&sys::AF_BTH.to_le_bytes());

        assert_eq!(
            SocketAddress::decode(&raw).unwrap_err(),
            AfdError::UnknownRevision
        );
    }

    #[rstest]
    #[case(0, 1)] // idle transport address
    #[case(1, 0)] // no embedded entries
    #[case(1, -1)] // negative entry count
    fn tdi_invalid_header_is_rejected(#[case] activity_count: u32, #[case] address_count: i32) {
        let raw = tdi_raw(activity_count, address_count, 6, sys::AF_INET, &[0u8; 6]);
        assert_eq!(
            SocketAddress::decode(&raw).unwrap_err(),
            AfdError::UnknownRevision
        );
    }

    #[test]
    fn tdi_unsupported_embedded_family_is_rejected() {
        // AF_UNIX is real but has no rendering here; the entry must not be
        // accepted just because the wrapper is well-formed.
        let raw = tdi_raw(1, 1, 6, 1, &[0u8; 6]);
        assert_eq!(
            SocketAddress::decode(&raw).unwrap_err(),
            AfdError::UnknownRevision
        );
    }

    #[test]
    fn garbage_is_unknown_revision() {
        let raw = [0xFFu8; ADDRESS_CAPACITY];
        // Family 0xFFFF is unsupported; as TDI the entry count is negative
        // and the declared length cannot fit either.
        assert_eq!(
            SocketAddress::decode(&raw).unwrap_err(),
            AfdError::UnknownRevision
        );

        let raw = [0u8; ADDRESS_CAPACITY];
        // All zeroes: family 0, activity count 0.
        assert_eq!(
            SocketAddress::decode(&raw).unwrap_err(),
            AfdError::UnknownRevision
        );
    }

    #[test]
    fn decode_is_total_over_arbitrary_buffers() {
        // Pseudo-random sweep; decode must never panic and every success
        // must carry a supported family.
        let mut seed = 0x243F_6A88_85A3_08D3_u64;
        for _ in 0..4096 {
            let mut raw = [0u8; ADDRESS_CAPACITY];
            for byte in raw.iter_mut() {
                // xorshift64
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                *byte = seed as u8;
            }

            match SocketAddress::decode(&raw) {
                Ok(address) => assert!(is_supported_family(address.family())),
                Err(err) => assert_eq!(err, AfdError::UnknownRevision),
            }
        }
    }
}
