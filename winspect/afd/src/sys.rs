//! Raw ABI shared with the AFD driver and the NT I/O manager.
//!
//! None of this surface is documented by the platform SDK; the layouts and
//! control codes below follow the driver's long-stable Win32-level contract.
//! Everything except the `ntdll` imports is plain integers and `#[repr(C)]`
//! records, so the decoding layers that consume them build on any host.

use std::fmt::{self, Display};

/// NT object path of the device backing every Winsock socket.
pub const AFD_DEVICE_NAME: &str = r"\Device\Afd";

/// Separator between components of an NT object path.
pub const OBJ_NAME_PATH_SEPARATOR: u8 = b'\\';

// Control codes consumed by this crate. All are
// CTL_CODE(FILE_DEVICE_NETWORK, function, METHOD_NEITHER, FILE_ANY_ACCESS).
pub const IOCTL_AFD_GET_ADDRESS: u32 = 0x0001_202F;
pub const IOCTL_AFD_GET_REMOTE_ADDRESS: u32 = 0x0001_203F;
pub const IOCTL_AFD_GET_CONTEXT: u32 = 0x0001_2043;
pub const IOCTL_AFD_GET_INFORMATION: u32 = 0x0001_207B;

// NTSTATUS values this crate inspects or produces.
pub const STATUS_SUCCESS: i32 = 0;
pub const STATUS_PENDING: i32 = 0x0000_0103;
pub const STATUS_BUFFER_OVERFLOW: i32 = 0x8000_0005_u32 as i32;
pub const STATUS_UNKNOWN_REVISION: i32 = 0xC000_0058_u32 as i32;
pub const STATUS_NOT_SUPPORTED: i32 = 0xC000_00BB_u32 as i32;
pub const STATUS_NOT_SAME_DEVICE: i32 = 0xC000_00D4_u32 as i32;
pub const STATUS_NOT_FOUND: i32 = 0xC000_0225_u32 as i32;

// Address families carried in the leading 16 bits of a sockaddr
// (ws2def.h, ws2bth.h, hvsocket.h).
pub const AF_INET: u16 = 2;
pub const AF_INET6: u16 = 23;
pub const AF_BTH: u16 = 32;
pub const AF_HYPERV: u16 = 34;

// Protocol numbers as they appear in the driver's shared information record.
pub const IPPROTO_ICMP: i32 = 1;
pub const IPPROTO_TCP: i32 = 6;
pub const IPPROTO_UDP: i32 = 17;
pub const IPPROTO_RDP: i32 = 27;
pub const IPPROTO_ICMPV6: i32 = 58;
pub const IPPROTO_SCTP: i32 = 132;
pub const IPPROTO_RAW: i32 = 255;
pub const IPPROTO_RESERVED_IPSEC: i32 = 258;
pub const BTHPROTO_RFCOMM: i32 = 0x0003;
pub const BTHPROTO_L2CAP: i32 = 0x0100;
pub const HV_PROTOCOL_RAW: i32 = 1;

/// `FILE_INFORMATION_CLASS` selector for the backing device name query.
pub const FILE_VOLUME_NAME_INFORMATION: u32 = 58;

// Selectors accepted by [`IOCTL_AFD_GET_INFORMATION`].
pub const AFD_INLINE_MODE: u32 = 1;
pub const AFD_NONBLOCKING_MODE: u32 = 2;
pub const AFD_MAX_SEND_SIZE: u32 = 3;
pub const AFD_SENDS_PENDING: u32 = 4;
pub const AFD_MAX_PATH_SEND_SIZE: u32 = 5;
pub const AFD_RECEIVE_WINDOW_SIZE: u32 = 6;
pub const AFD_SEND_WINDOW_SIZE: u32 = 7;
pub const AFD_CONNECT_TIME: u32 = 8;
pub const AFD_CIRCULAR_QUEUEING: u32 = 9;
pub const AFD_GROUP_ID_AND_TYPE: u32 = 10;

/// Windows GUID, as embedded in Hyper-V socket addresses and the shared
/// information record's provider id.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub fn from_bytes(bytes: &[u8; 16]) -> Self {
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4: [
                bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
                bytes[15],
            ],
        }
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

#[cfg(windows)]
pub(crate) use self::ntdll::*;

// The functions below live in ntdll but are absent from the winapi crate,
// so they are declared by hand, the same way handle-enumeration tools do.
#[cfg(windows)]
#[allow(non_snake_case)]
mod ntdll {
    use winapi::shared::ntdef::{HANDLE, NTSTATUS, PVOID};

    pub(crate) const EVENT_ALL_ACCESS: u32 = 0x001F_0003;
    pub(crate) const SYNCHRONIZATION_EVENT: u32 = 1;

    /// Completion record filled by the I/O manager. The pointer arm of the
    /// status union is never consulted here, so the field is plain NTSTATUS.
    #[repr(C)]
    pub(crate) struct IoStatusBlock {
        pub status: NTSTATUS,
        pub information: usize,
    }

    #[link(name = "ntdll")]
    extern "system" {
        pub(crate) fn NtClose(handle: HANDLE) -> NTSTATUS;

        pub(crate) fn NtCreateEvent(
            event_handle: *mut HANDLE,
            desired_access: u32,
            object_attributes: PVOID,
            event_type: u32,
            initial_state: u8,
        ) -> NTSTATUS;

        pub(crate) fn NtWaitForSingleObject(
            handle: HANDLE,
            alertable: u8,
            timeout: *mut i64,
        ) -> NTSTATUS;

        pub(crate) fn NtDeviceIoControlFile(
            file_handle: HANDLE,
            event: HANDLE,
            apc_routine: PVOID,
            apc_context: PVOID,
            io_status_block: *mut IoStatusBlock,
            io_control_code: u32,
            input_buffer: PVOID,
            input_buffer_length: u32,
            output_buffer: PVOID,
            output_buffer_length: u32,
        ) -> NTSTATUS;

        pub(crate) fn NtQueryInformationFile(
            file_handle: HANDLE,
            io_status_block: *mut IoStatusBlock,
            file_information: PVOID,
            length: u32,
            file_information_class: u32,
        ) -> NTSTATUS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_round_trip() {
        let bytes = [
            0x78, 0x56, 0x34, 0x12, 0xbc, 0x9a, 0xf0, 0xde, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef,
        ];
        let guid = Guid::from_bytes(&bytes);
        assert_eq!(guid.data1, 0x1234_5678);
        assert_eq!(guid.data2, 0x9abc);
        assert_eq!(guid.data3, 0xdef0);
        assert_eq!(guid.to_string(), "12345678-9abc-def0-0123-456789abcdef");
    }
}
