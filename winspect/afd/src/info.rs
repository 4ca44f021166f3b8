//! Socket information queries: the driver's shared (Win32-level) record and
//! the small selector-based simple information record.

use std::{fmt, mem};

#[cfg(windows)]
use std::ptr;

#[cfg(windows)]
use winapi::shared::ntdef::HANDLE;

#[cfg(windows)]
use crate::device_io::device_io_control;
use crate::{
    error::{AfdError, AfdResult},
    sys::{self, Guid},
};

/// Connection state of a socket, as recorded by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Initializing,
    Open,
    Bound,
    BoundSpecific,
    Connected,
    Closing,
}

impl SocketState {
    /// Maps the record's raw state value; values the driver added after this
    /// crate was written map to `None` rather than an error.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -1 => Some(Self::Initializing),
            0 => Some(Self::Open),
            1 => Some(Self::Bound),
            2 => Some(Self::BoundSpecific),
            3 => Some(Self::Connected),
            4 => Some(Self::Closing),
            _ => None,
        }
    }

    /// Lowercase label used in socket descriptions.
    pub fn label(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Open => "open",
            Self::Bound => "bound",
            Self::BoundSpecific => "bound (specific)",
            Self::Connected => "connected",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `SO_LINGER` pair embedded in the shared information record.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Linger {
    pub on_off: u16,
    pub linger: u16,
}

/// Win32-level snapshot the driver keeps for every socket.
///
/// Only state, family and protocol matter for descriptions; the rest of the
/// record arrives in the same reply and is exposed for callers that want it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct SharedInfo {
    pub state: i32,
    pub address_family: i32,
    pub socket_type: i32,
    pub protocol: i32,
    pub local_address_length: i32,
    pub remote_address_length: i32,
    pub linger: Linger,
    pub send_timeout: u32,
    pub receive_timeout: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub flags: u16,
    pub creation_flags: u32,
    pub catalog_entry_id: u32,
    pub service_flags: u32,
    pub provider_flags: u32,
    pub group_id: u32,
    pub group_type: i32,
    pub group_priority: i32,
    pub last_error: i32,
    pub async_select_window: usize,
    pub async_select_serial_number: u32,
    pub async_select_message: u32,
    pub async_select_event: i32,
    pub disabled_async_select_events: i32,
    pub provider_id: Guid,
}

impl SharedInfo {
    pub fn state(&self) -> Option<SocketState> {
        SocketState::from_raw(self.state)
    }
}

/// Selector record round-tripped through `IOCTL_AFD_GET_INFORMATION`.
///
/// The value arm is a union on the driver side (boolean, ulong or large
/// integer depending on the selector); accessors read the arm the caller
/// expects.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct AfdInformation {
    pub information_type: u32,
    reserved: u32,
    value: u64,
}

impl AfdInformation {
    pub fn new(information_type: u32) -> Self {
        Self {
            information_type,
            ..Self::default()
        }
    }

    pub fn as_boolean(&self) -> bool {
        self.value as u8 != 0
    }

    pub fn as_ulong(&self) -> u32 {
        self.value as u32
    }

    pub fn as_large_integer(&self) -> i64 {
        self.value as i64
    }
}

/// Retrieves the shared information record for a socket handle.
///
/// Old drivers answer this query with a buffer-overflow warning instead of
/// the record; that is not a failure, just an empty record. A nominally
/// successful reply shorter than the record means the context does not hold
/// one.
#[cfg(windows)]
pub fn query_shared_info(handle: HANDLE) -> AfdResult<SharedInfo> {
    let mut info = SharedInfo::default();

    let result = unsafe {
        device_io_control(
            handle,
            sys::IOCTL_AFD_GET_CONTEXT,
            ptr::null_mut(),
            0,
            ptr::addr_of_mut!(info).cast(),
            mem::size_of::<SharedInfo>() as u32,
        )
    };

    finish_shared_info(result, info)
}

/// Status interpretation for [`query_shared_info`], separated from the I/O
/// so the tolerance rules stay visible and testable.
fn finish_shared_info(result: AfdResult<u32>, info: SharedInfo) -> AfdResult<SharedInfo> {
    match result {
        // Backward compatibility: the record used to be larger than what
        // pre-Win10 drivers could return. Treat as a zero-valued record.
        Err(AfdError::Status(status)) if status.0 == sys::STATUS_BUFFER_OVERFLOW => {
            Ok(SharedInfo::default())
        }
        Err(err) => Err(err),
        // The record is produced at the Win32 level, not by the driver
        // itself, so sanity-check the length before trusting the content.
        Ok(bytes) if (bytes as usize) < mem::size_of::<SharedInfo>() => Err(AfdError::NotFound),
        Ok(_) => Ok(info),
    }
}

/// Retrieves one piece of simple information for a socket handle.
///
/// The selector record goes in and comes back through the same control code;
/// the driver's status is returned verbatim. See the `AFD_*` selector
/// constants in [`sys`].
#[cfg(windows)]
pub fn query_simple_info(handle: HANDLE, information_type: u32) -> AfdResult<AfdInformation> {
    let mut information = AfdInformation::new(information_type);

    unsafe {
        device_io_control(
            handle,
            sys::IOCTL_AFD_GET_INFORMATION,
            ptr::addr_of_mut!(information).cast(),
            mem::size_of::<AfdInformation>() as u32,
            ptr::addr_of_mut!(information).cast(),
            mem::size_of::<AfdInformation>() as u32,
        )?;
    }

    Ok(information)
}
