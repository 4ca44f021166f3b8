//! Tells AFD socket handles apart from every other kind of file handle.
//!
//! Two independent checks: one over an already-resolved object name, one
//! that asks the handle itself which device backs it. Callers that already
//! paid for a name query use the first; the second works on anonymous
//! handles.

#[cfg(windows)]
use std::{mem, ptr};

#[cfg(windows)]
use winapi::shared::ntdef::HANDLE;

use crate::sys;
#[cfg(windows)]
use crate::{
    error::{AfdError, AfdResult, NtStatus},
    sys::IoStatusBlock,
};

/// Checks whether a resolved kernel object name denotes an AFD socket.
///
/// True iff the name starts with `\Device\Afd` (case-insensitively) and the
/// prefix is either the whole name or immediately followed by a path
/// separator. The separator requirement keeps longer device names such as
/// `\Device\AfdX` from matching.
pub fn is_afd_socket_name(object_name: &str) -> bool {
    let prefix_len = sys::AFD_DEVICE_NAME.len();

    let Some(head) = object_name.get(..prefix_len) else {
        return false;
    };

    head.eq_ignore_ascii_case(sys::AFD_DEVICE_NAME)
        && (object_name.len() == prefix_len
            || object_name.as_bytes()[prefix_len] == sys::OBJ_NAME_PATH_SEPARATOR)
}

/// Checks whether a file handle is backed by the AFD device, regardless of
/// how (or whether) the object is named.
///
/// Returns `Ok(())` for AFD sockets and [`AfdError::NotSameDevice`] when the
/// backing device is confirmed to be something else; every other query
/// failure propagates verbatim, so callers can tell "definitely not a
/// socket" from "could not ask".
#[cfg(windows)]
pub fn is_afd_socket_handle(handle: HANDLE) -> AfdResult<()> {
    const NAME_CHARS: usize = sys::AFD_DEVICE_NAME.len();

    /// `FILE_VOLUME_NAME_INFORMATION`, with storage for a name no longer
    /// than the AFD device path.
    #[repr(C)]
    struct VolumeName {
        device_name_length: u32,
        device_name: [u16; NAME_CHARS],
    }

    let mut buffer = VolumeName {
        device_name_length: 0,
        device_name: [0; NAME_CHARS],
    };
    let mut io_status = IoStatusBlock {
        status: sys::STATUS_PENDING,
        information: 0,
    };

    let status = unsafe {
        sys::NtQueryInformationFile(
            handle,
            &mut io_status,
            ptr::addr_of_mut!(buffer).cast(),
            mem::size_of::<VolumeName>() as u32,
            sys::FILE_VOLUME_NAME_INFORMATION,
        )
    };

    // A name that does not fit next to the bounded buffer cannot be
    // `\Device\Afd` in the first place.
    if status == sys::STATUS_BUFFER_OVERFLOW {
        return Err(AfdError::NotSameDevice);
    }

    NtStatus(status).result()?;

    let copied = (buffer.device_name_length as usize / mem::size_of::<u16>()).min(NAME_CHARS);
    let device_name = &buffer.device_name[..copied];

    if str_win::u16_buffer_eq_ignore_ascii_case(device_name, sys::AFD_DEVICE_NAME) {
        Ok(())
    } else {
        tracing::trace!(
            device = %str_win::u16_buffer_to_string(device_name),
            "handle is backed by a different device"
        );
        Err(AfdError::NotSameDevice)
    }
}
