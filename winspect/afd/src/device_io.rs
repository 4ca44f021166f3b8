//! Device control transport for AFD handles.
//!
//! Everything this crate learns about a socket comes from
//! `NtDeviceIoControlFile` requests issued here. The blocking entry point
//! waits on a private event rather than the target handle, because handles
//! duplicated from other processes frequently lack SYNCHRONIZE access. The
//! overlapped entry point leaves completion to the caller.

use std::ptr;

use winapi::{
    shared::ntdef::{HANDLE, PVOID},
    um::minwinbase::OVERLAPPED,
};

use crate::{
    error::{AfdResult, NtStatus},
    sys,
};

/// Outcome of submitting an overlapped device control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoSubmission {
    /// The request finished inline; the overlapped block already holds the
    /// final status.
    Completed { bytes: u32 },

    /// The request is in flight. Status and byte count arrive through the
    /// caller's overlapped event once the driver completes it.
    Pending,
}

/// Event handle scoped to a single blocking request.
struct OwnedEvent(HANDLE);

impl OwnedEvent {
    fn new() -> AfdResult<Self> {
        let mut event: HANDLE = ptr::null_mut();
        let status = unsafe {
            sys::NtCreateEvent(
                &mut event,
                sys::EVENT_ALL_ACCESS,
                ptr::null_mut(),
                sys::SYNCHRONIZATION_EVENT,
                0,
            )
        };
        NtStatus(status).result()?;
        Ok(Self(event))
    }

    fn get(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedEvent {
    fn drop(&mut self) {
        unsafe {
            sys::NtClose(self.0);
        }
    }
}

/// Issues a device control request and waits for it to finish.
///
/// Returns the number of bytes the driver wrote to `out_buffer`. Submission
/// and wait failures come back verbatim as [`AfdError::Status`]; no retries
/// happen at this layer.
///
/// # Safety
///
/// `socket` must be an open file handle. `in_buffer`/`out_buffer` must be
/// valid for `in_size`/`out_size` bytes (or null with a zero size) for the
/// duration of the call.
///
/// [`AfdError::Status`]: crate::AfdError::Status
pub unsafe fn device_io_control(
    socket: HANDLE,
    control_code: u32,
    in_buffer: PVOID,
    in_size: u32,
    out_buffer: PVOID,
    out_size: u32,
) -> AfdResult<u32> {
    let event = OwnedEvent::new()?;
    let mut io_status = sys::IoStatusBlock {
        status: sys::STATUS_PENDING,
        information: 0,
    };

    let mut status = unsafe {
        sys::NtDeviceIoControlFile(
            socket,
            event.get(),
            ptr::null_mut(),
            ptr::null_mut(),
            &mut io_status,
            control_code,
            in_buffer,
            in_size,
            out_buffer,
            out_size,
        )
    };

    if status == sys::STATUS_PENDING {
        let wait = unsafe { sys::NtWaitForSingleObject(event.get(), 0, ptr::null_mut()) };
        NtStatus(wait).result()?;
        status = io_status.status;
    }

    NtStatus(status).result()?;
    Ok(io_status.information as u32)
}

/// Submits a device control request for asynchronous completion.
///
/// The overlapped block's event is used as the completion signal; its
/// `Internal` field is stamped pending before submission, mirroring what the
/// I/O manager expects. When the driver finishes the request inline, the
/// byte count is returned immediately; otherwise [`IoSubmission::Pending`]
/// hands completion over to the caller's own machinery.
///
/// # Safety
///
/// Same buffer requirements as [`device_io_control`], and `overlapped` must
/// point to a writable [`OVERLAPPED`] that stays alive (together with the
/// buffers) until the request completes.
pub unsafe fn device_io_control_overlapped(
    socket: HANDLE,
    control_code: u32,
    in_buffer: PVOID,
    in_size: u32,
    out_buffer: PVOID,
    out_size: u32,
    overlapped: *mut OVERLAPPED,
) -> AfdResult<IoSubmission> {
    unsafe {
        (*overlapped).Internal = sys::STATUS_PENDING as usize;
    }

    let status = unsafe {
        sys::NtDeviceIoControlFile(
            socket,
            (*overlapped).hEvent,
            ptr::null_mut(),
            overlapped.cast(),
            overlapped.cast::<sys::IoStatusBlock>(),
            control_code,
            in_buffer,
            in_size,
            out_buffer,
            out_size,
        )
    };

    if status == sys::STATUS_PENDING {
        return Ok(IoSubmission::Pending);
    }

    NtStatus(status).result()?;

    let bytes = unsafe { (*overlapped).InternalHigh as u32 };
    Ok(IoSubmission::Completed { bytes })
}
