//! `winspect-afd` errors.

use std::fmt::{self, Debug, Display};

use thiserror::Error;

use crate::sys;

/// Raw status code returned by the kernel.
///
/// Statuses the taxonomy below does not name pass through inside
/// [`AfdError::Status`] unchanged, so callers can still match on the exact
/// code or log it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NtStatus(pub i32);

impl NtStatus {
    /// Whether the status reports success, including informational codes.
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Whether the status is informational (severity bits `01`).
    pub const fn is_information(self) -> bool {
        (self.0 as u32) >> 30 == 1
    }

    pub(crate) fn result(self) -> AfdResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(AfdError::Status(self))
        }
    }
}

impl Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NTSTATUS {:#010X}", self.0 as u32)
    }
}

impl Debug for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AfdError {
    /// The handle is open on some device other than AFD. A definite negative
    /// classification, not a query failure.
    #[error("handle is not backed by the AFD device")]
    NotSameDevice,

    /// The driver reported success but returned less data than the record
    /// requires.
    #[error("socket information is missing or truncated")]
    NotFound,

    /// The address buffer matches neither the direct sockaddr layout nor the
    /// legacy transport wrapper.
    #[error("unrecognized address buffer layout")]
    UnknownRevision,

    /// The address family has no textual rendering.
    #[error("no text form for address family {0}")]
    NotSupported(u16),

    /// Any other status from the driver or the I/O manager, unchanged.
    #[error("device control failed: {0}")]
    Status(NtStatus),
}

pub type AfdResult<T> = Result<T, AfdError>;

impl AfdError {
    /// The kernel status equivalent of this error.
    pub fn as_status(&self) -> NtStatus {
        match self {
            AfdError::NotSameDevice => NtStatus(sys::STATUS_NOT_SAME_DEVICE),
            AfdError::NotFound => NtStatus(sys::STATUS_NOT_FOUND),
            AfdError::UnknownRevision => NtStatus(sys::STATUS_UNKNOWN_REVISION),
            AfdError::NotSupported(_) => NtStatus(sys::STATUS_NOT_SUPPORTED),
            AfdError::Status(status) => *status,
        }
    }
}
