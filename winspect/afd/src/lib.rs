//! Read-only introspection of AFD socket handles.
//!
//! Every Winsock socket is a file handle opened on the Ancillary Function
//! Driver (`\Device\Afd`). The user-mode socket API refuses to work with
//! handles duplicated out of other processes, but the driver itself does
//! not care who asks: this crate classifies arbitrary file handles, pulls
//! the driver's shared state/protocol record and both endpoint addresses,
//! and renders them as one-line diagnostics such as
//! `AFD socket: connected TCP on 10.0.0.5:1234 --> 93.184.216.34:80`.
//!
//! Nothing here creates, binds or mutates sockets; all queries are
//! read-only against handles the caller owns.
//!
//! The address/format layers are plain byte manipulation and build on any
//! host; the transport and the handle-backed queries exist only on
//! Windows.

mod address;
mod classify;
#[cfg(windows)]
mod device_io;
mod error;
mod format;
mod info;
pub mod sys;

#[cfg(windows)]
pub use address::query_address;
pub use address::{Endpoint, RawAddressBuffer, SocketAddress, ADDRESS_CAPACITY};
#[cfg(windows)]
pub use classify::is_afd_socket_handle;
pub use classify::is_afd_socket_name;
#[cfg(windows)]
pub use device_io::{device_io_control, device_io_control_overlapped, IoSubmission};
pub use error::{AfdError, AfdResult, NtStatus};
#[cfg(windows)]
pub use format::{format_socket_name, query_format_address};
pub use format::{format_address, protocol_name};
#[cfg(windows)]
pub use info::{query_shared_info, query_simple_info};
pub use info::{AfdInformation, Linger, SharedInfo, SocketState};
