//! # vpn-preload
//!
//! LD_PRELOAD library that redirects socket operations to a VPN endpoint.
//!
//! `connect`, `close`, `read`, `recv`, `send` and `write` are interposed.
//! Each call is either passed to the original libc entry point or forwarded
//! over the RPC channel of the endpoint serving the destination. Remote
//! sockets are handed back to the application as virtual descriptors that
//! start above the process's open-files hard limit, so they can never collide
//! with a descriptor the kernel assigns.

// Allow unsafe FFI functions without safety docs - these are inherently unsafe C ABI
#![allow(clippy::missing_safety_doc)]

pub mod dispatch;
pub mod error;
pub mod fd_table;
pub mod policy;
pub mod reals;
pub mod registry;
pub mod rpc;
mod state;

#[cfg(target_os = "linux")]
mod raw;

#[cfg(all(target_os = "linux", not(test)))]
pub mod interpose;

pub use dispatch::Interceptor;
pub use error::{InitError, TableError, TransportError};
pub use fd_table::VirtualFdTable;
pub use policy::{ConfiguredPolicy, Destination, Locality, RemotePolicy};
pub use reals::{LibcSockets, NativeSockets};
pub use registry::RemoteRegistry;
pub use rpc::{ClientHandle, Connector, RemoteCall, RemoteReply, RpcClient};

#[cfg(target_os = "linux")]
pub(crate) unsafe fn set_errno(val: libc::c_int) {
    *libc::__errno_location() = val;
}

#[cfg(target_os = "macos")]
pub(crate) unsafe fn set_errno(val: libc::c_int) {
    *libc::__error() = val;
}
