//! # vpn-ipc
//!
//! Wire types and clients for the private channel between an intercepted
//! process and a `VPN` endpoint.
//!
//! Every message is a 4-byte little-endian length followed by a `bincode`
//! payload. A connection starts with a [`VpnRequest::Handshake`] naming the
//! interface and host, after which each forwarded socket operation is one
//! request/response pair.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub mod blocking;
pub mod errno;

#[cfg(feature = "tokio")]
pub mod client;

pub use blocking::IpcClient;

/// Interface name every endpoint is registered under
pub const APP_INTERFACE: &str = "VPN";

/// Largest frame accepted in either direction
pub const MAX_IPC_SIZE: usize = 16 * 1024 * 1024;

/// Default directory holding endpoint sockets
pub const DEFAULT_SOCKET_DIR: &str = "/tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VpnRequest {
    Handshake {
        interface: String,
        host: String,
        client_version: String,
    },
    Close {
        fd: i32,
    },
    Connect {
        /// Descriptor the caller created locally, passed as a hint
        fd: i32,
        target: Option<SocketAddr>,
    },
    Recv {
        fd: i32,
        count: u32,
        flags: i32,
    },
    Send {
        fd: i32,
        data: Vec<u8>,
        flags: i32,
    },
}

impl VpnRequest {
    /// Operation name as exposed by the remote interface
    pub fn op_name(&self) -> &'static str {
        match self {
            VpnRequest::Handshake { .. } => "handshake",
            VpnRequest::Close { .. } => "close",
            VpnRequest::Connect { .. } => "connect",
            VpnRequest::Recv { .. } => "recv",
            VpnRequest::Send { .. } => "send",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VpnResponse {
    HandshakeAck { server_version: String },
    /// Negative values carry a remote error code, see [`errno`]
    Result(i32),
    Received { result: i32, data: Vec<u8> },
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),
    #[error("handshake rejected: {0}")]
    Handshake(String),
    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),
    #[error("remote error: {0}")]
    Remote(String),
}

/// Socket path of the endpoint serving `host`.
///
/// Absolute hosts are taken as a socket path as-is.
pub fn endpoint_path(socket_dir: &Path, host: &str) -> PathBuf {
    if host.starts_with('/') {
        PathBuf::from(host)
    } else {
        socket_dir.join(format!("vpn-{}.sock", host))
    }
}

/// Serialize a message into a length-prefixed frame
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, IpcError> {
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_IPC_SIZE {
        return Err(IpcError::FrameTooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<(), IpcError> {
    let frame = encode_frame(msg)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> Result<T, IpcError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_IPC_SIZE {
        return Err(IpcError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(bincode::deserialize(&payload)?)
}
