//! Blocking client used from inside intercepted calls.
//!
//! Intercepted primitives block the calling thread, so the client does too:
//! one request frame out, one response frame back.

use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::{endpoint_path, read_frame, write_frame, IpcError, VpnRequest, VpnResponse};

pub struct IpcClient {
    stream: UnixStream,
    host: String,
    server_version: String,
}

impl IpcClient {
    /// Connect to the endpoint of `host` and complete the handshake for
    /// `interface`.
    pub fn connect(socket_dir: &Path, interface: &str, host: &str) -> Result<Self, IpcError> {
        let path = endpoint_path(socket_dir, host);
        let stream = UnixStream::connect(&path)?;
        Self::handshake(stream, interface, host)
    }

    /// Complete the handshake over an already connected stream
    pub fn handshake(mut stream: UnixStream, interface: &str, host: &str) -> Result<Self, IpcError> {
        let request = VpnRequest::Handshake {
            interface: interface.to_string(),
            host: host.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        write_frame(&mut stream, &request)?;
        match read_frame(&mut stream)? {
            VpnResponse::HandshakeAck { server_version } => {
                tracing::debug!(component = "IPC", host, server_version = %server_version, "handshake complete");
                Ok(Self {
                    stream,
                    host: host.to_string(),
                    server_version,
                })
            }
            VpnResponse::Error(e) => Err(IpcError::Handshake(e)),
            _ => Err(IpcError::UnexpectedResponse("handshake")),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Send a request and wait for its response.
    ///
    /// A `VpnResponse::Error` is surfaced as [`IpcError::Remote`].
    pub fn call(&mut self, request: &VpnRequest) -> Result<VpnResponse, IpcError> {
        write_frame(&mut self.stream, request)?;
        match read_frame(&mut self.stream)? {
            VpnResponse::Error(e) => Err(IpcError::Remote(e)),
            resp => Ok(resp),
        }
    }

    /// Issue an operation answered by a bare integer result
    pub fn call_result(&mut self, request: &VpnRequest) -> Result<i32, IpcError> {
        match self.call(request)? {
            VpnResponse::Result(ret) => Ok(ret),
            _ => Err(IpcError::UnexpectedResponse(request.op_name())),
        }
    }

    /// Issue a `recv`, returning the result and the received bytes
    pub fn call_recv(&mut self, fd: i32, count: u32, flags: i32) -> Result<(i32, Vec<u8>), IpcError> {
        let request = VpnRequest::Recv { fd, count, flags };
        match self.call(&request)? {
            VpnResponse::Received { result, data } => Ok((result, data)),
            // Errors may come back without a payload
            VpnResponse::Result(result) if result < 0 => Ok((result, Vec::new())),
            _ => Err(IpcError::UnexpectedResponse("recv")),
        }
    }
}
