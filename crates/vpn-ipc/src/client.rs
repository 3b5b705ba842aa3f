//! Async client for tooling that talks to an endpoint outside an intercepted
//! process (health checks from the CLI, tests).

use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::{endpoint_path, encode_frame, IpcError, VpnRequest, VpnResponse, MAX_IPC_SIZE};

pub struct AsyncIpcClient {
    stream: UnixStream,
}

impl AsyncIpcClient {
    /// Connect to the endpoint socket of `host`
    pub async fn connect(socket_dir: &Path, host: &str) -> Result<Self, IpcError> {
        Self::connect_to(&endpoint_path(socket_dir, host)).await
    }

    /// Connect to an endpoint at a custom socket path
    pub async fn connect_to(socket_path: &Path) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(socket_path).await?;
        Ok(Self { stream })
    }

    /// Send a request and receive response
    pub async fn send(&mut self, request: &VpnRequest) -> Result<VpnResponse, IpcError> {
        let frame = encode_frame(request)?;
        self.stream.write_all(&frame).await?;

        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await?;
        let resp_len = u32::from_le_bytes(len_buf) as usize;
        if resp_len > MAX_IPC_SIZE {
            return Err(IpcError::FrameTooLarge(resp_len));
        }

        let mut resp_buf = vec![0u8; resp_len];
        self.stream.read_exact(&mut resp_buf).await?;
        Ok(bincode::deserialize(&resp_buf)?)
    }

    /// Handshake with the endpoint, returning its version
    pub async fn handshake(&mut self, interface: &str, host: &str) -> Result<String, IpcError> {
        let request = VpnRequest::Handshake {
            interface: interface.to_string(),
            host: host.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        match self.send(&request).await? {
            VpnResponse::HandshakeAck { server_version } => Ok(server_version),
            VpnResponse::Error(e) => Err(IpcError::Handshake(e)),
            _ => Err(IpcError::UnexpectedResponse("handshake")),
        }
    }
}
