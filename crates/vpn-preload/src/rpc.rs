//! Call contract between the dispatcher and a remote endpoint.
//!
//! `call(client, op, args...) -> i32`: negative results carry a remote error
//! code, non-negative results are the operation's success value.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use vpn_ipc::{IpcClient, VpnRequest};

use crate::error::TransportError;

/// Shared handle; the registry keeps one per host alive for the process
/// lifetime
pub type ClientHandle = Arc<dyn RpcClient>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall<'a> {
    Close { fd: i32 },
    Connect { fd: i32, target: Option<SocketAddr> },
    Recv { fd: i32, count: u32, flags: i32 },
    Send { fd: i32, data: &'a [u8], flags: i32 },
}

impl RemoteCall<'_> {
    pub fn op_name(&self) -> &'static str {
        match self {
            RemoteCall::Close { .. } => "close",
            RemoteCall::Connect { .. } => "connect",
            RemoteCall::Recv { .. } => "recv",
            RemoteCall::Send { .. } => "send",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteReply {
    pub result: i32,
    /// Bytes received; empty for everything but `recv`
    pub data: Vec<u8>,
}

impl RemoteReply {
    pub fn result(result: i32) -> Self {
        Self {
            result,
            data: Vec::new(),
        }
    }
}

pub trait RpcClient: Send + Sync {
    fn host(&self) -> &str;

    fn call(&self, call: RemoteCall<'_>) -> Result<RemoteReply, TransportError>;
}

/// Establishes the client for a host
pub trait Connector: Send + Sync {
    fn establish(&self, interface: &str, host: &str) -> Result<ClientHandle, TransportError>;
}

/// Client over the endpoint's Unix socket.
///
/// Calls are serialized: the stream carries one request/response pair at a
/// time, so a blocking remote `recv` holds up every other call to the same
/// host until it returns. After a transport failure the stream may be
/// mid-frame, so the client refuses further calls.
pub struct IpcRpcClient {
    host: String,
    inner: Mutex<Option<IpcClient>>,
}

impl IpcRpcClient {
    pub fn new(client: IpcClient) -> Self {
        Self {
            host: client.host().to_string(),
            inner: Mutex::new(Some(client)),
        }
    }
}

impl RpcClient for IpcRpcClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn call(&self, call: RemoteCall<'_>) -> Result<RemoteReply, TransportError> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let client = guard
            .as_mut()
            .ok_or_else(|| TransportError::Poisoned(self.host.clone()))?;

        let res = match call {
            RemoteCall::Recv { fd, count, flags } => client
                .call_recv(fd, count, flags)
                .map(|(result, data)| RemoteReply { result, data }),
            RemoteCall::Close { fd } => client
                .call_result(&VpnRequest::Close { fd })
                .map(RemoteReply::result),
            RemoteCall::Connect { fd, target } => client
                .call_result(&VpnRequest::Connect { fd, target })
                .map(RemoteReply::result),
            RemoteCall::Send { fd, data, flags } => client
                .call_result(&VpnRequest::Send {
                    fd,
                    data: data.to_vec(),
                    flags,
                })
                .map(RemoteReply::result),
        };

        match res {
            Ok(reply) => Ok(reply),
            // An error string from the endpoint leaves the stream in sync
            Err(e @ vpn_ipc::IpcError::Remote(_)) => Err(e.into()),
            Err(e) => {
                *guard = None;
                Err(e.into())
            }
        }
    }
}

/// Connects to `<socket_dir>/vpn-<host>.sock`
pub struct IpcConnector {
    socket_dir: PathBuf,
}

impl IpcConnector {
    pub fn new(socket_dir: PathBuf) -> Self {
        Self { socket_dir }
    }
}

impl Connector for IpcConnector {
    fn establish(&self, interface: &str, host: &str) -> Result<ClientHandle, TransportError> {
        let client = IpcClient::connect(&self.socket_dir, interface, host)?;
        Ok(Arc::new(IpcRpcClient::new(client)))
    }
}
