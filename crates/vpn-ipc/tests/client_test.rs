//! Client tests against an in-process stub endpoint.

use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::thread;

use vpn_ipc::client::AsyncIpcClient;
use vpn_ipc::{read_frame, write_frame, IpcClient, IpcError, VpnRequest, VpnResponse, APP_INTERFACE};

/// Echo-style endpoint: remembers the last `send` payload and hands it back
/// on `recv`, truncated to the requested count.
fn serve_one(mut stream: UnixStream) {
    let mut stored: Vec<u8> = Vec::new();
    loop {
        let request: VpnRequest = match read_frame(&mut stream) {
            Ok(r) => r,
            Err(_) => return,
        };
        let response = match request {
            VpnRequest::Handshake { interface, .. } if interface == APP_INTERFACE => {
                VpnResponse::HandshakeAck {
                    server_version: "stub".to_string(),
                }
            }
            VpnRequest::Handshake { interface, .. } => {
                VpnResponse::Error(format!("unknown interface {}", interface))
            }
            VpnRequest::Connect { .. } => VpnResponse::Result(42),
            VpnRequest::Close { fd } if fd == 42 => VpnResponse::Result(0),
            VpnRequest::Close { .. } => VpnResponse::Result(-9),
            VpnRequest::Send { data, .. } => {
                let n = data.len() as i32;
                stored = data;
                VpnResponse::Result(n)
            }
            VpnRequest::Recv { count, .. } => {
                let n = stored.len().min(count as usize);
                VpnResponse::Received {
                    result: n as i32,
                    data: stored[..n].to_vec(),
                }
            }
        };
        if write_frame(&mut stream, &response).is_err() {
            return;
        }
    }
}

fn spawn_stub(dir: &Path, host: &str) -> thread::JoinHandle<()> {
    let listener = UnixListener::bind(vpn_ipc::endpoint_path(dir, host)).unwrap();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            serve_one(stream);
        }
    })
}

#[test]
fn test_blocking_client_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_stub(dir.path(), "vpn1");

    let mut client = IpcClient::connect(dir.path(), APP_INTERFACE, "vpn1").unwrap();
    assert_eq!(client.host(), "vpn1");
    assert_eq!(client.server_version(), "stub");

    let rfd = client
        .call_result(&VpnRequest::Connect { fd: 3, target: None })
        .unwrap();
    assert_eq!(rfd, 42);

    let sent = client
        .call_result(&VpnRequest::Send {
            fd: rfd,
            data: b"hello".to_vec(),
            flags: 0,
        })
        .unwrap();
    assert_eq!(sent, 5);

    let (n, data) = client.call_recv(rfd, 3, 0).unwrap();
    assert_eq!(n, 3);
    assert_eq!(data, b"hel");

    assert_eq!(client.call_result(&VpnRequest::Close { fd: 7 }).unwrap(), -9);
    assert_eq!(client.call_result(&VpnRequest::Close { fd: rfd }).unwrap(), 0);

    drop(client);
    server.join().unwrap();
}

#[test]
fn test_handshake_rejected_for_wrong_interface() {
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_stub(dir.path(), "vpn2");

    let res = IpcClient::connect(dir.path(), "NOT-VPN", "vpn2");
    assert!(matches!(res, Err(IpcError::Handshake(_))));

    server.join().unwrap();
}

#[test]
fn test_connect_without_endpoint_fails() {
    let dir = tempfile::tempdir().unwrap();
    let res = IpcClient::connect(dir.path(), APP_INTERFACE, "missing");
    assert!(matches!(res, Err(IpcError::Io(_))));
}

#[tokio::test]
async fn test_async_client_handshake_and_send() {
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_stub(dir.path(), "vpn3");

    let mut client = AsyncIpcClient::connect(dir.path(), "vpn3").await.unwrap();
    let version = client.handshake(APP_INTERFACE, "vpn3").await.unwrap();
    assert_eq!(version, "stub");

    let resp = client
        .send(&VpnRequest::Send {
            fd: 42,
            data: b"abc".to_vec(),
            flags: 0,
        })
        .await
        .unwrap();
    assert_eq!(resp, VpnResponse::Result(3));

    drop(client);
    tokio::task::spawn_blocking(move || server.join().unwrap())
        .await
        .unwrap();
}
