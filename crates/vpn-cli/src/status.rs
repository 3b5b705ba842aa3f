use anyhow::{Context, Result};
use vpn_config::Config;
use vpn_ipc::client::AsyncIpcClient;

/// Handshake with the endpoint of the configured host and report it
pub async fn check_status(config: &Config) -> Result<()> {
    let host = config
        .remote
        .host
        .as_deref()
        .context("no endpoint host configured (set --host or APPSERVER_VPN)")?;
    let path = vpn_ipc::endpoint_path(&config.transport.socket_dir, host);

    let mut client = AsyncIpcClient::connect_to(&path)
        .await
        .with_context(|| format!("endpoint for {host} unreachable at {}", path.display()))?;
    let version = client
        .handshake(&config.remote.interface, host)
        .await
        .with_context(|| format!("endpoint for {host} rejected the handshake"))?;

    println!("Endpoint: {}", path.display());
    println!("Host:     {host}");
    println!("Version:  {version}");
    Ok(())
}
