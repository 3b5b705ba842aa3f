//! Remote endpoint registry: one client per distinct host, kept for the life
//! of the process.

use std::sync::{Arc, Mutex};

use vpn_config::{log_preload_warn, log_rpc_debug};

use crate::policy::{Destination, RemotePolicy};
use crate::rpc::{ClientHandle, Connector};

struct RemoteEndpoint {
    host: String,
    client: ClientHandle,
}

pub struct RemoteRegistry {
    interface: String,
    policy: Arc<dyn RemotePolicy>,
    connector: Box<dyn Connector>,
    // Append-only; few hosts per process, so a linear scan is enough
    entries: Mutex<Vec<RemoteEndpoint>>,
}

impl RemoteRegistry {
    pub fn new(
        interface: impl Into<String>,
        policy: Arc<dyn RemotePolicy>,
        connector: Box<dyn Connector>,
    ) -> Self {
        Self {
            interface: interface.into(),
            policy,
            connector,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Client for the host serving `dest`, establishing it on first use.
    ///
    /// `None` when no host can be derived or the endpoint cannot be reached;
    /// nothing is recorded in that case.
    pub fn get_or_create(&self, dest: &Destination) -> Option<ClientHandle> {
        let host = self.policy.derive_host(dest)?;
        self.client_for_host(&host)
    }

    pub fn client_for_host(&self, host: &str) -> Option<ClientHandle> {
        // Held across establishment so two threads never open the same host
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.iter().find(|e| e.host == host) {
            return Some(Arc::clone(&entry.client));
        }

        entries.try_reserve(1).ok()?;
        let client = match self.connector.establish(&self.interface, host) {
            Ok(c) => c,
            Err(e) => {
                log_preload_warn!("endpoint unavailable", host = host, error = tracing::field::display(&e));
                return None;
            }
        };
        log_rpc_debug!("endpoint established", host = host, interface = self.interface.as_str());

        entries.push(RemoteEndpoint {
            host: host.to_string(),
            client: Arc::clone(&client),
        });
        Some(client)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
