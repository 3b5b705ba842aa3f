//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated endpoint socket directory
//! - A unique host name per test
//! - A project root with its own `.vpn/config.toml`
//!
//! # Usage
//!
//! ```ignore
//! use vpn_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     // env.socket_dir and env.host are unique to this test
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Directory endpoint sockets are bound in
    pub socket_dir: PathBuf,
    /// Project root for the test
    pub project_root: PathBuf,
    /// Unique host name
    pub host: String,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let socket_dir = root.join("sockets");
        let project_root = root.join("project");
        std::fs::create_dir_all(&socket_dir)?;
        std::fs::create_dir_all(project_root.join(".vpn"))?;

        Ok(Self {
            _temp_dir: temp_dir,
            socket_dir,
            project_root,
            host: format!("vpn-test-{}-{}", std::process::id(), test_id),
            test_id,
        })
    }

    /// Socket path the endpoint for `host` listens on
    pub fn endpoint_path(&self) -> PathBuf {
        vpn_ipc::endpoint_path(&self.socket_dir, &self.host)
    }

    /// Project config path
    pub fn config_path(&self) -> PathBuf {
        self.project_root.join(".vpn").join("config.toml")
    }

    /// Write a project config file
    pub fn write_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.config_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Configuration pointing at this environment
    pub fn config(&self) -> crate::Config {
        let mut cfg = crate::Config::default();
        cfg.remote.host = Some(self.host.clone());
        cfg.transport.socket_dir = self.socket_dir.clone();
        cfg
    }

    /// Environment variables for spawning a preloaded child against this
    /// environment
    pub fn preload_env(&self) -> Vec<(String, String)> {
        self.config().preload_env()
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
