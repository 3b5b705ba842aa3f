//! Process-wide interceptor and the per-thread dispatch guard.

use std::cell::Cell;
use std::sync::{Arc, OnceLock};

use vpn_config::{log_preload_info, log_preload_warn};

use crate::dispatch::Interceptor;
use crate::policy::ConfiguredPolicy;
use crate::reals::{hard_nofile_limit, offset_from_limit, LibcSockets};
use crate::rpc::IpcConnector;

thread_local! {
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the dispatcher.
///
/// While held, interposed symbols bypass interception. That covers the RPC
/// socket traffic, log writes and config reads the dispatcher issues itself,
/// and everything running under initialization.
pub(crate) struct DispatchGuard(());

impl DispatchGuard {
    /// `None` when this thread is already dispatching, or when its TLS has
    /// been torn down during thread exit
    pub(crate) fn enter() -> Option<Self> {
        IN_DISPATCH
            .try_with(|active| {
                if active.replace(true) {
                    None
                } else {
                    Some(DispatchGuard(()))
                }
            })
            .ok()
            .flatten()
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        let _ = IN_DISPATCH.try_with(|active| active.set(false));
    }
}

static INTERCEPTOR: OnceLock<Interceptor<LibcSockets>> = OnceLock::new();

/// The process interceptor, built on first use. Must be called with a
/// [`DispatchGuard`] held.
pub(crate) fn interceptor() -> &'static Interceptor<LibcSockets> {
    INTERCEPTOR.get_or_init(init)
}

fn init() -> Interceptor<LibcSockets> {
    let config = vpn_config::config().clone();

    if let Some(file) = &config.log.file {
        vpn_config::logging::init_file_logging(&config.log.level, file);
    }

    let natives = match LibcSockets::resolve() {
        Ok(n) => n,
        Err(e) => fatal(&e.to_string()),
    };

    let hard_limit = hard_nofile_limit();
    let offset = offset_from_limit(config.descriptors.min_offset, hard_limit);
    if !matches!(hard_limit, Some(max) if max != libc::RLIM_INFINITY) {
        log_preload_warn!("open-files hard limit unbounded, using minimum offset", offset = offset);
    }

    let policy = Arc::new(ConfiguredPolicy::from_config(&config.remote));
    let connector = IpcConnector::new(config.transport.socket_dir.clone());
    log_preload_info!(
        "interceptor ready",
        host = tracing::field::debug(&config.remote.host),
        offset = offset,
    );

    Interceptor::new(
        natives,
        policy,
        Box::new(connector),
        config.remote.interface.clone(),
        offset,
    )
}

/// Report on stderr and abort. The host process cannot run with half the
/// socket API missing.
fn fatal(msg: &str) -> ! {
    #[cfg(target_os = "linux")]
    {
        crate::raw::write_stderr("vpn: ");
        crate::raw::write_stderr(msg);
        crate::raw::write_stderr("\n");
    }
    #[cfg(not(target_os = "linux"))]
    eprintln!("vpn: {msg}");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_blocks_nesting_until_dropped() {
        let outer = DispatchGuard::enter().unwrap();
        assert!(DispatchGuard::enter().is_none());
        drop(outer);

        let again = DispatchGuard::enter();
        assert!(again.is_some());
    }

    #[test]
    fn test_guard_is_per_thread() {
        let _held = DispatchGuard::enter().unwrap();
        let other = std::thread::spawn(|| DispatchGuard::enter().is_some())
            .join()
            .unwrap();
        assert!(other);
    }
}
