use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{Context, Result};
use vpn_config::{log_cli_debug, log_cli_info, Config};

#[cfg(target_os = "macos")]
const LIBRARY_NAME: &str = "libvpn_preload.dylib";
#[cfg(not(target_os = "macos"))]
const LIBRARY_NAME: &str = "libvpn_preload.so";

/// Execute `command` with the preload library injected and wait for it.
///
/// The child's exit code is passed through; death by signal maps to
/// `128 + signal` the way shells report it.
pub fn cmd_run(config: &Config, library: Option<&Path>, command: &[String]) -> Result<ExitCode> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("No command specified");
    };

    let library = match library {
        Some(path) => {
            anyhow::ensure!(path.exists(), "preload library not found: {}", path.display());
            path.to_path_buf()
        }
        None => find_preload_library()?,
    };

    if config.remote.host.is_none() {
        log_cli_info!("no endpoint host configured, sockets stay local");
    }

    let mut cmd = Command::new(program);
    cmd.args(args);
    for (key, value) in child_env(config, &library) {
        log_cli_debug!("child env", key = key.as_str(), value = value.as_str());
        cmd.env(key, value);
    }

    let status = cmd
        .status()
        .with_context(|| format!("Failed to execute: {program}"))?;
    Ok(ExitCode::from(exit_code(status)))
}

/// Environment for the child: library injection plus the redirector
/// configuration
fn child_env(config: &Config, library: &Path) -> Vec<(String, String)> {
    let library = library.to_string_lossy().to_string();
    let mut env = Vec::new();

    #[cfg(target_os = "macos")]
    {
        env.push(("DYLD_INSERT_LIBRARIES".to_string(), library));
        env.push(("DYLD_FORCE_FLAT_NAMESPACE".to_string(), "1".to_string()));
    }
    #[cfg(not(target_os = "macos"))]
    {
        let preload = match std::env::var("LD_PRELOAD") {
            Ok(existing) if !existing.is_empty() => format!("{library}:{existing}"),
            _ => library,
        };
        env.push(("LD_PRELOAD".to_string(), preload));
    }

    env.extend(config.preload_env());
    env
}

fn exit_code(status: std::process::ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return code as u8;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return (128 + sig) as u8;
        }
    }
    1
}

fn find_preload_library() -> Result<PathBuf> {
    let candidates = [
        // Next to the vpn binary (cargo target dir)
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.join(LIBRARY_NAME))),
        Some(PathBuf::from("target/release").join(LIBRARY_NAME)),
        Some(PathBuf::from("/usr/local/lib/vpn").join(LIBRARY_NAME)),
        Some(PathBuf::from("/usr/lib/vpn").join(LIBRARY_NAME)),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    anyhow::bail!("{LIBRARY_NAME} not found; build vpn-preload or pass --library")
}
