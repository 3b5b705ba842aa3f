//! # vpn CLI
//!
//! Runs programs with their socket calls redirected to a VPN endpoint, and
//! inspects the configuration the redirector will use.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use vpn_config::{log_cli_info, Config};

mod run;
mod status;

/// Usage error
const EXIT_USAGE: u8 = 1;
/// The requested operation failed
const EXIT_FAILURE: u8 = 2;

/// Socket redirection over the VPN channel
#[derive(Parser, Debug)]
#[command(name = "vpn")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Register the session under its host name
    #[arg(short = 'R', long, global = true)]
    register: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a command with its sockets redirected
    Run {
        /// Endpoint host (overrides APPSERVER_VPN and config)
        #[arg(long)]
        host: Option<String>,

        /// Directory holding endpoint sockets
        #[arg(long, value_name = "DIR")]
        socket_dir: Option<PathBuf>,

        /// Preload library to inject
        #[arg(long, value_name = "PATH")]
        library: Option<PathBuf>,

        /// Command to execute
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Check that the endpoint for a host answers the handshake
    Status {
        #[arg(long)]
        host: Option<String>,

        #[arg(long, value_name = "DIR")]
        socket_dir: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file locations
    Path,
}

fn main() -> ExitCode {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    vpn_config::logging::init_logging(vpn_config::logging::LogLevel::Warn);

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("vpn: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load()?;

    match cli.command {
        Commands::Run {
            host,
            socket_dir,
            library,
            command,
        } => {
            apply_flags(&mut config, host, socket_dir);
            register(cli.register, &config)?;
            run::cmd_run(&config, library.as_deref(), &command)
        }
        Commands::Status { host, socket_dir } => {
            apply_flags(&mut config, host, socket_dir);
            register(cli.register, &config)?;
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(status::check_status(&config))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { command } => {
            match command {
                ConfigCommands::Show => print!("{}", toml::to_string_pretty(&config)?),
                ConfigCommands::Path => {
                    match Config::global_config_path() {
                        Some(p) => println!("Global:  {}", p.display()),
                        None => println!("Global:  (no home directory)"),
                    }
                    println!("Project: {}", Config::project_config_path().display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn apply_flags(config: &mut Config, host: Option<String>, socket_dir: Option<PathBuf>) {
    if let Some(host) = host {
        config.remote.host = Some(host);
    }
    if let Some(dir) = socket_dir {
        config.transport.socket_dir = dir;
    }
}

/// The session registry lives outside this tool; registration is a request
/// recorded against the host.
fn register(enabled: bool, config: &Config) -> Result<()> {
    if !enabled {
        return Ok(());
    }
    let host = config
        .remote
        .host
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("cannot register without a host (set --host or APPSERVER_VPN)"))?;
    log_cli_info!("registration requested", host = host, interface = config.remote.interface.as_str());
    Ok(())
}
