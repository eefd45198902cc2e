mod commands;

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use remount::{MountConfig, RemoteMount};
use tracing_subscriber::{fmt, EnvFilter};

use crate::commands::{CliError, Command};

/// remount - browse and edit a remote content repository
#[derive(Parser, Debug)]
#[command(name = "remount")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mount configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote repository URL, when no configuration file is given
    #[arg(long)]
    url: Option<String>,

    /// Local mount root, when no configuration file is given
    #[arg(long, default_value = "/mnt/remote")]
    mount_root: String,

    #[arg(short, long)]
    user: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// More logging (-v debug, -vv everything)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("remount=debug,remount_http=debug"),
        _ => EnvFilter::new("debug"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn mount_config(args: &Args) -> Result<MountConfig, CliError> {
    let mut config = match (&args.config, &args.url) {
        (Some(path), _) => MountConfig::from_file(path)?,
        (None, Some(url)) => MountConfig::new(url.clone(), args.mount_root.clone()),
        (None, None) => {
            return Err(CliError::Usage(
                "either --config or --url is required".to_string(),
            ))
        }
    };
    if let Some(user) = &args.user {
        config.username = Some(user.clone());
        config.password = args.password.clone().or(config.password);
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<(), CliError> {
    let config = mount_config(&args)?;
    tracing::debug!(remote = %config.remote_url, mount_root = %config.mount_root, "Connecting");
    let mount = RemoteMount::connect(config)?;
    let mut resolver = mount.resolver();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::run(args.command, &mut resolver, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        if let CliError::Mount(remount::Error::Commit { failures }) = &e {
            for failure in failures {
                eprintln!("  {}", failure);
            }
        }
        std::process::exit(1);
    }
}
