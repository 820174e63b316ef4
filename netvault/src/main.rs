//! netvault command line.
//!
//! ```bash
//! netvault --inventory devices.csv --commands config.commands.txt --backup-dir backups
//! ```
//!
//! Exits 0 when every device completed, 2 when any device failed, and 1
//! when the inventory or command list could not be loaded.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::error;

use netvault::{
    CommandSet, Fleet, RunConfig, RunTimestamp, SshConnector, SshOptions, TextFsmParser,
    inventory, report,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// CSV inventory of devices
    #[arg(long, default_value = "devices.csv")]
    inventory: PathBuf,

    /// Newline-delimited NTP configuration commands
    #[arg(long, default_value = "config.commands.txt")]
    commands: PathBuf,

    /// Root directory for per-host backups
    #[arg(long, default_value = "backups")]
    backup_dir: PathBuf,

    /// NTP source pinged and configured on every device
    #[arg(long, default_value = "192.168.0.1")]
    ntp_server: String,

    /// Maximum concurrent device sessions
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Per-operation session timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// TextFSM template for `show cdp neighbors detail` (built-in if omitted)
    #[arg(long)]
    neighbor_template: Option<PathBuf>,

    /// Reject hosts whose key is not in known_hosts
    #[arg(long)]
    strict_host_keys: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "table")]
    format: Format,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let timestamp = RunTimestamp::now();

    let (config, commands, devices) = match load(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(1);
        }
    };

    let connector = SshConnector::new(SshOptions {
        connect_timeout: config.command_timeout,
        read_timeout: config.command_timeout,
        verify_host_key: args.strict_host_keys,
        ..Default::default()
    });

    let fleet = Fleet::new(config, commands, connector, TextFsmParser);
    let summaries = fleet.run(&devices, timestamp).await;

    match args.format {
        Format::Table => print!("{}", report::render_table(&summaries)),
        Format::Json => match report::render_json(&summaries) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to render report: {e}");
                return ExitCode::from(1);
            }
        },
    }

    if summaries.iter().any(|s| s.is_failed()) {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

/// Load everything a run needs before any device is contacted.
fn load(args: &Args) -> Result<(RunConfig, CommandSet, Vec<netvault::Device>), netvault::Error> {
    let mut config = RunConfig::new(&args.backup_dir)
        .ntp_server(&args.ntp_server)
        .workers(args.workers)
        .command_timeout(Duration::from_secs(args.timeout));
    if let Some(path) = &args.neighbor_template {
        config = config.neighbor_template_file(path)?;
    }

    let devices = inventory::load_devices(&args.inventory)?;
    let commands = CommandSet::from_file(&args.commands, &config.ntp_server)?;
    Ok((config, commands, devices))
}
