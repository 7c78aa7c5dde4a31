use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hoard::ui;

/// Incremental, encrypted snapshots of a directory tree into a
/// content-addressed block store.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Verbosity (-v, -vv, -vvv, ...).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Backend repository root, where blocks and versions are stored;
    /// defaults to the current directory. `snapshot` always discovers its
    /// working tree separately, by walking up from the current directory.
    #[arg(short, long, default_value = ".")]
    repository: Utf8PathBuf,

    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, clap::Subcommand)]
enum Subcommand {
    Init(ui::init::Args),
    Snapshot(ui::snapshot::Args),
    Versions(ui::versions::Args),
    Restore(ui::restore::Args),
    Cat(ui::cat::Args),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.subcommand {
        Subcommand::Init(args) => ui::init::run(args),
        Subcommand::Snapshot(args) => ui::snapshot::run(&cli.repository, args),
        Subcommand::Versions(args) => ui::versions::run(&cli.repository, args),
        Subcommand::Restore(args) => ui::restore::run(&cli.repository, args),
        Subcommand::Cat(args) => ui::cat::run(&cli.repository, args),
    }
}

/// Sets up tracing to spit messages to stderr, at a level derived from
/// repeated `-v` flags.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
