use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vitals::{SyncKind, SyncTrigger};

#[derive(Parser, Debug)]
#[command(
    name = "vitalsync",
    version,
    about = "Sync health readings to the aggregation backend"
)]
pub struct Cli {
    /// Engine config file (defaults to ~/.config/vitalsync/vitalsync.json)
    #[arg(long, global = true, env = "VITALSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sync state database (defaults to the vitalsync data directory)
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract readings from a health export and upload them
    Sync(SyncArgs),
    /// Continue an interrupted upload session
    Resume,
    /// Show last syncs, pending session and progress
    Status,
    /// Forget all sync bookkeeping
    Reset,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Health export JSON to read samples and workouts from
    #[arg(long)]
    pub export: PathBuf,

    #[arg(long, value_enum, default_value_t = KindArg::Auto)]
    pub kind: KindArg,

    #[arg(long, value_enum, default_value_t = TriggerArg::Manual)]
    pub trigger: TriggerArg,

    /// Upload to an in-memory backend and leave the sync state untouched
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    /// Initial on a fresh device, incremental afterwards
    Auto,
    Initial,
    Historical,
    Incremental,
    #[value(name = "last-24-hours")]
    Last24Hours,
    NetworkRetry,
}

impl KindArg {
    /// `None` when the kind is decided from sync history
    pub fn sync_kind(self) -> Option<SyncKind> {
        match self {
            KindArg::Auto => None,
            KindArg::Initial => Some(SyncKind::Initial),
            KindArg::Historical => Some(SyncKind::Historical),
            KindArg::Incremental => Some(SyncKind::Incremental),
            KindArg::Last24Hours => Some(SyncKind::Last24Hours),
            KindArg::NetworkRetry => Some(SyncKind::NetworkRetry),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TriggerArg {
    Manual,
    Periodic,
    Foreground,
    PostAuthorization,
}

impl From<TriggerArg> for SyncTrigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Manual => SyncTrigger::Manual,
            TriggerArg::Periodic => SyncTrigger::Periodic,
            TriggerArg::Foreground => SyncTrigger::Foreground,
            TriggerArg::PostAuthorization => SyncTrigger::PostAuthorization,
        }
    }
}
