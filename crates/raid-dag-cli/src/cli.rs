use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use raid_dag::{DagConfig, RaidLayout, RaidLevel, Recovery, RetryPolicy};

#[derive(Parser)]
#[command(name = "raid-dag", author, version, about = "Plan and simulate fault-tolerant RAID write DAGs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Map one logical write and print the graph built for every stripe it touches.
    Plan(PlanArgs),

    /// Execute random writes against file-backed disk images, then scrub them.
    Simulate(SimulateArgs),

    /// Check parity, Q and mirror copies of existing disk images.
    Scrub(ScrubArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ArrayArgs {
    #[arg(long, value_enum, env = "RAID_DAG_LEVEL", default_value_t = RaidMode::Raid5)]
    pub raid: RaidMode,

    #[arg(long, env = "RAID_DAG_DISKS", default_value_t = 5)]
    pub disks: usize,

    #[arg(long, env = "RAID_DAG_SECTORS_PER_SU", default_value_t = 8)]
    pub sectors_per_su: u64,

    #[arg(long, env = "RAID_DAG_BYTES_PER_SECTOR", default_value_t = 512)]
    pub bytes_per_sector: usize,
}

impl ArrayArgs {
    pub fn layout(&self) -> anyhow::Result<RaidLayout> {
        Ok(RaidLayout::new(
            self.raid.into(),
            self.disks,
            self.sectors_per_su,
            self.bytes_per_sector,
        )?)
    }
}

#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Lock disk queues across each read-modify-write.
    #[arg(long, env = "RAID_DAG_ATOMIC_RMW")]
    pub atomic_rmw: bool,

    /// Never reuse a read buffer as the large-write parity result.
    #[arg(long, env = "RAID_DAG_NO_RECYCLE")]
    pub no_recycle: bool,

    /// Cap on buffer bytes per graph.
    #[arg(long, env = "RAID_DAG_ARENA_LIMIT")]
    pub arena_limit: Option<usize>,

    /// Log graph construction and node firing.
    #[arg(long, env = "RAID_DAG_TRACE")]
    pub trace: bool,

    #[arg(long, value_enum, env = "RAID_DAG_RECOVERY", default_value_t = RecoveryMode::Rollback)]
    pub recovery: RecoveryMode,
}

impl PolicyArgs {
    pub fn config(&self) -> DagConfig {
        DagConfig {
            trace_enabled: self.trace,
            atomic_rmw: self.atomic_rmw,
            allow_buffer_recycle: !self.no_recycle,
            arena_limit: self.arena_limit,
        }
    }
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub array: ArrayArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// First logical sector of the write.
    #[arg(long)]
    pub addr: u64,

    /// Length of the write in sectors.
    #[arg(long)]
    pub sectors: u64,

    /// Columns to treat as failed.
    #[arg(long, value_delimiter = ',')]
    pub failed: Vec<usize>,

    #[arg(long, value_enum, default_value_t = PlanFormat::Summary)]
    pub format: PlanFormat,
}

#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub array: ArrayArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[arg(long, env = "RAID_DAG_DISK_DIR")]
    pub disk_dir: PathBuf,

    /// Stripes per disk image.
    #[arg(long, default_value_t = 16)]
    pub stripes: u64,

    /// Number of logical writes to issue.
    #[arg(long, default_value_t = 32)]
    pub writes: usize,

    /// Upper bound on the length of each write in sectors.
    #[arg(long, default_value_t = 64)]
    pub max_sectors: u64,

    /// Attempts per node after the commit point.
    #[arg(long, env = "RAID_DAG_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Hot-remove this column before writing.
    #[arg(long)]
    pub fail_disk: Option<usize>,
}

impl SimulateArgs {
    pub const fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Args)]
pub struct ScrubArgs {
    #[command(flatten)]
    pub array: ArrayArgs,

    #[arg(long, env = "RAID_DAG_DISK_DIR")]
    pub disk_dir: PathBuf,

    #[arg(long, default_value_t = 16)]
    pub stripes: u64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RaidMode {
    Raid1,
    Raid5,
    Raid6,
}

impl From<RaidMode> for RaidLevel {
    fn from(mode: RaidMode) -> Self {
        match mode {
            RaidMode::Raid1 => Self::Raid1,
            RaidMode::Raid5 => Self::Raid5,
            RaidMode::Raid6 => Self::Raid6,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RecoveryMode {
    Rollback,
    ForwardOnly,
}

impl From<RecoveryMode> for Recovery {
    fn from(mode: RecoveryMode) -> Self {
        match mode {
            RecoveryMode::Rollback => Self::Rollback,
            RecoveryMode::ForwardOnly => Self::ForwardOnly,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PlanFormat {
    Summary,
    Dot,
}
