use clap::Parser;

#[derive(Parser, Debug)]
#[clap(about = "Pseudonym identity aggregation job")]
pub struct Cli {
    #[clap(long)]
    /// Skip the retention purge of stale identity records
    pub no_purge: bool,

    #[clap(long)]
    /// Run the aggregation but skip all bulk writes
    pub dry_run: bool,

    #[clap(long)]
    /// Override DAYS_TO_COUNT (aggregation window width in days)
    pub days_to_count: Option<i64>,

    #[clap(long)]
    /// Override KILL_DAYS (retention cutoff in days)
    pub kill_days: Option<i64>,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
