use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "herald",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("HERALD_GIT_SHA"), ")"),
    about = "Deferred task scheduler and consumer",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: $HERALD_CONFIG, then ~/.herald/herald.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run only the scheduler loop
    Scheduler,
    /// Run only the task consumer
    Consumer,
    /// Run scheduler and consumer in one process
    Run,
    /// Schedule a reminder
    ///
    /// Example: herald add-reminder --user alice --destination '#test' --content 'buy milk' --in-secs 7200
    AddReminder {
        #[arg(long)]
        user: String,
        /// Channel or nick the reminder is sent to
        #[arg(long)]
        destination: String,
        #[arg(long)]
        content: String,
        #[arg(long, value_name = "SECS")]
        in_secs: u64,
    },
    /// Cancel a pending task by id
    Cancel {
        #[arg(long)]
        id: String,
    },
    /// List pending tasks of one kind under an owner
    ///
    /// Example: herald pending --owner 'channel:#ops' --kind ban-removal
    Pending {
        /// `global`, `channel:<name>` or `user:<nick>`
        #[arg(long)]
        owner: String,
        #[arg(long)]
        kind: String,
    },
}
