use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value_t = false)]
        skip_migrations: bool,
    },
    /// Apply pending database migrations and exit.
    Migrate,
    /// Print a bearer token for a user, for local development.
    IssueToken {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}
