use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "salat-tracker", version, about = "Track the five daily prayers and your group's progress")]
pub struct Cli {
    /// Act as this user (defaults to identity.user in the config)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show today's prayer times, marks and the open window
    Times {
        /// Date to show (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Mark a prayer as performed while its window is open
    Mark {
        /// Prayer name (fajr, dhuhr, asr, maghrib, isha)
        prayer: String,
        /// Date of the prayer (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// List your marks for a month
    Calendar {
        /// Month as YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Ranked completion report for a group
    Progress {
        /// Group name
        group: String,
        /// Reporting period: week or month
        #[arg(long, default_value = "week")]
        period: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// User management
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Group management
    Group {
        #[command(subcommand)]
        action: GroupCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a user
    Add {
        /// Username
        name: String,
        /// Location as "City, Country"; country defaults to the configured one
        #[arg(long)]
        location: String,
        /// Group to join
        #[arg(long)]
        group: Option<String>,
    },
    /// Move the current user into a group
    Join {
        /// Group name
        group: String,
    },
    /// List registered users
    List,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// Create a group
    Create {
        /// Group name
        name: String,
    },
    /// List groups
    List,
}
