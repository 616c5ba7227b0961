//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};

use download_counter_core::{ANONYMOUS_USER_ID, OrderField};

/// Count file downloads and report the most popular files.
///
/// Records downloads into a SQLite statistics database, ranks files by
/// lifetime, daily or most recent downloads, and manages counter settings.
#[derive(Parser, Debug)]
#[command(name = "download-counter")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Statistics database path (overrides `db_path` from the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file path (defaults to $XDG_CONFIG_HOME/download-counter/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Ranking field accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    /// Lifetime downloads
    Total,
    /// Downloads since the last daily reset
    Day,
    /// Most recent download
    Last,
}

impl From<OrderArg> for OrderField {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Total => Self::TotalCount,
            OrderArg::Day => Self::DayCount,
            OrderArg::Last => Self::LastTimestamp,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count one download of a resource
    Record {
        /// Resource id
        resource_id: i64,
        /// Downloading user (0 = anonymous)
        #[arg(short, long, default_value_t = ANONYMOUS_USER_ID)]
        user: i64,
    },

    /// Print counters for one or more resources
    Show {
        /// Resource ids
        #[arg(required = true)]
        resource_ids: Vec<i64>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the top resource ids
    Top {
        /// Ranking field
        #[arg(short, long, value_enum, default_value_t = OrderArg::Total)]
        order: OrderArg,
        /// Number of ids (defaults to `default_limit` from the config file, else 10)
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..=1000))]
        limit: Option<u32>,
    },

    /// Print the ranked admin report
    Report {
        /// Ranking field
        #[arg(short, long, value_enum, default_value_t = OrderArg::Total)]
        order: OrderArg,
        /// Number of rows
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..=1000))]
        limit: Option<u32>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the popular downloads block
    Popular {
        /// Entries per section (0 hides a section)
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: u32,
    },

    /// Delete the counters of one resource
    Delete {
        /// Resource id
        resource_id: i64,
    },

    /// Delete every counter
    Purge,

    /// Run periodic maintenance (daily counter reset)
    Cron,

    /// Print the highest lifetime count
    Max,

    /// Show or change counter settings
    #[command(group(ArgGroup::new("toggle").args(["enable", "disable"])))]
    Settings {
        /// Turn download counting on
        #[arg(long)]
        enable: bool,
        /// Turn download counting off
        #[arg(long)]
        disable: bool,
        /// Delete every counter while saving
        #[arg(long)]
        purge: bool,
    },

    /// Add or update a downloadable file
    RegisterFile {
        /// File id (used as the resource id)
        fid: i64,
        /// Display name
        filename: String,
        /// Stream URI, e.g. private://reports/q1.pdf
        uri: String,
        /// Register as temporary (not servable, not listed)
        #[arg(long)]
        temporary: bool,
    },

    /// Remove a file and its counters
    RemoveFile {
        /// File id
        fid: i64,
    },

    /// Add or rename a user
    RegisterUser {
        /// User id
        uid: i64,
        /// Display name
        name: String,
    },

    /// Serve a file through the counting interceptor
    Fetch {
        /// File id
        fid: i64,
        /// Downloading user (0 = anonymous)
        #[arg(short, long, default_value_t = ANONYMOUS_USER_ID)]
        user: i64,
        /// Root directory for file URIs (overrides `files_root` from the config file)
        #[arg(long)]
        files_root: Option<PathBuf>,
        /// Write the file here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_record_defaults_to_anonymous() {
        let args = Args::try_parse_from(["download-counter", "record", "7"]).unwrap();
        match args.command {
            Command::Record { resource_id, user } => {
                assert_eq!(resource_id, 7);
                assert_eq!(user, ANONYMOUS_USER_ID);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["download-counter", "-vv", "max"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["download-counter", "max", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 1);
    }

    #[test]
    fn test_cli_global_db_flag_after_subcommand() {
        let args = Args::try_parse_from(["download-counter", "max", "--db", "x.db"]).unwrap();
        assert_eq!(args.db, Some(PathBuf::from("x.db")));
    }

    #[test]
    fn test_cli_top_order_values() {
        let args = Args::try_parse_from(["download-counter", "top", "-o", "day", "-n", "3"]).unwrap();
        match args.command {
            Command::Top { order, limit } => {
                assert_eq!(OrderField::from(order), OrderField::DayCount);
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_top_rejects_unknown_order() {
        let err = Args::try_parse_from(["download-counter", "top", "-o", "filename"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn test_cli_top_limit_zero_rejected() {
        let err = Args::try_parse_from(["download-counter", "top", "-n", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_settings_enable_and_disable_conflict() {
        let err = Args::try_parse_from(["download-counter", "settings", "--enable", "--disable"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_show_requires_ids() {
        let err = Args::try_parse_from(["download-counter", "show"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let result = Args::try_parse_from(["download-counter"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["download-counter", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
