use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "x4-save-to-sqlite")]
#[command(version, about = "Load X4 game catalogs and save games into a SQLite database")]
pub struct Cli {
    /// SQLite database path (defaults to the data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `x4_save_to_sqlite=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// How progress is shown
    #[arg(long, global = true, value_enum, default_value_t = ProgressMode::Tui)]
    pub progress: ProgressMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressMode {
    /// Full-screen terminal progress
    Tui,
    /// One JSON object per progress event on stdout
    Json,
    /// Logging only
    Quiet,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or migrate the database schema
    Init,

    /// Load wares, factions, sector names, storages and texts from the game folder
    LoadCatalogs {
        /// X4 installation folder
        game_dir: PathBuf,

        /// Store every language instead of the game's own
        #[arg(long)]
        all_languages: bool,
    },

    /// Import ships, stations, trades and links from a save game
    ImportSave {
        /// Save file (`.xml.gz` or plain `.xml`)
        save: PathBuf,

        /// Keep placeholders for destroyed objects
        #[arg(long)]
        removed_objects: bool,
    },

    /// Load the catalogs, then import a save
    Sync {
        /// X4 installation folder
        game_dir: PathBuf,

        /// Save file (`.xml.gz` or plain `.xml`)
        save: PathBuf,

        /// Store every language instead of the game's own
        #[arg(long)]
        all_languages: bool,

        /// Keep placeholders for destroyed objects
        #[arg(long)]
        removed_objects: bool,
    },

    /// Print row counts of the database
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tables and views with their row counts
    ListTables,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from([
            "x4-save-to-sqlite",
            "--db",
            "x4.db",
            "--progress",
            "json",
            "sync",
            "/games/X4",
            "quicksave.xml.gz",
            "--removed-objects",
        ])
        .unwrap();

        assert_eq!(cli.db, Some(PathBuf::from("x4.db")));
        assert_eq!(cli.progress, ProgressMode::Json);
        match cli.command {
            Commands::Sync {
                game_dir,
                save,
                all_languages,
                removed_objects,
            } => {
                assert_eq!(game_dir, PathBuf::from("/games/X4"));
                assert_eq!(save, PathBuf::from("quicksave.xml.gz"));
                assert!(!all_languages);
                assert!(removed_objects);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_command() {
        let cli =
            Cli::try_parse_from(["x4-save-to-sqlite", "stats", "--json", "--log-level", "debug"])
                .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.progress, ProgressMode::Tui);
        assert!(matches!(cli.command, Commands::Stats { json: true }));
    }
}
